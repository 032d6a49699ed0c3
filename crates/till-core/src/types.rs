//! # Domain Types
//!
//! Core entities for Till.
//!
//! ## Entity Relationships
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Entity Relationships                             │
//! │                                                                         │
//! │  ┌─────────────┐         ┌─────────────────┐         ┌─────────────┐   │
//! │  │  Customer   │ 1     * │      Sale       │ 1     * │  SaleLine   │   │
//! │  │  ─────────  │◄────────│  ─────────────  │◄────────│  ─────────  │   │
//! │  │  id         │         │  id             │ cascade │  id         │   │
//! │  │  name       │         │  customer_id    │         │  sale_id    │   │
//! │  │  national_id│         │  total_cents    │         │  product_id │   │
//! │  └─────────────┘         │  profit_cents   │         │  quantity   │   │
//! │                          │  installments   │         └──────┬──────┘   │
//! │                          │  payment_method │                │ *        │
//! │                          │  tax / discount │                ▼ 1        │
//! │                          │  sale_date      │         ┌─────────────┐   │
//! │                          └─────────────────┘         │   Product   │   │
//! │                                                      │  code (uniq)│   │
//! │                                                      │  stock      │   │
//! │                                                      └─────────────┘   │
//! │                                                                         │
//! │  Only sale → line cascades. Deleting a customer or a product leaves     │
//! │  the sales and lines that point at it in place.                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Write Models
//! `New*` structs carry what a caller supplies on insert. `*Update` structs
//! hold `Option` fields: `None` keeps the stored value.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::report::DateRange;

// =============================================================================
// Tax Rate
// =============================================================================

/// A percentage in basis points (1 bps = 0.01%).
///
/// Used for both the checkout surcharge and, through [`TaxRate::bps`], for
/// discounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaxRate(u32);

impl TaxRate {
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a rate from a percentage such as `8.25`.
    ///
    /// Negative or non-finite input maps to zero.
    pub fn from_percentage(pct: f64) -> Self {
        if !pct.is_finite() || pct <= 0.0 {
            return TaxRate(0);
        }
        TaxRate((pct * 100.0).round() as u32)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// How the customer pays. Persisted as its integer code.
///
/// | code | method      |
/// |------|-------------|
/// | 0    | Cash        |
/// | 1    | Credit card |
/// | 2    | Debit card  |
/// | 3    | Pix         |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum PaymentMethod {
    #[default]
    Cash = 0,
    CreditCard = 1,
    DebitCard = 2,
    Pix = 3,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Cash,
        PaymentMethod::CreditCard,
        PaymentMethod::DebitCard,
        PaymentMethod::Pix,
    ];

    /// Integer code stored in the `payment_method` column.
    pub const fn code(&self) -> i32 {
        *self as i32
    }

    /// Resolves a stored code back to a method.
    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.code() == code)
    }

    /// Only credit card sales may be split into more than one installment.
    pub const fn allows_installments(&self) -> bool {
        matches!(self, PaymentMethod::CreditCard)
    }
}

impl TryFrom<i32> for PaymentMethod {
    type Error = ValidationError;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        PaymentMethod::from_code(code).ok_or_else(|| ValidationError::NotAllowed {
            field: "payment_method".to_string(),
            allowed: PaymentMethod::ALL.iter().map(|m| m.code().to_string()).collect(),
        })
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Cash => write!(f, "cash"),
            PaymentMethod::CreditCard => write!(f, "credit card"),
            PaymentMethod::DebitCard => write!(f, "debit card"),
            PaymentMethod::Pix => write!(f, "pix"),
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A registered customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Customer {
    pub id: i64,
    pub name: String,
    /// National taxpayer id (CPF).
    pub national_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub national_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl NewCustomer {
    pub fn named(name: impl Into<String>) -> Self {
        NewCustomer {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub national_id: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

// =============================================================================
// Product
// =============================================================================

/// A product in the catalog.
///
/// `stock` is never driven below zero by a sale; manual edits are not
/// constrained at the data layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Business identifier, unique across the catalog.
    pub code: String,
    pub description: Option<String>,
    pub purchase_price_cents: i64,
    pub sale_price_cents: i64,
    pub stock: i64,
}

impl Product {
    pub fn sale_price(&self) -> Money {
        Money::from_cents(self.sale_price_cents)
    }

    pub fn purchase_price(&self) -> Money {
        Money::from_cents(self.purchase_price_cents)
    }

    /// Profit made on one unit.
    pub fn unit_margin(&self) -> Money {
        self.sale_price() - self.purchase_price()
    }

    pub fn can_sell(&self, quantity: i64) -> bool {
        quantity <= self.stock
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub purchase_price_cents: i64,
    pub sale_price_cents: i64,
    pub stock: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub code: Option<String>,
    pub description: Option<String>,
    pub purchase_price_cents: Option<i64>,
    pub sale_price_cents: Option<i64>,
    pub stock: Option<i64>,
}

// =============================================================================
// Sale
// =============================================================================

/// A recorded sale header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Sale {
    pub id: i64,
    pub customer_id: i64,
    pub total_cents: i64,
    pub profit_cents: i64,
    pub installments: i64,
    pub payment_method: PaymentMethod,
    pub tax_rate_bps: u32,
    pub discount_bps: u32,
    pub sale_date: NaiveDate,
}

impl Sale {
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    pub fn profit(&self) -> Money {
        Money::from_cents(self.profit_cents)
    }

    /// Value of each installment, leftover cents on the first ones.
    pub fn installment_schedule(&self) -> Vec<Money> {
        self.total().split(self.installments.clamp(1, i64::from(u32::MAX)) as u32)
    }
}

/// Header of a sale about to be recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSale {
    pub customer_id: i64,
    pub total_cents: i64,
    pub profit_cents: i64,
    pub installments: i64,
    pub payment_method: PaymentMethod,
    pub tax_rate_bps: u32,
    pub discount_bps: u32,
    pub sale_date: NaiveDate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleUpdate {
    pub customer_id: Option<i64>,
    pub total_cents: Option<i64>,
    pub profit_cents: Option<i64>,
    pub installments: Option<i64>,
    pub payment_method: Option<PaymentMethod>,
    pub tax_rate_bps: Option<u32>,
    pub discount_bps: Option<u32>,
    pub sale_date: Option<NaiveDate>,
}

/// Search criteria for recorded sales; unset fields do not filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleFilter {
    pub sale_id: Option<i64>,
    pub customer_id: Option<i64>,
    pub range: Option<DateRange>,
}

// =============================================================================
// Sale Line
// =============================================================================

/// One product-and-quantity entry of a sale (`SalesProduct` row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SaleLine {
    pub id: i64,
    pub sale_id: i64,
    pub product_id: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineUpdate {
    pub sale_id: Option<i64>,
    pub product_id: Option<i64>,
    pub quantity: Option<i64>,
}

/// A requested line at sale time, addressed by product code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub code: String,
    pub quantity: i64,
}

impl SaleLineRequest {
    pub fn new(code: impl Into<String>, quantity: i64) -> Self {
        SaleLineRequest {
            code: code.into(),
            quantity,
        }
    }
}

/// Outcome of a recorded sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleReceipt {
    pub sale: Sale,
    pub lines: Vec<SaleLine>,
}

// =============================================================================
// Audit Log
// =============================================================================

/// One entry of the activity log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct AuditEntry {
    pub id: i64,
    /// Short operation name, e.g. `sale.recorded`.
    pub operation: String,
    /// JSON payload describing the affected record.
    pub details: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

// =============================================================================
// Report Rows
// =============================================================================

/// Units sold for one product over a period.
///
/// `name`/`code` are `None` when the product has since been deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductSales {
    pub product_id: i64,
    pub name: Option<String>,
    pub code: Option<String>,
    pub quantity: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_percentage() {
        assert_eq!(TaxRate::from_percentage(8.25).bps(), 825);
        assert_eq!(TaxRate::from_percentage(-3.0).bps(), 0);
        assert_eq!(TaxRate::from_bps(1550).percentage(), 15.5);
    }

    #[test]
    fn test_payment_method_codes() {
        assert_eq!(PaymentMethod::Pix.code(), 3);
        assert_eq!(PaymentMethod::try_from(1).ok(), Some(PaymentMethod::CreditCard));
        assert!(PaymentMethod::try_from(9).is_err());
        assert_eq!(PaymentMethod::default(), PaymentMethod::Cash);
        assert!(PaymentMethod::CreditCard.allows_installments());
        assert!(!PaymentMethod::Pix.allows_installments());
    }

    #[test]
    fn test_product_margin() {
        let product = Product {
            id: 1,
            name: "Laptop".to_string(),
            code: "P001".to_string(),
            description: None,
            purchase_price_cents: 100_000,
            sale_price_cents: 120_000,
            stock: 10,
        };
        assert_eq!(product.unit_margin().cents(), 20_000);
        assert!(product.can_sell(10));
        assert!(!product.can_sell(11));
    }

    #[test]
    fn test_sale_installment_schedule() {
        let sale = Sale {
            id: 1,
            customer_id: 1,
            total_cents: 1000,
            profit_cents: 100,
            installments: 3,
            payment_method: PaymentMethod::CreditCard,
            tax_rate_bps: 0,
            discount_bps: 0,
            sale_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap_or_default(),
        };
        let schedule = sale.installment_schedule();
        assert_eq!(schedule.len(), 3);
        assert_eq!(schedule.iter().sum::<Money>().cents(), 1000);
    }
}
