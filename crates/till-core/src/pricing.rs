//! # Checkout Pricing
//!
//! Turns a cart subtotal and the payment terms into the figures stored on the
//! sale header.
//!
//! ```text
//! subtotal ──► + tax (tax_rate) ──► − discount (discount_bps) ──► total
//!                                                                  │
//!                   purchase cost ──────────────────► profit = total − cost
//!                                                                  │
//!                   installments ───────────────────► total.split(n)
//! ```
//!
//! The discount applies to the taxed amount.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{NewSale, PaymentMethod, TaxRate};
use crate::validation::{clamp_installments, validate_rate_bps};

/// Payment terms chosen at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SaleTerms {
    pub payment_method: PaymentMethod,
    pub installments: i64,
    pub tax_rate: TaxRate,
    pub discount_bps: u32,
}

impl SaleTerms {
    /// Cash, one installment, no surcharge or discount.
    pub fn cash() -> Self {
        SaleTerms {
            payment_method: PaymentMethod::Cash,
            installments: 1,
            ..Default::default()
        }
    }

    pub fn with_method(payment_method: PaymentMethod) -> Self {
        SaleTerms {
            payment_method,
            installments: 1,
            ..Default::default()
        }
    }

    pub fn installments(mut self, n: i64) -> Self {
        self.installments = n;
        self
    }

    pub fn tax_rate(mut self, rate: TaxRate) -> Self {
        self.tax_rate = rate;
        self
    }

    pub fn discount_bps(mut self, bps: u32) -> Self {
        self.discount_bps = bps;
        self
    }

    /// Installment count actually applied: clamped to at least one, and
    /// forced to one for methods that cannot be split.
    pub fn effective_installments(&self) -> u32 {
        if self.payment_method.allows_installments() {
            clamp_installments(self.installments)
        } else {
            1
        }
    }
}

/// Priced checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub subtotal: Money,
    pub tax: Money,
    pub discount: Money,
    pub total: Money,
    pub purchase_cost: Money,
    pub profit: Money,
    pub terms: SaleTerms,
    /// One entry per installment; sums to `total`.
    pub schedule: Vec<Money>,
}

impl Quote {
    pub fn compute(subtotal: Money, purchase_cost: Money, terms: &SaleTerms) -> CoreResult<Quote> {
        validate_rate_bps("tax_rate", terms.tax_rate.bps())?;
        validate_rate_bps("discount", terms.discount_bps)?;

        let tax = subtotal.calculate_tax(terms.tax_rate);
        let taxed = subtotal + tax;
        let total = taxed.apply_percentage_discount(terms.discount_bps);
        let discount = taxed - total;

        let mut terms = *terms;
        terms.installments = i64::from(terms.effective_installments());

        Ok(Quote {
            subtotal,
            tax,
            discount,
            total,
            purchase_cost,
            profit: total - purchase_cost,
            schedule: total.split(terms.installments as u32),
            terms,
        })
    }

    /// Value of a single installment (the first, which carries any leftover cent).
    pub fn installment_value(&self) -> Money {
        self.schedule.first().copied().unwrap_or(self.total)
    }

    /// Change owed for a cash tender.
    pub fn change_for(&self, tendered: Money) -> CoreResult<Money> {
        if tendered < self.total {
            return Err(CoreError::InvalidPaymentAmount {
                reason: format!("tendered {} is less than total {}", tendered, self.total),
            });
        }
        Ok(tendered - self.total)
    }

    /// Sale header for this quote.
    pub fn to_new_sale(&self, customer_id: i64, sale_date: NaiveDate) -> NewSale {
        NewSale {
            customer_id,
            total_cents: self.total.cents(),
            profit_cents: self.profit.cents(),
            installments: self.terms.installments,
            payment_method: self.terms.payment_method,
            tax_rate_bps: self.terms.tax_rate.bps(),
            discount_bps: self.terms.discount_bps,
            sale_date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cash_quote_is_subtotal() {
        let quote = Quote::compute(
            Money::from_cents(30_000),
            Money::from_cents(20_000),
            &SaleTerms::cash(),
        )
        .unwrap();

        assert_eq!(quote.total.cents(), 30_000);
        assert_eq!(quote.profit.cents(), 10_000);
        assert_eq!(quote.schedule, vec![Money::from_cents(30_000)]);
    }

    #[test]
    fn test_tax_then_discount() {
        let terms = SaleTerms::with_method(PaymentMethod::CreditCard)
            .tax_rate(TaxRate::from_bps(500))
            .discount_bps(1_000);
        let quote = Quote::compute(Money::from_cents(120_000), Money::from_cents(100_000), &terms)
            .unwrap();

        assert_eq!(quote.tax.cents(), 6_000);
        assert_eq!(quote.discount.cents(), 12_600);
        assert_eq!(quote.total.cents(), 113_400);
        assert_eq!(quote.profit.cents(), 13_400);
    }

    #[test]
    fn test_installments_only_for_credit_card() {
        let card = SaleTerms::with_method(PaymentMethod::CreditCard).installments(3);
        let quote = Quote::compute(Money::from_cents(1_000), Money::zero(), &card).unwrap();
        assert_eq!(quote.terms.installments, 3);
        assert_eq!(quote.installment_value().cents(), 334);

        let pix = SaleTerms::with_method(PaymentMethod::Pix).installments(3);
        let quote = Quote::compute(Money::from_cents(1_000), Money::zero(), &pix).unwrap();
        assert_eq!(quote.terms.installments, 1);
    }

    #[test]
    fn test_installments_clamped_to_one() {
        let card = SaleTerms::with_method(PaymentMethod::CreditCard).installments(0);
        let quote = Quote::compute(Money::from_cents(1_000), Money::zero(), &card).unwrap();
        assert_eq!(quote.terms.installments, 1);
    }

    #[test]
    fn test_change() {
        let quote = Quote::compute(Money::from_cents(4_550), Money::zero(), &SaleTerms::cash())
            .unwrap();
        assert_eq!(quote.change_for(Money::from_cents(5_000)).unwrap().cents(), 450);
        assert!(matches!(
            quote.change_for(Money::from_cents(4_000)),
            Err(CoreError::InvalidPaymentAmount { .. })
        ));
    }

    #[test]
    fn test_rejects_discount_over_100_percent() {
        let terms = SaleTerms::cash().discount_bps(12_000);
        assert!(Quote::compute(Money::from_cents(100), Money::zero(), &terms).is_err());
    }

    #[test]
    fn test_to_new_sale() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        let quote = Quote::compute(Money::from_cents(3_000), Money::from_cents(2_000), &SaleTerms::cash())
            .unwrap();
        let sale = quote.to_new_sale(4, date);
        assert_eq!(sale.customer_id, 4);
        assert_eq!(sale.total_cents, 3_000);
        assert_eq!(sale.profit_cents, 1_000);
        assert_eq!(sale.installments, 1);
        assert_eq!(sale.sale_date, date);
    }
}
