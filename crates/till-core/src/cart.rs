//! # Cart
//!
//! The list of products the cashier has rung up but not yet sold.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Cashier Action           Cart Call                State Change         │
//! │  ──────────────           ─────────                ────────────         │
//! │                                                                         │
//! │  Add product ───────────► add(&product, qty) ────► lines.push(line)    │
//! │                                                                         │
//! │  Remove row 2 ──────────► remove(2) ─────────────► lines renumbered    │
//! │                                                                         │
//! │  Cancel sale ───────────► clear() ───────────────► lines.clear()       │
//! │                                                                         │
//! │  Finish sale ───────────► requested_quantities() ► summed per product  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same product may appear on several lines. Stock is checked against the
//! per-product sum, never line by line.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Product, SaleLineRequest};
use crate::validation::{validate_cart_size, validate_quantity};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// One row of the cart.
///
/// Prices are frozen when the line is added, so a later catalog edit does not
/// change what the cashier quoted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    /// 1-based position shown to the cashier.
    pub line_no: usize,
    pub product_id: i64,
    pub code: String,
    pub name: String,
    pub unit_price_cents: i64,
    pub unit_cost_cents: i64,
    pub quantity: i64,
}

impl CartLine {
    fn from_product(line_no: usize, product: &Product, quantity: i64) -> Self {
        CartLine {
            line_no,
            product_id: product.id,
            code: product.code.clone(),
            name: product.name.clone(),
            unit_price_cents: product.sale_price_cents,
            unit_cost_cents: product.purchase_price_cents,
            quantity,
        }
    }

    pub fn line_total(&self) -> Money {
        Money::from_cents(self.unit_price_cents).multiply_quantity(self.quantity)
    }

    pub fn line_cost(&self) -> Money {
        Money::from_cents(self.unit_cost_cents).multiply_quantity(self.quantity)
    }
}

/// The cart.
///
/// ## Invariants
/// - `line_no` values are `1..=len`, in order
/// - every quantity is in `1..=MAX_ITEM_QUANTITY`
/// - at most `MAX_CART_ITEMS` lines
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Cart::default()
    }

    /// Appends a line for `product`.
    ///
    /// Stock is not consulted here; the processor checks the summed request
    /// when the sale is recorded.
    pub fn add(&mut self, product: &Product, quantity: i64) -> CoreResult<&CartLine> {
        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }
        validate_quantity(quantity)?;

        if validate_cart_size(self.lines.len()).is_err() {
            return Err(CoreError::CartTooLarge {
                max: MAX_CART_ITEMS,
            });
        }

        let line_no = self.lines.len() + 1;
        self.lines
            .push(CartLine::from_product(line_no, product, quantity));
        Ok(&self.lines[line_no - 1])
    }

    /// Removes the line at `line_no` and renumbers the rest.
    pub fn remove(&mut self, line_no: usize) -> CoreResult<CartLine> {
        if line_no == 0 || line_no > self.lines.len() {
            return Err(CoreError::CartLineNotFound(line_no));
        }

        let removed = self.lines.remove(line_no - 1);
        for (idx, line) in self.lines.iter_mut().enumerate() {
            line.line_no = idx + 1;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Sum of sale prices, before tax and discount.
    pub fn subtotal(&self) -> Money {
        self.lines.iter().map(CartLine::line_total).sum()
    }

    /// Sum of purchase prices; the basis for profit.
    pub fn purchase_cost(&self) -> Money {
        self.lines.iter().map(CartLine::line_cost).sum()
    }

    /// Requested quantity per product code, summed over duplicate lines.
    pub fn requested_quantities(&self) -> Vec<(String, i64)> {
        sum_by_code(&self.to_line_requests())
    }

    /// The cart as sale line requests, one per cart line.
    pub fn to_line_requests(&self) -> Vec<SaleLineRequest> {
        self.lines
            .iter()
            .map(|l| SaleLineRequest::new(l.code.clone(), l.quantity))
            .collect()
    }
}

/// Requested quantity per product code, in order of first appearance.
///
/// Codes are compared after trimming, so `" P001"` and `"P001"` are one product.
///
/// ```rust
/// use till_core::cart::sum_by_code;
/// use till_core::SaleLineRequest;
///
/// let lines = [
///     SaleLineRequest::new("P001", 3),
///     SaleLineRequest::new("P002", 1),
///     SaleLineRequest::new(" P001", 3),
/// ];
/// assert_eq!(
///     sum_by_code(&lines),
///     vec![("P001".to_string(), 6), ("P002".to_string(), 1)]
/// );
/// ```
pub fn sum_by_code(lines: &[SaleLineRequest]) -> Vec<(String, i64)> {
    let mut totals: Vec<(String, i64)> = Vec::new();
    for line in lines {
        let code = line.code.trim();
        match totals.iter_mut().find(|(c, _)| c == code) {
            Some((_, quantity)) => *quantity += line.quantity,
            None => totals.push((code.to_string(), line.quantity)),
        }
    }
    totals
}
