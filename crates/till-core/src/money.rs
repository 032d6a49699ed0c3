//! # Money Module
//!
//! Integer-cent money for prices, totals, profit and installments.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Floating point: 1200.0 * 1.05 * 0.9 = 1133.9999999999998              │
//! │                                                                         │
//! │  Integer cents:  120000 → +6000 tax → 126000 → -12600 discount          │
//! │                  = 113400 cents, exactly                                │
//! │                                                                         │
//! │  Installments:   100000 / 3 = 33334 + 33333 + 33333                     │
//! │                  the leftover cent is assigned, never lost              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use till_core::money::Money;
//!
//! let unit = Money::from_cents(3_000);
//! let line = unit.multiply_quantity(3);
//! assert_eq!(line.cents(), 9_000);
//! assert_eq!(line.to_string(), "90.00");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use crate::types::TaxRate;

/// A monetary value in the smallest currency unit (cents).
///
/// Signed, so refunds and negative change can be represented and checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents.
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole units and cents.
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(12, 5).cents(), 1205);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * 100 - minor)
        } else {
            Money(major * 100 + minor)
        }
    }

    /// Returns the value in cents.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Whole-unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Cents portion, always 0-99.
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Tax owed on this amount at `rate`, rounded half up to the cent.
    ///
    /// Integer math: `(amount * bps + 5000) / 10000`, widened to i128.
    ///
    /// ```rust
    /// use till_core::money::Money;
    /// use till_core::types::TaxRate;
    ///
    /// let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83); // 0.825 rounds up
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money::from_cents(scale_bps(self.0, rate.bps()))
    }

    /// Multiplies a unit price by a quantity.
    #[inline]
    pub const fn multiply_quantity(&self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Returns the amount left after a percentage discount.
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let discounted = Money::from_cents(10_000).apply_percentage_discount(1_000);
    /// assert_eq!(discounted.cents(), 9_000);
    /// ```
    pub fn apply_percentage_discount(&self, discount_bps: u32) -> Money {
        Money::from_cents(self.0 - scale_bps(self.0, discount_bps))
    }

    /// Splits the amount into `parts` installments that add back up exactly.
    ///
    /// Leftover cents go to the earliest installments, one each.
    /// `parts` below 1 is treated as 1.
    ///
    /// ```rust
    /// use till_core::money::Money;
    ///
    /// let parts = Money::from_cents(1000).split(3);
    /// assert_eq!(parts, vec![Money::from_cents(334), Money::from_cents(333), Money::from_cents(333)]);
    /// ```
    pub fn split(&self, parts: u32) -> Vec<Money> {
        let parts = i64::from(parts.max(1));
        let base = self.0 / parts;
        let remainder = self.0 % parts;
        let step = remainder.signum();

        (0..parts)
            .map(|i| {
                if i < remainder.abs() {
                    Money(base + step)
                } else {
                    Money(base)
                }
            })
            .collect()
    }
}

/// `amount * bps / 10000` rounded half away from zero.
fn scale_bps(amount: i64, bps: u32) -> i64 {
    let product = amount as i128 * bps as i128;
    let rounded = if product < 0 {
        (product - 5000) / 10000
    } else {
        (product + 5000) / 10000
    };
    rounded as i64
}

/// Plain decimal rendering (`"1234.50"`). Currency symbols are applied by
/// the store configuration, not here.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(500).to_string(), "5.00");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::zero().to_string(), "0.00");
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);

        let total: Money = [a, b, b].iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_tax_calculation() {
        let amount = Money::from_cents(120_000);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(500)).cents(), 6_000);
        assert_eq!(amount.calculate_tax(TaxRate::from_bps(0)).cents(), 0);
    }

    #[test]
    fn test_negative_amounts_round_symmetrically() {
        let refund = Money::from_cents(-1000);
        assert_eq!(refund.calculate_tax(TaxRate::from_bps(825)).cents(), -83);
    }

    #[test]
    fn test_percentage_discount() {
        let subtotal = Money::from_cents(10_000);
        assert_eq!(subtotal.apply_percentage_discount(1_000).cents(), 9_000);
        assert_eq!(subtotal.apply_percentage_discount(10_000).cents(), 0);
    }

    #[test]
    fn test_split_keeps_every_cent() {
        let total = Money::from_cents(100_000);
        let parts = total.split(3);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].cents(), 33_334);
        assert_eq!(parts[2].cents(), 33_333);
        assert_eq!(parts.iter().sum::<Money>(), total);
    }

    #[test]
    fn test_split_zero_parts_is_single_installment() {
        assert_eq!(Money::from_cents(999).split(0), vec![Money::from_cents(999)]);
    }
}
