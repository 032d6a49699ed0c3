//! # Report Math
//!
//! Date ranges, period granularity and cumulative series for the sales and
//! profit charts. The database groups rows into [`PeriodTotal`]s; this module
//! turns them into running totals.
//!
//! ```text
//! PeriodTotal            accumulate()          CumulativePoint
//! ───────────            ────────────          ───────────────
//! 2024-05-01  300   ──►                  ──►   2024-05-01  300   300
//! 2024-05-02  120   ──►   running sum    ──►   2024-05-02  120   420
//! 2024-05-04  500   ──►                  ──►   2024-05-04  500   920
//! ```

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::ValidationResult;

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    from: NaiveDate,
    to: NaiveDate,
}

impl DateRange {
    /// Fails when `from` is after `to`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> ValidationResult<Self> {
        if from > to {
            return Err(ValidationError::InvalidFormat {
                field: "date range".to_string(),
                reason: format!("{} is after {}", from, to),
            });
        }
        Ok(DateRange { from, to })
    }

    /// First to last day of the month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let from = date.with_day(1).unwrap_or(date);
        let next_month = if date.month() == 12 {
            NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(date.year(), date.month() + 1, 1)
        };
        let to = next_month.and_then(|d| d.pred_opt()).unwrap_or(date);
        DateRange { from, to }
    }

    pub fn from(&self) -> NaiveDate {
        self.from
    }

    pub fn to(&self) -> NaiveDate {
        self.to
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

/// Which figure a series tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Sale totals.
    Revenue,
    Profit,
}

impl Metric {
    /// Sales column the metric sums.
    pub const fn column(&self) -> &'static str {
        match self {
            Metric::Revenue => "total_cents",
            Metric::Profit => "profit_cents",
        }
    }
}

/// Bucket size for a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Daily,
    Monthly,
    /// Monthly when the selected sales span more than one calendar month,
    /// daily otherwise.
    Auto,
}

impl Granularity {
    /// Resolves `Auto` given the number of distinct months holding sales.
    pub fn resolve(self, distinct_months: i64) -> Granularity {
        match self {
            Granularity::Auto if distinct_months > 1 => Granularity::Monthly,
            Granularity::Auto => Granularity::Daily,
            other => other,
        }
    }
}

/// Summed metric for one period (`YYYY-MM-DD` or `YYYY-MM`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PeriodTotal {
    pub period: String,
    pub amount_cents: i64,
}

/// One point of a cumulative chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CumulativePoint {
    pub period: String,
    pub amount: Money,
    pub cumulative: Money,
}

/// Running totals over periods already sorted chronologically.
pub fn accumulate(totals: &[PeriodTotal]) -> Vec<CumulativePoint> {
    totals
        .iter()
        .scan(Money::zero(), |running, row| {
            let amount = Money::from_cents(row.amount_cents);
            *running += amount;
            Some(CumulativePoint {
                period: row.period.clone(),
                amount,
                cumulative: *running,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_date_range() {
        let range = DateRange::new(date(2024, 1, 10), date(2024, 2, 5)).unwrap();
        assert!(range.contains(date(2024, 1, 10)));
        assert!(range.contains(date(2024, 2, 5)));
        assert!(!range.contains(date(2024, 2, 6)));

        assert!(DateRange::new(date(2024, 3, 1), date(2024, 2, 1)).is_err());
    }

    #[test]
    fn test_month_of() {
        let feb = DateRange::month_of(date(2024, 2, 17));
        assert_eq!(feb.from(), date(2024, 2, 1));
        assert_eq!(feb.to(), date(2024, 2, 29));

        let dec = DateRange::month_of(date(2023, 12, 3));
        assert_eq!(dec.to(), date(2023, 12, 31));
    }

    #[test]
    fn test_granularity_resolution() {
        assert_eq!(Granularity::Auto.resolve(1), Granularity::Daily);
        assert_eq!(Granularity::Auto.resolve(0), Granularity::Daily);
        assert_eq!(Granularity::Auto.resolve(2), Granularity::Monthly);
        assert_eq!(Granularity::Daily.resolve(5), Granularity::Daily);
    }

    #[test]
    fn test_accumulate() {
        let rows = vec![
            PeriodTotal { period: "2024-05-01".into(), amount_cents: 300 },
            PeriodTotal { period: "2024-05-02".into(), amount_cents: 120 },
            PeriodTotal { period: "2024-05-04".into(), amount_cents: 500 },
        ];
        let series = accumulate(&rows);
        let running: Vec<i64> = series.iter().map(|p| p.cumulative.cents()).collect();
        assert_eq!(running, vec![300, 420, 920]);
        assert!(accumulate(&[]).is_empty());
    }
}
