//! # Report Repository
//!
//! Aggregate queries behind the growth charts and the rankings.
//!
//! ## Period Keys
//! ```text
//! Daily    sale_date                 2024-05-17
//! Monthly  substr(sale_date, 1, 7)   2024-05
//! ```
//! Both sort chronologically as plain text.

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use till_core::report::{Metric, PeriodTotal};
use till_core::{DateRange, Granularity, ProductSales};

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Number of distinct calendar months holding at least one sale.
    pub async fn distinct_months(&self, range: Option<&DateRange>) -> DbResult<i64> {
        let (from, to) = bounds(range);

        let months: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT substr(sale_date, 1, 7))
            FROM Sales
            WHERE (?1 IS NULL OR sale_date >= ?1)
              AND (?2 IS NULL OR sale_date <= ?2)
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await?;

        Ok(months)
    }

    /// Sums `metric` per period, oldest period first.
    ///
    /// `Granularity::Auto` is resolved against the sales inside `range`.
    pub async fn period_totals(
        &self,
        range: Option<&DateRange>,
        granularity: Granularity,
        metric: Metric,
    ) -> DbResult<Vec<PeriodTotal>> {
        let granularity = match granularity {
            Granularity::Auto => granularity.resolve(self.distinct_months(range).await?),
            other => other,
        };
        let period = match granularity {
            Granularity::Monthly => "substr(sale_date, 1, 7)",
            _ => "sale_date",
        };
        debug!(?granularity, ?metric, "Computing period totals");

        let (from, to) = bounds(range);
        let totals = sqlx::query_as::<_, PeriodTotal>(&format!(
            r#"
            SELECT {period} AS period, SUM({column}) AS amount_cents
            FROM Sales
            WHERE (?1 IS NULL OR sale_date >= ?1)
              AND (?2 IS NULL OR sale_date <= ?2)
            GROUP BY period
            ORDER BY period
            "#,
            column = metric.column(),
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(totals)
    }

    /// Products ranked by units sold, ties broken by product id.
    ///
    /// Lines of deleted products still count; their name and code are `None`.
    pub async fn top_products(
        &self,
        range: Option<&DateRange>,
        limit: u32,
    ) -> DbResult<Vec<ProductSales>> {
        let (from, to) = bounds(range);

        let rows = sqlx::query_as::<_, ProductSales>(
            r#"
            SELECT sp.product_id AS product_id,
                   p.name        AS name,
                   p.code        AS code,
                   SUM(sp.quantity) AS quantity
            FROM SalesProduct sp
            JOIN Sales s ON s.id = sp.sale_id
            LEFT JOIN Product p ON p.id = sp.product_id
            WHERE (?1 IS NULL OR s.sale_date >= ?1)
              AND (?2 IS NULL OR s.sale_date <= ?2)
            GROUP BY sp.product_id
            ORDER BY quantity DESC, sp.product_id
            LIMIT ?3
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }
}

fn bounds(range: Option<&DateRange>) -> (Option<chrono::NaiveDate>, Option<chrono::NaiveDate>) {
    match range {
        Some(range) => (Some(range.from()), Some(range.to())),
        None => (None, None),
    }
}
