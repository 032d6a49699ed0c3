//! # Sale Repository
//!
//! Sale headers (`Sales`) and their lines (`SalesProduct`).
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. RECORD (SalesProcessor, one transaction)                            │
//! │     └── insert_header() → sale id                                      │
//! │     └── decrement_stock() + insert_line()   × every line               │
//! │                                                                         │
//! │  2. QUERY                                                              │
//! │     └── get_by_id() / filter() / lines_for_sale()                      │
//! │                                                                         │
//! │  3. CORRECT                                                            │
//! │     └── update() / update_line() / delete_line()                       │
//! │                                                                         │
//! │  4. DELETE                                                             │
//! │     └── delete() → header and every line, atomically                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Recording is exposed as connection-level functions so the processor can
//! run it inside its own transaction.

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::{NewSale, Sale, SaleFilter, SaleLine, SaleLineUpdate, SaleUpdate};

const SELECT_SALE: &str = r#"
    SELECT id, customer_id, total_cents, profit_cents, installments,
           payment_method, tax_rate_bps, discount_bps, sale_date
    FROM Sales
"#;

const SELECT_LINE: &str = "SELECT id, sale_id, product_id, quantity FROM SalesProduct";

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        fetch_sale(&mut conn, id).await
    }

    /// Every sale, oldest first.
    pub async fn list(&self) -> DbResult<Vec<Sale>> {
        self.filter(&SaleFilter::default()).await
    }

    /// Sales matching every set criterion of `filter`.
    pub async fn filter(&self, filter: &SaleFilter) -> DbResult<Vec<Sale>> {
        let (from, to) = match filter.range {
            Some(range) => (Some(range.from()), Some(range.to())),
            None => (None, None),
        };

        let sales = sqlx::query_as::<_, Sale>(&format!(
            r#"{SELECT_SALE}
            WHERE (?1 IS NULL OR id = ?1)
              AND (?2 IS NULL OR customer_id = ?2)
              AND (?3 IS NULL OR sale_date >= ?3)
              AND (?4 IS NULL OR sale_date <= ?4)
            ORDER BY sale_date, id"#
        ))
        .bind(filter.sale_id)
        .bind(filter.customer_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(sales)
    }

    /// Applies the set fields of `update`; unset fields keep their value.
    pub async fn update(&self, id: i64, update: &SaleUpdate) -> DbResult<Sale> {
        debug!(id, "Updating sale");

        let result = sqlx::query(
            r#"
            UPDATE Sales SET
                customer_id    = COALESCE(?2, customer_id),
                total_cents    = COALESCE(?3, total_cents),
                profit_cents   = COALESCE(?4, profit_cents),
                installments   = COALESCE(?5, installments),
                payment_method = COALESCE(?6, payment_method),
                tax_rate_bps   = COALESCE(?7, tax_rate_bps),
                discount_bps   = COALESCE(?8, discount_bps),
                sale_date      = COALESCE(?9, sale_date)
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(update.customer_id)
        .bind(update.total_cents)
        .bind(update.profit_cents)
        .bind(update.installments)
        .bind(update.payment_method)
        .bind(update.tax_rate_bps)
        .bind(update.discount_bps)
        .bind(update.sale_date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale", id))
    }

    /// Deletes a sale together with all of its lines.
    ///
    /// Returns the number of lines removed.
    pub async fn delete(&self, id: i64) -> DbResult<u64> {
        debug!(id, "Deleting sale");

        let mut tx = self.pool.begin().await?;

        let lines = sqlx::query("DELETE FROM SalesProduct WHERE sale_id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let result = sqlx::query("DELETE FROM Sales WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            // Dropping the transaction rolls back the line delete.
            return Err(DbError::not_found("Sale", id));
        }

        tx.commit().await?;
        Ok(lines)
    }

    pub async fn lines_for_sale(&self, sale_id: i64) -> DbResult<Vec<SaleLine>> {
        let lines = sqlx::query_as::<_, SaleLine>(&format!(
            "{SELECT_LINE} WHERE sale_id = ?1 ORDER BY id"
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    /// Every sale line, in insertion order.
    pub async fn list_lines(&self) -> DbResult<Vec<SaleLine>> {
        let lines = sqlx::query_as::<_, SaleLine>(&format!("{SELECT_LINE} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        Ok(lines)
    }

    pub async fn get_line(&self, id: i64) -> DbResult<Option<SaleLine>> {
        let line = sqlx::query_as::<_, SaleLine>(&format!("{SELECT_LINE} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(line)
    }

    /// Edits a line in place. Stock is not adjusted.
    pub async fn update_line(&self, id: i64, update: &SaleLineUpdate) -> DbResult<SaleLine> {
        debug!(id, "Updating sale line");

        let result = sqlx::query(
            r#"
            UPDATE SalesProduct SET
                sale_id    = COALESCE(?2, sale_id),
                product_id = COALESCE(?3, product_id),
                quantity   = COALESCE(?4, quantity)
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(update.sale_id)
        .bind(update.product_id)
        .bind(update.quantity)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale line", id));
        }

        self.get_line(id)
            .await?
            .ok_or_else(|| DbError::not_found("Sale line", id))
    }

    pub async fn delete_line(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deleting sale line");

        let result = sqlx::query("DELETE FROM SalesProduct WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale line", id));
        }

        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Sales")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Connection-level operations (usable inside a transaction)
// =============================================================================

pub async fn fetch_sale(conn: &mut SqliteConnection, id: i64) -> DbResult<Option<Sale>> {
    let sale = sqlx::query_as::<_, Sale>(&format!("{SELECT_SALE} WHERE id = ?1"))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    Ok(sale)
}

/// Inserts a sale header and returns its id.
pub async fn insert_header(conn: &mut SqliteConnection, sale: &NewSale) -> DbResult<i64> {
    debug!(customer_id = sale.customer_id, total_cents = sale.total_cents, "Inserting sale");

    let id = sqlx::query(
        r#"
        INSERT INTO Sales (
            customer_id, total_cents, profit_cents, installments,
            payment_method, tax_rate_bps, discount_bps, sale_date
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(sale.customer_id)
    .bind(sale.total_cents)
    .bind(sale.profit_cents)
    .bind(sale.installments)
    .bind(sale.payment_method)
    .bind(sale.tax_rate_bps)
    .bind(sale.discount_bps)
    .bind(sale.sale_date)
    .execute(&mut *conn)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Inserts one sale line.
pub async fn insert_line(
    conn: &mut SqliteConnection,
    sale_id: i64,
    product_id: i64,
    quantity: i64,
) -> DbResult<SaleLine> {
    debug!(sale_id, product_id, quantity, "Inserting sale line");

    let id = sqlx::query("INSERT INTO SalesProduct (sale_id, product_id, quantity) VALUES (?1, ?2, ?3)")
        .bind(sale_id)
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    Ok(SaleLine {
        id,
        sale_id,
        product_id,
        quantity,
    })
}
