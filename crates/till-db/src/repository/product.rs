//! # Product Repository
//!
//! Catalog CRUD plus the stock decrement used by the sale transaction.
//!
//! ## Conditional Decrement
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE Product SET stock = stock - :q                                  │
//! │  WHERE id = :id AND stock >= :q                                         │
//! │                                                                         │
//! │  rows_affected = 1  → stock reduced, never below zero                  │
//! │  rows_affected = 0  → not enough stock (or product gone); caller       │
//! │                       rolls the sale back                              │
//! │                                                                         │
//! │  The check and the write are one statement, so stock never goes below   │
//! │  zero. Sales run in IMMEDIATE transactions and queue for the lock.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::{NewProduct, Product, ProductUpdate};

const SELECT_PRODUCT: &str = r#"
    SELECT id, name, code, description, purchase_price_cents, sale_price_cents, stock
    FROM Product
"#;

/// Repository for product database operations.
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Inserts a product.
    ///
    /// A duplicate code fails with [`DbError::UniqueViolation`].
    pub async fn insert(&self, product: &NewProduct) -> DbResult<Product> {
        debug!(code = %product.code, "Inserting product");

        let id = sqlx::query(
            r#"
            INSERT INTO Product (
                name, code, description,
                purchase_price_cents, sale_price_cents, stock
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(product.name.trim())
        .bind(product.code.trim())
        .bind(&product.description)
        .bind(product.purchase_price_cents)
        .bind(product.sale_price_cents)
        .bind(product.stock)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::UniqueViolation {
                field,
                value: product.code.clone(),
            },
            other => other,
        })?
        .last_insert_rowid();

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(product)
    }

    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Product>> {
        let mut conn = self.pool.acquire().await?;
        fetch_by_code(&mut conn, code).await
    }

    pub async fn list_all(&self) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        Ok(products)
    }

    /// Products whose name contains `name`.
    pub async fn search_by_name(&self, name: &str) -> DbResult<Vec<Product>> {
        debug!(query = %name, "Searching products");

        let products = sqlx::query_as::<_, Product>(&format!(
            "{SELECT_PRODUCT} WHERE name LIKE '%' || ?1 || '%' ORDER BY name, id"
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), "Search returned products");
        Ok(products)
    }

    /// Applies the set fields of `update`; unset fields keep their value.
    pub async fn update(&self, id: i64, update: &ProductUpdate) -> DbResult<Product> {
        debug!(id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE Product SET
                name                 = COALESCE(?2, name),
                code                 = COALESCE(?3, code),
                description          = COALESCE(?4, description),
                purchase_price_cents = COALESCE(?5, purchase_price_cents),
                sale_price_cents     = COALESCE(?6, sale_price_cents),
                stock                = COALESCE(?7, stock)
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(update.code.as_deref().map(str::trim))
        .bind(&update.description)
        .bind(update.purchase_price_cents)
        .bind(update.sale_price_cents)
        .bind(update.stock)
        .execute(&self.pool)
        .await
        .map_err(|e| match (DbError::from(e), &update.code) {
            (DbError::UniqueViolation { field, .. }, Some(code)) => DbError::UniqueViolation {
                field,
                value: code.trim().to_string(),
            },
            (other, _) => other,
        })?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Deletes the product. Sale lines referencing it are kept.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deleting product");

        let result = sqlx::query("DELETE FROM Product WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    /// Highest-stock products first.
    pub async fn top_by_stock(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{SELECT_PRODUCT} ORDER BY stock DESC, id LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Product")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

// =============================================================================
// Connection-level operations (usable inside a transaction)
// =============================================================================

/// Looks a product up by code on an existing connection.
pub async fn fetch_by_code(conn: &mut SqliteConnection, code: &str) -> DbResult<Option<Product>> {
    let product = sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE code = ?1"))
        .bind(code.trim())
        .fetch_optional(&mut *conn)
        .await?;

    Ok(product)
}

/// Takes `quantity` units out of stock if at least that many remain.
///
/// Returns `false`, leaving stock untouched, when the guard fails.
pub async fn decrement_stock(conn: &mut SqliteConnection, product_id: i64, quantity: i64) -> DbResult<bool> {
    debug!(product_id, quantity, "Decrementing stock");

    let result = sqlx::query(
        r#"
        UPDATE Product
        SET stock = stock - ?2
        WHERE id = ?1 AND stock >= ?2
        "#,
    )
    .bind(product_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
