//! # Customer Repository

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use till_core::{Customer, CustomerUpdate, NewCustomer};

const SELECT_CUSTOMER: &str = "SELECT id, name, national_id, email, phone FROM Customer";

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Inserts a customer and returns the stored row.
    pub async fn insert(&self, customer: &NewCustomer) -> DbResult<Customer> {
        debug!(name = %customer.name, "Inserting customer");

        let id = sqlx::query(
            r#"
            INSERT INTO Customer (name, national_id, email, phone)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(customer.name.trim())
        .bind(&customer.national_id)
        .bind(&customer.email)
        .bind(&customer.phone)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    pub async fn get_by_id(&self, id: i64) -> DbResult<Option<Customer>> {
        let customer = sqlx::query_as::<_, Customer>(&format!("{SELECT_CUSTOMER} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(customer)
    }

    pub async fn list_all(&self) -> DbResult<Vec<Customer>> {
        let customers = sqlx::query_as::<_, Customer>(&format!("{SELECT_CUSTOMER} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        Ok(customers)
    }

    /// Customers whose name contains `name` (case-insensitive for ASCII).
    pub async fn search_by_name(&self, name: &str) -> DbResult<Vec<Customer>> {
        debug!(query = %name, "Searching customers");

        let customers = sqlx::query_as::<_, Customer>(&format!(
            "{SELECT_CUSTOMER} WHERE name LIKE '%' || ?1 || '%' ORDER BY name, id"
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(customers)
    }

    /// Applies the set fields of `update`; unset fields keep their value.
    pub async fn update(&self, id: i64, update: &CustomerUpdate) -> DbResult<Customer> {
        debug!(id, "Updating customer");

        let result = sqlx::query(
            r#"
            UPDATE Customer SET
                name        = COALESCE(?2, name),
                national_id = COALESCE(?3, national_id),
                email       = COALESCE(?4, email),
                phone       = COALESCE(?5, phone)
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(update.name.as_deref().map(str::trim))
        .bind(&update.national_id)
        .bind(&update.email)
        .bind(&update.phone)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))
    }

    /// Deletes the customer. Their sales are kept.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        debug!(id, "Deleting customer");

        let result = sqlx::query("DELETE FROM Customer WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", id));
        }

        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM Customer")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
