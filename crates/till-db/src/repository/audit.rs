//! # Audit Log Repository
//!
//! Append-only activity log. Every mutating processor call writes one entry;
//! the sale entry is written inside the sale's own transaction so a rolled
//! back sale leaves no trace.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use till_core::{AuditEntry, DateRange};

const SELECT_ENTRY: &str = "SELECT id, operation, details, recorded_at FROM AuditLog";

#[derive(Debug, Clone)]
pub struct AuditLogRepository {
    pool: SqlitePool,
}

impl AuditLogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuditLogRepository { pool }
    }

    /// Appends an entry stamped with the current time.
    pub async fn record(&self, operation: &str, details: &serde_json::Value) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        record_in(&mut conn, operation, details).await
    }

    /// Every entry, oldest first.
    pub async fn list_all(&self) -> DbResult<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(&format!("{SELECT_ENTRY} ORDER BY id"))
            .fetch_all(&self.pool)
            .await?;

        Ok(entries)
    }

    /// Entries recorded on any day of `range` (UTC dates).
    pub async fn filter_by_range(&self, range: &DateRange) -> DbResult<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(&format!(
            "{SELECT_ENTRY} WHERE substr(recorded_at, 1, 10) BETWEEN ?1 AND ?2 ORDER BY id"
        ))
        .bind(range.from())
        .bind(range.to())
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

/// Appends an entry on an existing connection or transaction.
pub async fn record_in(
    conn: &mut SqliteConnection,
    operation: &str,
    details: &serde_json::Value,
) -> DbResult<i64> {
    debug!(operation, "Recording audit entry");

    let id = sqlx::query("INSERT INTO AuditLog (operation, details, recorded_at) VALUES (?1, ?2, ?3)")
        .bind(operation)
        .bind(details.to_string())
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?
        .last_insert_rowid();

    Ok(id)
}

#[cfg(test)]
mod tests {
    use crate::{Database, DbConfig};
    use chrono::{Duration, Utc};
    use serde_json::json;
    use till_core::DateRange;

    #[tokio::test]
    async fn test_record_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let log = db.audit_log();

        log.record("customer.created", &json!({ "id": 1, "name": "John Doe" }))
            .await
            .unwrap();
        log.record("customer.deleted", &json!({ "id": 1 })).await.unwrap();

        let entries = log.list_all().await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].operation, "customer.created");

        let details: serde_json::Value =
            serde_json::from_str(entries[0].details.as_deref().unwrap()).unwrap();
        assert_eq!(details["name"], "John Doe");
    }

    #[tokio::test]
    async fn test_filter_by_range() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let log = db.audit_log();
        log.record("product.created", &json!({ "code": "P001" })).await.unwrap();

        let today = Utc::now().date_naive();
        let around_today = DateRange::new(today - Duration::days(1), today + Duration::days(1)).unwrap();
        assert_eq!(log.filter_by_range(&around_today).await.unwrap().len(), 1);

        let last_year = DateRange::new(today - Duration::days(400), today - Duration::days(365)).unwrap();
        assert!(log.filter_by_range(&last_year).await.unwrap().is_empty());
    }
}
