//! Admin audit log repository. Rows are only ever inserted.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use stockhub_core::{AdminLogId, UserId};

use crate::models::{AdminLogEntry, AuditFilter, NewAdminLogEntry, Page};
use crate::store::StoreError;

const LOG_COLUMNS: &str = "log_id, admin_id, action, target_type, target_id, details, timestamp";

#[derive(Debug, sqlx::FromRow)]
struct AdminLogRow {
    log_id: AdminLogId,
    admin_id: Option<UserId>,
    action: String,
    target_type: String,
    target_id: Option<i32>,
    details: serde_json::Value,
    timestamp: DateTime<Utc>,
}

impl TryFrom<AdminLogRow> for AdminLogEntry {
    type Error = StoreError;

    fn try_from(row: AdminLogRow) -> Result<Self, Self::Error> {
        let action = row
            .action
            .parse()
            .map_err(|e| StoreError::DataCorruption(format!("invalid action in database: {e}")))?;
        let target_type = row.target_type.parse().map_err(|e| {
            StoreError::DataCorruption(format!("invalid target type in database: {e}"))
        })?;

        Ok(Self {
            id: row.log_id,
            admin_id: row.admin_id,
            action,
            target_type,
            target_id: row.target_id,
            details: row.details,
            timestamp: row.timestamp,
        })
    }
}

/// Repository for the admin audit log.
pub struct AdminLogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AdminLogRepository<'a> {
    /// Create a new audit log repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the insert fails.
    pub async fn append(&self, entry: &NewAdminLogEntry) -> Result<AdminLogEntry, StoreError> {
        let sql = format!(
            r"
            INSERT INTO admin_logs (admin_id, action, target_type, target_id, details)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {LOG_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, AdminLogRow>(&sql)
            .bind(entry.admin_id)
            .bind(entry.action.as_str())
            .bind(entry.target_type.as_str())
            .bind(entry.target_id)
            .bind(&entry.details)
            .fetch_one(self.pool)
            .await?;

        row.try_into()
    }

    /// List entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::DataCorruption` if a stored tag is unknown.
    pub async fn list(
        &self,
        filter: &AuditFilter,
        page: Page,
    ) -> Result<Vec<AdminLogEntry>, StoreError> {
        let sql = format!(
            r"
            SELECT {LOG_COLUMNS}
            FROM admin_logs
            WHERE ($1::int IS NULL OR admin_id = $1)
              AND ($2::timestamptz IS NULL OR timestamp >= $2)
              AND ($3::timestamptz IS NULL OR timestamp < $3)
            ORDER BY timestamp DESC, log_id DESC
            LIMIT $4 OFFSET $5
            "
        );
        let rows = sqlx::query_as::<_, AdminLogRow>(&sql)
            .bind(filter.admin_id)
            .bind(filter.since)
            .bind(filter.until)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }
}
