//! Admin audit log.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::error::ShopError;
use crate::models::{AdminLogEntry, AuditFilter, NewAdminLogEntry, Page};
use crate::store::Store;

/// Append-only trail of administrative actions.
#[derive(Clone)]
pub struct AuditLog {
    store: Arc<dyn Store>,
}

impl AuditLog {
    #[must_use]
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns `ShopError` if the entry cannot be stored.
    #[instrument(skip(self, entry), fields(action = %entry.action, target = %entry.target_type))]
    pub async fn record(&self, entry: NewAdminLogEntry) -> Result<AdminLogEntry, ShopError> {
        let stored = self.store.append_log(&entry).await?;
        debug!(log_id = %stored.id, target_id = ?stored.target_id, "Recorded admin action");
        Ok(stored)
    }

    /// Entries newest first. `None` uses the audit default of 100 rows.
    ///
    /// # Errors
    ///
    /// Returns `ShopError` if the log cannot be read.
    pub async fn list(
        &self,
        filter: &AuditFilter,
        page: Option<Page>,
    ) -> Result<Vec<AdminLogEntry>, ShopError> {
        let page = page.unwrap_or_else(Page::audit);
        Ok(self.store.list_logs(filter, page).await?)
    }
}
