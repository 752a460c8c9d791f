//! JSON snapshot of the fallback product list.
//!
//! Layout: `{ "products": [...], "counter": <next id>, "last_sync": <timestamp|null> }`.
//! Several processes may share one file, so the store re-reads it before
//! every product access and rewrites it after every product mutation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::models::Product;
use crate::store::StoreError;

/// On-disk snapshot contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub products: Vec<Product>,
    /// Next product id to hand out.
    #[serde(default = "first_id")]
    pub counter: i32,
    #[serde(default)]
    pub last_sync: Option<DateTime<Utc>>,
}

const fn first_id() -> i32 {
    1
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            products: Vec::new(),
            counter: first_id(),
            last_sync: None,
        }
    }
}

/// A snapshot file location.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    /// Wrap a path. Nothing is read or created yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The snapshot path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. A missing file yields `None`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` on I/O failure and
    /// `StoreError::DataCorruption` if the JSON does not parse.
    pub async fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Unavailable(format!(
                    "cannot read snapshot {}: {e}",
                    self.path.display()
                )));
            }
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::DataCorruption(format!("invalid snapshot {}: {e}", self.path.display()))
        })?;
        debug!(
            path = %self.path.display(),
            products = snapshot.products.len(),
            "Loaded product snapshot"
        );
        Ok(Some(snapshot))
    }

    /// Write the snapshot through a sibling temp file and a rename. Readers
    /// never observe a half-written file.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Unavailable` on I/O failure.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let json = serde_json::to_vec_pretty(snapshot)
            .map_err(|e| StoreError::DataCorruption(format!("cannot encode snapshot: {e}")))?;

        // Unique per write: several processes may save the same snapshot.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(format!(".{}.tmp", uuid::Uuid::new_v4().simple()));
        let tmp = PathBuf::from(tmp);

        let io_err = |e: std::io::Error| {
            StoreError::Unavailable(format!("cannot write snapshot {}: {e}", self.path.display()))
        };
        tokio::fs::write(&tmp, json).await.map_err(io_err)?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(io_err)?;
        Ok(())
    }
}
