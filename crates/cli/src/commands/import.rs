//! Import a product list produced by the external sync job.
//!
//! The file is a JSON array of products. Only `name` and `price` are
//! required per record:
//!
//! ```json
//! [{ "name": "Account", "price": "9.99", "quantity": 3, "category": "Social" }]
//! ```

use std::path::Path;

use tracing::info;

use stockhub_shop::models::NewProduct;
use stockhub_shop::{Shop, ShopConfig};

use super::CliError;

/// Read `file` and import every record in one batch.
///
/// # Errors
///
/// Returns `CliError` if the file cannot be read or parsed, or if any record
/// is invalid (nothing is imported then).
pub async fn run(config: &ShopConfig, file: &Path) -> Result<(), CliError> {
    let path = file.display().to_string();
    let bytes = tokio::fs::read(file).await.map_err(|source| CliError::Read {
        path: path.clone(),
        source,
    })?;
    let products: Vec<NewProduct> =
        serde_json::from_slice(&bytes).map_err(|source| CliError::Parse { path, source })?;

    let shop = Shop::from_config(config)?;
    let summary = shop.catalog().import_synced(&products, None).await?;
    info!(
        created = summary.created,
        synced_at = ?summary.synced_at,
        "Import complete"
    );
    Ok(())
}
