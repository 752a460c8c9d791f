//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! stockhub migrate
//! ```
//!
//! # Environment Variables
//!
//! - `STOCKHUB_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! Migrations live in `crates/shop/migrations/` and are embedded at build time.

use tracing::info;

use stockhub_shop::ShopConfig;
use stockhub_shop::db::{create_pool, run_migrations};

use super::CliError;

/// Apply every pending migration.
///
/// # Errors
///
/// Fails in demo mode, when the database is unreachable or a migration fails.
pub async fn run(config: &ShopConfig) -> Result<(), CliError> {
    let database_url = config.require_database_url()?;

    info!("Connecting to database...");
    let pool = create_pool(database_url, 1, config.store_timeout).await?;

    info!("Running migrations...");
    run_migrations(&pool).await?;

    info!("Migrations complete");
    Ok(())
}
