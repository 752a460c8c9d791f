//! CLI command implementations.

pub mod import;
pub mod migrate;
pub mod seed;
pub mod stats;

use thiserror::Error;

use stockhub_shop::{ConfigError, ShopError};

/// Errors surfaced by any command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Shop(#[from] ShopError),

    #[error("cannot read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("invalid product list {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("cannot encode output: {0}")]
    Output(#[from] serde_json::Error),
}
