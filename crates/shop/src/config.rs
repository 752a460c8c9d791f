//! Shop configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `STOCKHUB_DATABASE_URL` - `PostgreSQL` connection string (falls back to
//!   `DATABASE_URL`; when neither is set the shop runs in demo mode)
//! - `STOCKHUB_SNAPSHOT_PATH` - Product snapshot for the fallback store
//!   (default: ./demo-products.json)
//! - `STOCKHUB_STORE_TIMEOUT_MS` - Per-call timeout on the primary store (default: 5000)
//! - `STOCKHUB_BREAKER_THRESHOLD` - Consecutive failures before the breaker opens (default: 3)
//! - `STOCKHUB_BREAKER_COOLDOWN_SECS` - Seconds the breaker stays open (default: 30)
//! - `STOCKHUB_DB_MAX_CONNECTIONS` - Pool size (default: 10)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment (e.g., "staging")

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

const DEFAULT_SNAPSHOT_PATH: &str = "./demo-products.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Shop configuration.
///
/// Implements `Debug` manually to redact the database URL.
#[derive(Clone)]
pub struct ShopConfig {
    /// `PostgreSQL` connection URL (contains password). `None` means demo mode.
    pub database_url: Option<SecretString>,
    /// JSON snapshot backing the fallback product list
    pub snapshot_path: PathBuf,
    /// Timeout applied to every primary store call
    pub store_timeout: Duration,
    /// Consecutive connectivity failures before calls skip the primary
    pub breaker_threshold: u32,
    /// How long the breaker stays open before probing again
    pub breaker_cooldown: Duration,
    /// Maximum pooled database connections
    pub max_connections: u32,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
}

impl std::fmt::Debug for ShopConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopConfig")
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .field("snapshot_path", &self.snapshot_path)
            .field("store_timeout", &self.store_timeout)
            .field("breaker_threshold", &self.breaker_threshold)
            .field("breaker_cooldown", &self.breaker_cooldown)
            .field("max_connections", &self.max_connections)
            .field("sentry_dsn", &self.sentry_dsn.as_ref().map(|_| "[REDACTED]"))
            .field("sentry_environment", &self.sentry_environment)
            .finish()
    }
}

impl Default for ShopConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            store_timeout: Duration::from_millis(5000),
            breaker_threshold: 3,
            breaker_cooldown: Duration::from_secs(30),
            max_connections: 10,
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

impl ShopConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a numeric variable does not parse or is zero.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let database_url = env
            .get_optional("STOCKHUB_DATABASE_URL")
            .or_else(|| env.get_optional("DATABASE_URL"))
            .map(SecretString::from);

        let snapshot_path =
            PathBuf::from(env.get_or_default("STOCKHUB_SNAPSHOT_PATH", DEFAULT_SNAPSHOT_PATH));
        let store_timeout_ms: u64 = env.parse_positive("STOCKHUB_STORE_TIMEOUT_MS", 5000)?;
        let breaker_threshold: u32 = env.parse_positive("STOCKHUB_BREAKER_THRESHOLD", 3)?;
        let cooldown_secs: u64 = env.parse_positive("STOCKHUB_BREAKER_COOLDOWN_SECS", 30)?;
        let max_connections: u32 = env.parse_positive("STOCKHUB_DB_MAX_CONNECTIONS", 10)?;

        Ok(Self {
            database_url,
            snapshot_path,
            store_timeout: Duration::from_millis(store_timeout_ms),
            breaker_threshold,
            breaker_cooldown: Duration::from_secs(cooldown_secs),
            max_connections,
            sentry_dsn: env.get_optional("SENTRY_DSN"),
            sentry_environment: env.get_optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Whether no database is configured.
    #[must_use]
    pub const fn is_demo_mode(&self) -> bool {
        self.database_url.is_none()
    }

    /// Get the database URL or fail with the variable that should be set.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` in demo mode.
    pub fn require_database_url(&self) -> Result<&SecretString, ConfigError> {
        self.database_url
            .as_ref()
            .ok_or_else(|| ConfigError::MissingEnvVar("STOCKHUB_DATABASE_URL".to_string()))
    }
}

struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    /// Get an optional variable, treating blank values as unset.
    fn get_optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a variable with a default value.
    fn get_or_default(&self, key: &str, default: &str) -> String {
        self.get_optional(key)
            .unwrap_or_else(|| default.to_string())
    }

    /// Parse a positive number, defaulting when unset.
    fn parse_positive<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialOrd + Default,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = self.get_optional(key) else {
            return Ok(default);
        };
        let value = raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
        if value <= T::default() {
            return Err(ConfigError::InvalidEnvVar(
                key.to_string(),
                "must be greater than zero".to_string(),
            ));
        }
        Ok(value)
    }
}
