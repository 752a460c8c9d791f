//! Service-level error types.

use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by the order, catalog and audit services.
#[derive(Debug, Error)]
pub enum ShopError {
    /// Input was rejected before touching storage.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The write lost a race or broke a guard (stock, unique code).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Neither the primary nor the fallback store could serve the call.
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    /// A multi-write operation was rolled back.
    #[error("transaction failed: {0}")]
    TransactionFailure(String),

    /// Any other storage failure.
    #[error("store error: {0}")]
    Store(StoreError),
}

impl ShopError {
    /// Shorthand for [`ShopError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

impl From<StoreError> for ShopError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => Self::NotFound(what),
            StoreError::Conflict(msg) => Self::Conflict(msg),
            StoreError::Unavailable(msg) => Self::PersistenceUnavailable(msg),
            StoreError::Transaction(msg) => Self::TransactionFailure(msg),
            other @ (StoreError::DataCorruption(_) | StoreError::Database(_)) => Self::Store(other),
        }
    }
}

/// Errors returned by the coupon engine.
#[derive(Debug, Error)]
pub enum CouponError {
    /// Missing, inactive or expired.
    #[error("coupon not found or expired")]
    NotFound,

    /// Every allowed use has been consumed.
    #[error("coupon usage limit reached")]
    Exhausted,

    /// Storage failure.
    #[error(transparent)]
    Store(#[from] ShopError),
}

impl From<StoreError> for CouponError {
    fn from(err: StoreError) -> Self {
        Self::Store(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_to_service_errors() {
        assert!(matches!(
            ShopError::from(StoreError::not_found("order 7")),
            ShopError::NotFound(ref w) if w == "order 7"
        ));
        assert!(matches!(
            ShopError::from(StoreError::Unavailable("down".into())),
            ShopError::PersistenceUnavailable(_)
        ));
        assert!(matches!(
            ShopError::from(StoreError::Transaction("rolled back".into())),
            ShopError::TransactionFailure(_)
        ));
        assert!(matches!(
            ShopError::from(StoreError::DataCorruption("bad".into())),
            ShopError::Store(StoreError::DataCorruption(_))
        ));
    }
}
