//! StockHub shop library.
//!
//! Order lifecycle, coupons, product catalog and the admin audit log, served
//! from `PostgreSQL` with an in-process demo store standing in whenever the
//! database is absent or unreachable.
//!
//! Start from [`Shop`]: build it with [`Shop::from_config`] and call the
//! services through it.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod fallback;
pub mod models;
pub mod persistence;
pub mod services;
pub mod state;
pub mod store;

pub use config::{ConfigError, ShopConfig};
pub use db::PgStore;
pub use error::{CouponError, ShopError};
pub use fallback::FallbackStore;
pub use persistence::{DualStore, FailoverPolicy, PersistenceMode};
pub use state::Shop;
pub use store::{Store, StoreError};
