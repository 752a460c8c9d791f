//! StockHub Core - Shared types library.
//!
//! This crate provides the types shared by every StockHub component:
//! - `shop` - Order lifecycle, coupons, catalog and dual-mode persistence
//! - `cli` - Command-line tools for migrations, seeding and imports
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access.
//! `sqlx` integration for the status enums and ids is gated behind the
//! `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype ids, lifecycle enums and contact types

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
