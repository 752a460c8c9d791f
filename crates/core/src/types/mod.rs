//! Core types for StockHub.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod contact;
pub mod id;
pub mod status;

pub use contact::{ContactError, ContactHandle, Email};
pub use id::*;
pub use status::*;
