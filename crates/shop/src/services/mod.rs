//! Business services built on a [`crate::store::Store`].
//!
//! - [`orders::OrderService`] - Checkout, lifecycle, refunds, dashboard
//! - [`coupons::CouponService`] - Coupon validation, redemption and admin
//! - [`catalog::CatalogService`] - Products, stock ledger, media, imports
//! - [`audit::AuditLog`] - Append-only admin audit trail
//!
//! Services never know which store served them. Admin mutations append an
//! audit entry after the write succeeded; a failing audit write is returned
//! to the caller.

pub mod audit;
pub mod catalog;
pub mod coupons;
pub mod orders;

pub use audit::AuditLog;
pub use catalog::CatalogService;
pub use coupons::CouponService;
pub use orders::OrderService;
