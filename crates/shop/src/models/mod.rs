//! Domain models shared by the stores and services.
//!
//! Each submodule holds the persisted record types for one area, the inputs
//! used to create or change them and the filters used to query them.

pub mod audit;
pub mod coupon;
pub mod order;
pub mod product;

pub use audit::{AdminLogEntry, AuditAction, AuditFilter, AuditTarget, NewAdminLogEntry};
pub use coupon::{Coupon, CouponUpdate, NewCoupon, Redemption};
pub use order::{
    BillingDetails, BulkAction, BulkOutcome, Buyer, Checkout, DashboardStats, DateWindow,
    LineItem, NewOrder, NewRefund, Order, OrderFilter, OrderItem, OrderStatusCounts,
    PaymentDetails, Refund, ShippingDetails, StatusChange,
};
pub use product::{
    ImportSummary, LowStockAlert, NewMedia, NewProduct, Product, ProductFilter, ProductMedia,
    ProductSort, ProductUpdate, StockAdjustment, StockHistoryEntry,
};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Largest amount a stored money column holds (`NUMERIC(12, 2)`).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0xD4A5_0FFF, 0xE8, 0, false, 2);

/// Limit/offset pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Largest page a caller may request.
    pub const MAX_LIMIT: i64 = 500;

    /// Build a page, clamping the limit to `1..=MAX_LIMIT` and the offset to `>= 0`.
    #[must_use]
    pub fn new(limit: i64, offset: i64) -> Self {
        Self {
            limit: limit.clamp(1, Self::MAX_LIMIT),
            offset: offset.max(0),
        }
    }

    /// Default page for audit log listings.
    #[must_use]
    pub const fn audit() -> Self {
        Self {
            limit: 100,
            offset: 0,
        }
    }

    /// Apply the page to an already ordered iterator.
    pub fn slice<T>(&self, items: impl IntoIterator<Item = T>) -> Vec<T> {
        let skip = usize::try_from(self.offset).unwrap_or(0);
        let take = usize::try_from(self.limit).unwrap_or(0);
        items.into_iter().skip(skip).take(take).collect()
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// Case-insensitive substring match used by the in-memory filters.
pub(crate) fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_clamps_bounds() {
        assert_eq!(Page::new(0, -5), Page { limit: 1, offset: 0 });
        assert_eq!(Page::new(10_000, 3).limit, Page::MAX_LIMIT);
    }

    #[test]
    fn max_amount_matches_column_precision() {
        assert_eq!(MAX_AMOUNT.to_string(), "9999999999.99");
    }

    #[test]
    fn page_slices_items() {
        let page = Page::new(2, 1);
        assert_eq!(page.slice(1..=5), vec![2, 3]);
        assert_eq!(Page::new(10, 10).slice(1..=5), Vec::<i32>::new());
    }
}
