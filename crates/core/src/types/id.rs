//! Newtype IDs for type-safe entity references.
//!
//! Every table in the store uses `SERIAL` integer keys. Wrapping them keeps an
//! order id from being passed where a product id is expected.

use core::fmt;
use core::num::ParseIntError;
use core::str::FromStr;

/// Defines an `i32`-backed id newtype.
///
/// The generated type is `Copy`, orders like its inner integer, serializes
/// transparently and (with the `postgres` feature) maps to `INTEGER` columns.
macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            PartialOrd,
            Ord,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize
        )]
        #[cfg_attr(feature = "postgres", derive(sqlx::Type))]
        #[cfg_attr(feature = "postgres", sqlx(transparent))]
        #[serde(transparent)]
        pub struct $name(i32);

        impl $name {
            /// Wrap a raw database id.
            #[must_use]
            pub const fn new(id: i32) -> Self {
                Self(id)
            }

            /// The raw database id.
            #[must_use]
            pub const fn get(self) -> i32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i32>().map(Self)
            }
        }

        impl From<i32> for $name {
            fn from(id: i32) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i32 {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

entity_id!(
    /// A registered storefront user (customers and administrators alike).
    UserId
);
entity_id!(
    /// A catalog product.
    ProductId
);
entity_id!(
    /// An image or downloadable file attached to a product.
    MediaId
);
entity_id!(
    /// A row in the stock history ledger.
    StockHistoryId
);
entity_id!(
    /// A customer order.
    OrderId
);
entity_id!(
    /// A line item of an order.
    OrderItemId
);
entity_id!(
    /// A refund issued against an order.
    RefundId
);
entity_id!(
    /// A discount coupon.
    CouponId
);
entity_id!(
    /// An admin audit log entry.
    AdminLogId
);
