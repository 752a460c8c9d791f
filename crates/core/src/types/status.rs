//! Status enums for orders, products, coupons and stock movements.
//!
//! Each enum maps to a `PostgreSQL` enum type of the same snake_case name
//! (with the `postgres` feature) and round-trips through `Display`/`FromStr`
//! using the stored spelling.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a stored or user-supplied status string is unknown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

impl ParseStatusError {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Implements `as_str`, `Display` and `FromStr` from one spelling table.
macro_rules! stored_spelling {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            /// The spelling used in storage and logs.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(ParseStatusError::new($kind, s)),
                }
            }
        }
    };
}

/// Lifecycle status of an order.
///
/// `Pending` is the initial state; `Delivered` and `Cancelled` are terminal.
/// Payment and refund state are tracked separately and never change this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Delivered,
    Cancelled,
}

stored_spelling!(OrderStatus, "order status", {
    Pending => "pending",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

/// Classification of a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionKind {
    /// A forward move along the lifecycle.
    Standard,
    /// The order already has the requested status.
    Unchanged,
    /// Leaves a terminal state or re-opens an order. Admins may still force it.
    Override,
}

impl OrderStatus {
    /// Whether the status is a final disposition.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Classify a move from `self` to `next`.
    #[must_use]
    pub const fn check_transition(self, next: Self) -> TransitionKind {
        match (self, next) {
            (Self::Pending, Self::Delivered | Self::Cancelled) => TransitionKind::Standard,
            (Self::Pending, Self::Pending)
            | (Self::Delivered, Self::Delivered)
            | (Self::Cancelled, Self::Cancelled) => TransitionKind::Unchanged,
            (Self::Delivered, Self::Pending | Self::Cancelled)
            | (Self::Cancelled, Self::Pending | Self::Delivered) => TransitionKind::Override,
        }
    }
}

/// Payment state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Unpaid,
    Paid,
    Refunded,
}

stored_spelling!(PaymentStatus, "payment status", {
    Unpaid => "unpaid",
    Paid => "paid",
    Refunded => "refunded",
});

/// Whether any refund has been booked against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(type_name = "refund_status"))]
pub enum RefundStatus {
    #[default]
    #[serde(rename = "none")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "none"))]
    NotRefunded,
    #[serde(rename = "refunded")]
    #[cfg_attr(feature = "postgres", sqlx(rename = "refunded"))]
    Refunded,
}

stored_spelling!(RefundStatus, "refund status", {
    NotRefunded => "none",
    Refunded => "refunded",
});

/// Catalog status of a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    #[default]
    Active,
    Draft,
    OutOfStock,
    Deleted,
}

stored_spelling!(ProductStatus, "product status", {
    Active => "active",
    Draft => "draft",
    OutOfStock => "out_of_stock",
    Deleted => "deleted",
});

impl ProductStatus {
    /// Status after the stock level changes to `quantity`.
    ///
    /// Active products with no stock become `OutOfStock`; restocked
    /// `OutOfStock` products become `Active`. Drafts and deleted products
    /// keep their status.
    #[must_use]
    pub const fn for_quantity(self, quantity: i32) -> Self {
        match self {
            Self::Active if quantity <= 0 => Self::OutOfStock,
            Self::OutOfStock if quantity > 0 => Self::Active,
            other => other,
        }
    }

    /// Whether the product may be sold.
    #[must_use]
    pub const fn is_sellable(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// How a coupon's `discount_value` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "discount_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    /// Percentage of the order total.
    Percent,
    /// Flat amount, capped at the order total.
    Fixed,
}

stored_spelling!(DiscountType, "discount type", {
    Percent => "percent",
    Fixed => "fixed",
});

/// Reason recorded for a stock level change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "stock_change_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum StockChangeKind {
    /// Reserved by a checkout.
    Sale,
    /// New stock received.
    Restock,
    /// Manual correction by an admin.
    Adjustment,
    /// Quantity taken from a synced product list.
    Import,
}

stored_spelling!(StockChangeKind, "stock change kind", {
    Sale => "sale",
    Restock => "restock",
    Adjustment => "adjustment",
    Import => "import",
});

/// Kind of media attached to a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "media_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    File,
}

stored_spelling!(MediaKind, "media kind", {
    Image => "image",
    File => "file",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_transitions_are_classified() {
        use OrderStatus::{Cancelled, Delivered, Pending};

        assert_eq!(Pending.check_transition(Delivered), TransitionKind::Standard);
        assert_eq!(Pending.check_transition(Cancelled), TransitionKind::Standard);
        assert_eq!(Delivered.check_transition(Delivered), TransitionKind::Unchanged);
        assert_eq!(Delivered.check_transition(Pending), TransitionKind::Override);
        assert_eq!(Cancelled.check_transition(Delivered), TransitionKind::Override);
    }

    #[test]
    fn terminal_states() {
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
    }

    #[test]
    fn product_status_follows_stock() {
        assert_eq!(ProductStatus::Active.for_quantity(0), ProductStatus::OutOfStock);
        assert_eq!(ProductStatus::Active.for_quantity(3), ProductStatus::Active);
        assert_eq!(ProductStatus::OutOfStock.for_quantity(1), ProductStatus::Active);
        assert_eq!(ProductStatus::Draft.for_quantity(0), ProductStatus::Draft);
        assert_eq!(ProductStatus::Deleted.for_quantity(5), ProductStatus::Deleted);
    }

    #[test]
    fn spellings_round_trip() {
        assert_eq!("out_of_stock".parse(), Ok(ProductStatus::OutOfStock));
        assert_eq!(RefundStatus::NotRefunded.to_string(), "none");
        assert_eq!("none".parse(), Ok(RefundStatus::NotRefunded));
        assert!("completed".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn serde_uses_stored_spelling() {
        let json = serde_json::to_string(&RefundStatus::NotRefunded).expect("serialize");
        assert_eq!(json, "\"none\"");
        let json = serde_json::to_string(&ProductStatus::OutOfStock).expect("serialize");
        assert_eq!(json, "\"out_of_stock\"");
    }
}
