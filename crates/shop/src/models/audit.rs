//! Admin audit log records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockhub_core::{AdminLogId, UserId};

/// Action tag stored on an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
    UpdateStatus,
    VerifyOrder,
    BulkAction,
    Refund,
    UpdatePayment,
    AdjustStock,
    Import,
}

impl AuditAction {
    /// Stored spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::UpdateStatus => "UPDATE_STATUS",
            Self::VerifyOrder => "VERIFY_ORDER",
            Self::BulkAction => "BULK_ACTION",
            Self::Refund => "REFUND",
            Self::UpdatePayment => "UPDATE_PAYMENT",
            Self::AdjustStock => "ADJUST_STOCK",
            Self::Import => "IMPORT",
        }
    }

    const ALL: [Self; 10] = [
        Self::Create,
        Self::Update,
        Self::Delete,
        Self::UpdateStatus,
        Self::VerifyOrder,
        Self::BulkAction,
        Self::Refund,
        Self::UpdatePayment,
        Self::AdjustStock,
        Self::Import,
    ];
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| format!("unknown audit action: {s}"))
    }
}

/// Kind of entity an audit entry refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditTarget {
    Product,
    Order,
    /// Several orders at once (bulk actions).
    Orders,
    Coupon,
    User,
}

impl AuditTarget {
    /// Stored spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Order => "order",
            Self::Orders => "orders",
            Self::Coupon => "coupon",
            Self::User => "user",
        }
    }
}

impl std::fmt::Display for AuditTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AuditTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "product" => Ok(Self::Product),
            "order" => Ok(Self::Order),
            "orders" => Ok(Self::Orders),
            "coupon" => Ok(Self::Coupon),
            "user" => Ok(Self::User),
            _ => Err(format!("unknown audit target: {s}")),
        }
    }
}

/// An entry to append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAdminLogEntry {
    pub admin_id: Option<UserId>,
    pub action: AuditAction,
    pub target_type: AuditTarget,
    pub target_id: Option<i32>,
    pub details: serde_json::Value,
}

impl NewAdminLogEntry {
    /// An entry about a single entity.
    #[must_use]
    pub fn new(
        admin_id: Option<UserId>,
        action: AuditAction,
        target_type: AuditTarget,
        target_id: impl Into<Option<i32>>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            admin_id,
            action,
            target_type,
            target_id: target_id.into(),
            details,
        }
    }
}

/// A stored audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminLogEntry {
    pub id: AdminLogId,
    pub admin_id: Option<UserId>,
    pub action: AuditAction,
    pub target_type: AuditTarget,
    pub target_id: Option<i32>,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

/// Audit listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditFilter {
    pub admin_id: Option<UserId>,
    /// Inclusive lower bound.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound.
    pub until: Option<DateTime<Utc>>,
}

impl AuditFilter {
    /// In-memory equivalent of the SQL `WHERE` clause.
    #[must_use]
    pub fn matches(&self, entry: &AdminLogEntry) -> bool {
        self.admin_id.is_none_or(|id| entry.admin_id == Some(id))
            && self.since.is_none_or(|since| entry.timestamp >= since)
            && self.until.is_none_or(|until| entry.timestamp < until)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    #[test]
    fn action_spellings_round_trip() {
        for action in AuditAction::ALL {
            assert_eq!(action.as_str().parse(), Ok(action));
        }
        let json = serde_json::to_string(&AuditAction::VerifyOrder).expect("serialize");
        assert_eq!(json, "\"VERIFY_ORDER\"");
    }

    #[test]
    fn filter_by_admin_and_range() {
        let now = Utc::now();
        let entry = AdminLogEntry {
            id: AdminLogId::new(1),
            admin_id: Some(UserId::new(7)),
            action: AuditAction::Refund,
            target_type: AuditTarget::Order,
            target_id: Some(10_000),
            details: json!({ "amount": "5.00" }),
            timestamp: now,
        };

        assert!(AuditFilter::default().matches(&entry));
        let other_admin = AuditFilter {
            admin_id: Some(UserId::new(8)),
            ..AuditFilter::default()
        };
        assert!(!other_admin.matches(&entry));
        let before = AuditFilter {
            until: Some(now),
            ..AuditFilter::default()
        };
        assert!(!before.matches(&entry));
        let window = AuditFilter {
            since: Some(now - Duration::minutes(1)),
            until: Some(now + Duration::minutes(1)),
            ..AuditFilter::default()
        };
        assert!(window.matches(&entry));
    }
}
