//! Coupon models and discount arithmetic.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use stockhub_core::{CouponId, DiscountType};

/// A discount code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: CouponId,
    /// Unique, stored upper-cased.
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    /// `None` means unlimited.
    pub max_uses: Option<i32>,
    pub uses: i32,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl Coupon {
    /// Whether the coupon has expired at `now`. Expiry is exclusive of the stamp.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Whether every allowed use has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.uses >= max)
    }

    /// Discount this coupon grants on `total`.
    ///
    /// Percent coupons are rounded half-up to cents. The result is clamped to
    /// `0..=total`.
    #[must_use]
    pub fn calculate_discount(&self, total: Decimal) -> Decimal {
        if total <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let raw = match self.discount_type {
            // Overflow needs a rate above 100%, which clamps to `total` anyway.
            DiscountType::Percent => total
                .checked_mul(self.discount_value / Decimal::ONE_HUNDRED)
                .map_or(total, |d| {
                    d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
                }),
            DiscountType::Fixed => self.discount_value.min(total),
        };
        raw.clamp(Decimal::ZERO, total)
    }
}

/// Normalize a coupon code for storage and lookup.
#[must_use]
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Input for creating a coupon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCoupon {
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    #[serde(default)]
    pub max_uses: Option<i32>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
}

const fn active_by_default() -> bool {
    true
}

impl NewCoupon {
    /// An active, unlimited, non-expiring coupon.
    #[must_use]
    pub fn new(code: impl Into<String>, discount_type: DiscountType, discount_value: Decimal) -> Self {
        Self {
            code: code.into(),
            discount_type,
            discount_value,
            max_uses: None,
            expires_at: None,
            is_active: true,
        }
    }

    /// Limit the number of redemptions.
    #[must_use]
    pub const fn with_max_uses(mut self, max_uses: i32) -> Self {
        self.max_uses = Some(max_uses);
        self
    }

    /// Set an expiry.
    #[must_use]
    pub const fn expiring_at(mut self, at: DateTime<Utc>) -> Self {
        self.expires_at = Some(at);
        self
    }
}

/// Partial coupon update. Only these fields are editable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CouponUpdate {
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub max_uses: Option<i32>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

impl CouponUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the update to an in-memory coupon.
    pub fn apply_to(&self, coupon: &mut Coupon) {
        if let Some(kind) = self.discount_type {
            coupon.discount_type = kind;
        }
        if let Some(value) = self.discount_value {
            coupon.discount_value = value;
        }
        if let Some(max) = self.max_uses {
            coupon.max_uses = Some(max);
        }
        if let Some(at) = self.expires_at {
            coupon.expires_at = Some(at);
        }
        if let Some(active) = self.is_active {
            coupon.is_active = active;
        }
    }
}

/// A successful redemption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redemption {
    /// The coupon as validated, before its use counter moved.
    pub coupon: Coupon,
    pub discount: Decimal,
    pub final_total: Decimal,
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn coupon(kind: DiscountType, value: Decimal) -> Coupon {
        Coupon {
            id: CouponId::new(1),
            code: "SAVE".to_owned(),
            discount_type: kind,
            discount_value: value,
            max_uses: None,
            uses: 0,
            expires_at: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn percent_discount() {
        let c = coupon(DiscountType::Percent, Decimal::from(20));
        let total = Decimal::from(100);
        let discount = c.calculate_discount(total);
        assert_eq!(discount, Decimal::from(20));
        assert_eq!(total - discount, Decimal::from(80));
    }

    #[test]
    fn percent_discount_rounds_to_cents() {
        let c = coupon(DiscountType::Percent, Decimal::from(15));
        // 15% of 3.33 = 0.4995
        assert_eq!(c.calculate_discount(Decimal::new(333, 2)), Decimal::new(50, 2));
    }

    #[test]
    fn fixed_discount_is_capped_at_total() {
        let c = coupon(DiscountType::Fixed, Decimal::from(50));
        assert_eq!(c.calculate_discount(Decimal::from(30)), Decimal::from(30));
        assert_eq!(c.calculate_discount(Decimal::from(80)), Decimal::from(50));
        assert_eq!(c.calculate_discount(Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn oversized_percent_never_exceeds_total() {
        let c = coupon(DiscountType::Percent, Decimal::from(150));
        assert_eq!(c.calculate_discount(Decimal::from(40)), Decimal::from(40));
        let negative = coupon(DiscountType::Fixed, Decimal::from(-5));
        assert_eq!(negative.calculate_discount(Decimal::from(40)), Decimal::ZERO);
    }

    #[test]
    fn percent_discount_of_huge_total_does_not_overflow() {
        let c = coupon(DiscountType::Percent, Decimal::from(20));
        let discount = c.calculate_discount(Decimal::MAX);
        assert!(discount > Decimal::ZERO && discount < Decimal::MAX);

        let over = coupon(DiscountType::Percent, Decimal::from(1000));
        assert_eq!(over.calculate_discount(Decimal::MAX), Decimal::MAX);
    }

    #[test]
    fn expiry_and_exhaustion() {
        let now = Utc::now();
        let mut c = coupon(DiscountType::Fixed, Decimal::ONE);
        assert!(!c.is_expired(now));
        c.expires_at = Some(now);
        assert!(c.is_expired(now));
        c.expires_at = Some(now + Duration::hours(1));
        assert!(!c.is_expired(now));

        c.max_uses = Some(2);
        c.uses = 1;
        assert!(!c.is_exhausted());
        c.uses = 2;
        assert!(c.is_exhausted());
    }

    #[test]
    fn update_touches_only_given_fields() {
        let mut c = coupon(DiscountType::Fixed, Decimal::ONE);
        CouponUpdate {
            is_active: Some(false),
            ..CouponUpdate::default()
        }
        .apply_to(&mut c);
        assert!(!c.is_active);
        assert_eq!(c.discount_value, Decimal::ONE);
    }

    #[test]
    fn codes_are_normalized() {
        assert_eq!(normalize_code("  welcome10 "), "WELCOME10");
    }
}
