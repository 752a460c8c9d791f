//! Coupon engine: validation, discount arithmetic, redemption and admin.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{debug, info, instrument};

use stockhub_core::{CouponId, DiscountType, UserId};

use crate::error::{CouponError, ShopError};
use crate::models::coupon::normalize_code;
use crate::models::{
    AuditAction, AuditTarget, Coupon, CouponUpdate, MAX_AMOUNT, NewAdminLogEntry, NewCoupon, Page,
    Redemption,
};
use crate::services::AuditLog;
use crate::store::Store;

fn check_terms(
    discount_type: DiscountType,
    value: Decimal,
    max_uses: Option<i32>,
) -> Result<(), ShopError> {
    if value <= Decimal::ZERO {
        return Err(ShopError::validation("discount value must be positive"));
    }
    if discount_type == DiscountType::Percent && value > Decimal::ONE_HUNDRED {
        return Err(ShopError::validation("percent discount cannot exceed 100"));
    }
    if max_uses.is_some_and(|max| max < 1) {
        return Err(ShopError::validation("max uses must be at least 1"));
    }
    Ok(())
}

/// Coupon engine.
#[derive(Clone)]
pub struct CouponService {
    store: Arc<dyn Store>,
    audit: AuditLog,
}

impl CouponService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, audit: AuditLog) -> Self {
        Self { store, audit }
    }

    /// Look up a redeemable coupon by code (case-insensitive).
    ///
    /// # Errors
    ///
    /// - `CouponError::NotFound` if the code is unknown, inactive or expired
    /// - `CouponError::Exhausted` if every use has been consumed
    #[instrument(skip(self))]
    pub async fn validate_coupon(&self, code: &str) -> Result<Coupon, CouponError> {
        let coupon = self
            .store
            .find_coupon_by_code(code)
            .await?
            .ok_or(CouponError::NotFound)?;

        if !coupon.is_active || coupon.is_expired(Utc::now()) {
            debug!(code = %coupon.code, "Coupon inactive or expired");
            return Err(CouponError::NotFound);
        }
        if coupon.is_exhausted() {
            return Err(CouponError::Exhausted);
        }
        Ok(coupon)
    }

    /// Discount `coupon` grants on `total`; never negative, never above `total`.
    #[must_use]
    pub fn calculate_discount(coupon: &Coupon, total: Decimal) -> Decimal {
        coupon.calculate_discount(total)
    }

    /// Consume one use. Returns `false` when the coupon is exhausted or gone.
    ///
    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    #[instrument(skip(self), fields(coupon_id = %id))]
    pub async fn apply_coupon(&self, id: CouponId) -> Result<bool, ShopError> {
        let applied = self.store.apply_coupon(id).await?;
        debug!(applied, "Coupon use");
        Ok(applied)
    }

    /// Validate `code`, consume one use and price `total`.
    ///
    /// # Errors
    ///
    /// - `CouponError::NotFound` / `CouponError::Exhausted` as for
    ///   [`Self::validate_coupon`]; `Exhausted` also when another buyer took
    ///   the last use in between
    /// - `CouponError::Store(ShopError::Validation)` for a negative or
    ///   out-of-range total; no use is consumed then
    #[instrument(skip(self), fields(total = %total))]
    pub async fn redeem(&self, code: &str, total: Decimal) -> Result<Redemption, CouponError> {
        if total < Decimal::ZERO {
            return Err(ShopError::validation("total cannot be negative").into());
        }
        if total > MAX_AMOUNT {
            return Err(ShopError::validation("amount out of range").into());
        }
        let coupon = self.validate_coupon(code).await?;
        if !self.apply_coupon(coupon.id).await? {
            return Err(CouponError::Exhausted);
        }

        let discount = coupon.calculate_discount(total);
        info!(code = %coupon.code, discount = %discount, "Coupon redeemed");
        Ok(Redemption {
            coupon,
            discount,
            final_total: total - discount,
        })
    }

    /// # Errors
    ///
    /// - `Validation` for an empty code or out-of-range terms
    /// - `Conflict` if the code already exists
    #[instrument(skip(self, coupon), fields(code = %coupon.code))]
    pub async fn create_coupon(
        &self,
        coupon: &NewCoupon,
        admin: Option<UserId>,
    ) -> Result<Coupon, ShopError> {
        if normalize_code(&coupon.code).is_empty() {
            return Err(ShopError::validation("coupon code cannot be empty"));
        }
        check_terms(coupon.discount_type, coupon.discount_value, coupon.max_uses)?;

        let created = self.store.create_coupon(coupon).await?;
        info!(coupon_id = %created.id, "Coupon created");

        self.audit
            .record(NewAdminLogEntry::new(
                admin,
                AuditAction::Create,
                AuditTarget::Coupon,
                created.id.get(),
                json!(coupon),
            ))
            .await?;
        Ok(created)
    }

    /// Apply a partial update. The merged coupon must still satisfy the
    /// creation rules.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty update or out-of-range terms
    /// - `NotFound` for an unknown id
    /// - `Conflict` if `max_uses` would drop below the current use count
    #[instrument(skip(self, update), fields(coupon_id = %id))]
    pub async fn update_coupon(
        &self,
        id: CouponId,
        update: &CouponUpdate,
        admin: Option<UserId>,
    ) -> Result<Coupon, ShopError> {
        if update.is_empty() {
            return Err(ShopError::validation("no coupon fields to update"));
        }
        let mut merged = self
            .store
            .get_coupon(id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("coupon {id}")))?;
        update.apply_to(&mut merged);
        check_terms(merged.discount_type, merged.discount_value, merged.max_uses)?;

        let updated = self.store.update_coupon(id, update).await?;
        info!("Coupon updated");

        self.audit
            .record(NewAdminLogEntry::new(
                admin,
                AuditAction::Update,
                AuditTarget::Coupon,
                id.get(),
                json!(update),
            ))
            .await?;
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown id.
    #[instrument(skip(self), fields(coupon_id = %id))]
    pub async fn delete_coupon(&self, id: CouponId, admin: Option<UserId>) -> Result<(), ShopError> {
        self.store.delete_coupon(id).await?;
        info!("Coupon deleted");

        self.audit
            .record(NewAdminLogEntry::new(
                admin,
                AuditAction::Delete,
                AuditTarget::Coupon,
                id.get(),
                json!({}),
            ))
            .await?;
        Ok(())
    }

    /// Newest first.
    ///
    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn list_coupons(&self, page: Page) -> Result<Vec<Coupon>, ShopError> {
        Ok(self.store.list_coupons(page).await?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::fallback::FallbackStore;
    use crate::models::AuditFilter;

    fn cents(amount: i64) -> Decimal {
        Decimal::new(amount, 2)
    }

    fn service() -> (CouponService, AuditLog) {
        let store: Arc<dyn Store> = Arc::new(FallbackStore::in_memory());
        let audit = AuditLog::new(store.clone());
        (CouponService::new(store, audit.clone()), audit)
    }

    #[tokio::test]
    async fn percent_discount_on_hundred() {
        let (coupons, _) = service();
        coupons
            .create_coupon(&NewCoupon::new("twenty", DiscountType::Percent, Decimal::from(20)), None)
            .await
            .expect("create");

        let redemption = coupons
            .redeem("Twenty", Decimal::ONE_HUNDRED)
            .await
            .expect("redeem");
        assert_eq!(redemption.discount, Decimal::from(20));
        assert_eq!(redemption.final_total, Decimal::from(80));
    }

    #[tokio::test]
    async fn fixed_discount_is_capped_at_total() {
        let (coupons, _) = service();
        let coupon = coupons
            .create_coupon(&NewCoupon::new("BIG", DiscountType::Fixed, cents(5000)), None)
            .await
            .expect("create");
        assert_eq!(CouponService::calculate_discount(&coupon, cents(1999)), cents(1999));
        let redemption = coupons.redeem("big", cents(1999)).await.expect("redeem");
        assert_eq!(redemption.final_total, Decimal::ZERO);
    }

    #[tokio::test]
    async fn inactive_and_expired_codes_are_not_found() {
        let (coupons, _) = service();
        assert!(matches!(
            coupons.validate_coupon("missing").await,
            Err(CouponError::NotFound)
        ));

        let past = Utc::now() - Duration::minutes(1);
        coupons
            .create_coupon(
                &NewCoupon::new("OLD", DiscountType::Fixed, cents(100)).expiring_at(past),
                None,
            )
            .await
            .expect("create");
        assert!(matches!(
            coupons.validate_coupon("old").await,
            Err(CouponError::NotFound)
        ));

        let off = coupons
            .create_coupon(&NewCoupon::new("OFF", DiscountType::Fixed, cents(100)), None)
            .await
            .expect("create");
        let update = CouponUpdate {
            is_active: Some(false),
            ..CouponUpdate::default()
        };
        coupons.update_coupon(off.id, &update, None).await.expect("update");
        assert!(matches!(
            coupons.validate_coupon("off").await,
            Err(CouponError::NotFound)
        ));
    }

    #[tokio::test]
    async fn exhausted_after_max_uses() {
        let (coupons, _) = service();
        coupons
            .create_coupon(
                &NewCoupon::new("TWICE", DiscountType::Fixed, cents(100)).with_max_uses(2),
                None,
            )
            .await
            .expect("create");

        coupons.redeem("twice", cents(1000)).await.expect("first");
        coupons.redeem("twice", cents(1000)).await.expect("second");
        assert!(matches!(
            coupons.redeem("twice", cents(1000)).await,
            Err(CouponError::Exhausted)
        ));
    }

    #[tokio::test]
    async fn out_of_range_total_consumes_no_use() {
        let (coupons, _) = service();
        let coupon = coupons
            .create_coupon(
                &NewCoupon::new("ONCE", DiscountType::Percent, Decimal::from(20)).with_max_uses(1),
                None,
            )
            .await
            .expect("create");

        assert!(matches!(
            coupons.redeem("once", Decimal::MAX).await,
            Err(CouponError::Store(ShopError::Validation(_)))
        ));
        let unchanged = coupons.validate_coupon("once").await.expect("still valid");
        assert_eq!(unchanged.uses, 0);

        let redemption = coupons.redeem("once", MAX_AMOUNT).await.expect("redeem");
        assert_eq!(redemption.coupon.id, coupon.id);
        assert_eq!(redemption.final_total + redemption.discount, MAX_AMOUNT);
    }

    #[tokio::test]
    async fn max_uses_cannot_drop_below_uses() {
        let (coupons, _) = service();
        let coupon = coupons
            .create_coupon(
                &NewCoupon::new("TRIO", DiscountType::Fixed, cents(100)).with_max_uses(5),
                None,
            )
            .await
            .expect("create");
        for _ in 0..3 {
            assert!(coupons.apply_coupon(coupon.id).await.expect("apply"));
        }

        let lower = CouponUpdate {
            max_uses: Some(2),
            ..CouponUpdate::default()
        };
        assert!(matches!(
            coupons.update_coupon(coupon.id, &lower, None).await,
            Err(ShopError::Conflict(_))
        ));
        let exact = CouponUpdate {
            max_uses: Some(3),
            ..CouponUpdate::default()
        };
        let updated = coupons
            .update_coupon(coupon.id, &exact, None)
            .await
            .expect("update");
        assert!(updated.is_exhausted());
    }

    #[tokio::test]
    async fn concurrent_applies_respect_the_limit() {
        let (coupons, _) = service();
        let coupon = coupons
            .create_coupon(
                &NewCoupon::new("RACE", DiscountType::Percent, Decimal::TEN).with_max_uses(3),
                None,
            )
            .await
            .expect("create");

        let id = coupon.id;
        let tasks: Vec<_> = (0..10)
            .map(|_| {
                let coupons = coupons.clone();
                tokio::spawn(async move { coupons.apply_coupon(id).await })
            })
            .collect();
        let mut successes = 0;
        for task in tasks {
            if task.await.expect("join").expect("apply") {
                successes += 1;
            }
        }
        assert_eq!(successes, 3);
    }

    #[tokio::test]
    async fn admin_changes_are_validated_and_audited() {
        let (coupons, audit) = service();
        let bad = [
            NewCoupon::new("  ", DiscountType::Fixed, cents(100)),
            NewCoupon::new("ZERO", DiscountType::Fixed, Decimal::ZERO),
            NewCoupon::new("HUGE", DiscountType::Percent, Decimal::from(150)),
            NewCoupon::new("NONE", DiscountType::Fixed, cents(100)).with_max_uses(0),
        ];
        for coupon in &bad {
            assert!(matches!(
                coupons.create_coupon(coupon, None).await,
                Err(ShopError::Validation(_))
            ));
        }

        let coupon = coupons
            .create_coupon(&NewCoupon::new("SAVE", DiscountType::Fixed, Decimal::from(500)), None)
            .await
            .expect("create");
        let to_percent = CouponUpdate {
            discount_type: Some(DiscountType::Percent),
            ..CouponUpdate::default()
        };
        // 500 percent once the type flips.
        assert!(matches!(
            coupons.update_coupon(coupon.id, &to_percent, None).await,
            Err(ShopError::Validation(_))
        ));
        assert!(matches!(
            coupons
                .update_coupon(coupon.id, &CouponUpdate::default(), None)
                .await,
            Err(ShopError::Validation(_))
        ));

        coupons.delete_coupon(coupon.id, None).await.expect("delete");
        assert!(matches!(
            coupons.delete_coupon(coupon.id, None).await,
            Err(ShopError::NotFound(_))
        ));

        let actions: Vec<_> = audit
            .list(&AuditFilter::default(), None)
            .await
            .expect("list")
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, vec![AuditAction::Delete, AuditAction::Create]);
    }
}
