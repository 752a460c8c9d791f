//! Dual-mode persistence.
//!
//! [`DualStore`] implements [`Store`] by trying the primary (`PostgreSQL`)
//! under a timeout and re-running the same call on the fallback store when
//! the primary is unreachable. Only connectivity failures fail over; a
//! `NotFound` or `Conflict` from the primary is the answer.
//!
//! A [`CircuitBreaker`] stops every call from waiting out the timeout while
//! the database is down.

mod breaker;

pub use breaker::{BreakerState, CircuitBreaker};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use stockhub_core::{
    CouponId, MediaId, MediaKind, OrderId, OrderStatus, PaymentStatus, ProductId, ProductStatus,
};

use crate::config::ShopConfig;
use crate::models::{
    AdminLogEntry, AuditFilter, Coupon, CouponUpdate, DashboardStats, ImportSummary,
    LowStockAlert, NewAdminLogEntry, NewCoupon, NewMedia, NewOrder, NewProduct, NewRefund, Order,
    OrderFilter, OrderStatusCounts, Page, Product, ProductFilter, ProductMedia, ProductUpdate, Refund, StatusChange,
    StockAdjustment, StockHistoryEntry,
};
use crate::store::{AuditStore, CatalogStore, CouponStore, OrderStore, Store, StoreError};

type StoreFuture<'a, T> = BoxFuture<'a, Result<T, StoreError>>;

/// Timeout and breaker settings for the primary store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverPolicy {
    pub timeout: Duration,
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
}

impl Default for FailoverPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            breaker_threshold: 3,
            breaker_cooldown: Duration::from_secs(30),
        }
    }
}

impl From<&ShopConfig> for FailoverPolicy {
    fn from(config: &ShopConfig) -> Self {
        Self {
            timeout: config.store_timeout,
            breaker_threshold: config.breaker_threshold,
            breaker_cooldown: config.breaker_cooldown,
        }
    }
}

/// Which backend a [`DualStore`] is currently sending calls to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    /// Primary configured and its breaker closed.
    Primary,
    /// Primary configured but skipped while the breaker is open.
    Degraded,
    /// No primary configured.
    Demo,
}

/// [`Store`] that prefers the primary and fails over to the fallback.
pub struct DualStore {
    primary: Option<Arc<dyn Store>>,
    fallback: Arc<dyn Store>,
    timeout: Duration,
    breaker: CircuitBreaker,
}

impl std::fmt::Debug for DualStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualStore")
            .field("has_primary", &self.primary.is_some())
            .field("timeout", &self.timeout)
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}

impl DualStore {
    /// Route calls to `primary`, failing over to `fallback`.
    #[must_use]
    pub fn new(primary: Arc<dyn Store>, fallback: Arc<dyn Store>, policy: FailoverPolicy) -> Self {
        Self {
            primary: Some(primary),
            fallback,
            timeout: policy.timeout,
            breaker: CircuitBreaker::new(policy.breaker_threshold, policy.breaker_cooldown),
        }
    }

    /// Serve every call from `fallback` (demo mode).
    #[must_use]
    pub fn fallback_only(fallback: Arc<dyn Store>) -> Self {
        let policy = FailoverPolicy::default();
        Self {
            primary: None,
            fallback,
            timeout: policy.timeout,
            breaker: CircuitBreaker::new(policy.breaker_threshold, policy.breaker_cooldown),
        }
    }

    pub async fn mode(&self) -> PersistenceMode {
        if self.primary.is_none() {
            return PersistenceMode::Demo;
        }
        match self.breaker.state().await {
            BreakerState::Closed => PersistenceMode::Primary,
            BreakerState::Open | BreakerState::HalfOpen => PersistenceMode::Degraded,
        }
    }

    #[must_use]
    pub const fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Run `call` on the primary when allowed, and on the fallback when the
    /// primary is skipped, times out or reports `Unavailable`.
    async fn route<'a, T, F>(&'a self, operation: &'static str, call: F) -> Result<T, StoreError>
    where
        T: Send,
        F: Fn(&'a dyn Store) -> StoreFuture<'a, T> + Send + Sync,
    {
        if let Some(primary) = self.primary.as_deref() {
            if self.breaker.allow().await {
                match tokio::time::timeout(self.timeout, call(primary)).await {
                    Ok(Ok(value)) => {
                        self.close_breaker().await;
                        return Ok(value);
                    }
                    Ok(Err(err)) if !err.is_unavailable() => {
                        self.close_breaker().await;
                        return Err(err);
                    }
                    Ok(Err(err)) => {
                        warn!(operation, error = %err, "Primary store unavailable, using fallback");
                        self.trip_breaker(operation).await;
                    }
                    Err(_) => {
                        warn!(
                            operation,
                            timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                            "Primary store timed out, using fallback"
                        );
                        self.trip_breaker(operation).await;
                    }
                }
            } else {
                debug!(operation, "Circuit open, using fallback");
            }
        }

        call(self.fallback.as_ref()).await
    }

    async fn close_breaker(&self) {
        if self.breaker.consecutive_failures().await > 0 {
            info!("Primary store reachable again");
        }
        self.breaker.record_success().await;
    }

    async fn trip_breaker(&self, operation: &'static str) {
        if self.breaker.record_failure().await {
            warn!(
                operation,
                cooldown_secs = self.breaker.cooldown().as_secs(),
                "Circuit breaker opened, skipping primary store"
            );
        }
    }
}

#[async_trait]
impl CatalogStore for DualStore {
    async fn create_product(&self, product: &NewProduct) -> Result<Product, StoreError> {
        self.route("create_product", |s| s.create_product(product))
            .await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        self.route("get_product", |s| s.get_product(id)).await
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<Vec<Product>, StoreError> {
        self.route("list_products", |s| s.list_products(filter, page))
            .await
    }

    async fn count_products(&self, filter: &ProductFilter) -> Result<i64, StoreError> {
        self.route("count_products", |s| s.count_products(filter))
            .await
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, StoreError> {
        self.route("update_product", |s| s.update_product(id, update))
            .await
    }

    async fn set_product_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<Product, StoreError> {
        self.route("set_product_status", |s| s.set_product_status(id, status))
            .await
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        self.route("delete_product", |s| s.delete_product(id)).await
    }

    async fn adjust_stock(
        &self,
        adjustment: &StockAdjustment,
    ) -> Result<StockHistoryEntry, StoreError> {
        self.route("adjust_stock", |s| s.adjust_stock(adjustment))
            .await
    }

    async fn stock_history(
        &self,
        id: ProductId,
        limit: i64,
    ) -> Result<Vec<StockHistoryEntry>, StoreError> {
        self.route("stock_history", |s| s.stock_history(id, limit))
            .await
    }

    async fn low_stock_alerts(&self) -> Result<Vec<LowStockAlert>, StoreError> {
        self.route("low_stock_alerts", |s| s.low_stock_alerts()).await
    }

    async fn add_media(&self, media: &NewMedia) -> Result<ProductMedia, StoreError> {
        self.route("add_media", |s| s.add_media(media)).await
    }

    async fn list_media(
        &self,
        product_id: ProductId,
        kind: Option<MediaKind>,
    ) -> Result<Vec<ProductMedia>, StoreError> {
        self.route("list_media", |s| s.list_media(product_id, kind))
            .await
    }

    async fn delete_media(&self, id: MediaId) -> Result<(), StoreError> {
        self.route("delete_media", |s| s.delete_media(id)).await
    }

    async fn import_products(&self, products: &[NewProduct]) -> Result<ImportSummary, StoreError> {
        self.route("import_products", |s| s.import_products(products))
            .await
    }
}

#[async_trait]
impl OrderStore for DualStore {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, StoreError> {
        self.route("create_order", |s| s.create_order(order)).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.route("get_order", |s| s.get_order(id)).await
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<StatusChange, StoreError> {
        self.route("set_order_status", |s| s.set_order_status(id, status))
            .await
    }

    async fn mark_delivered(&self, id: OrderId, notes: Option<&str>) -> Result<Order, StoreError> {
        self.route("mark_delivered", |s| s.mark_delivered(id, notes))
            .await
    }

    async fn set_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
        payment_intent_id: Option<&str>,
    ) -> Result<Order, StoreError> {
        self.route("set_payment_status", |s| {
            s.set_payment_status(id, status, payment_intent_id)
        })
        .await
    }

    async fn record_refund(&self, refund: &NewRefund) -> Result<Refund, StoreError> {
        self.route("record_refund", |s| s.record_refund(refund)).await
    }

    async fn refunds_for(&self, id: OrderId) -> Result<Vec<Refund>, StoreError> {
        self.route("refunds_for", |s| s.refunds_for(id)).await
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<Order>, StoreError> {
        self.route("list_orders", |s| s.list_orders(filter, page))
            .await
    }

    async fn order_stats(&self, now: DateTime<Utc>) -> Result<DashboardStats, StoreError> {
        self.route("order_stats", |s| s.order_stats(now)).await
    }

    async fn revenue_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Decimal, StoreError> {
        self.route("revenue_between", |s| s.revenue_between(since, until))
            .await
    }

    async fn order_counts_by_status(&self) -> Result<OrderStatusCounts, StoreError> {
        self.route("order_counts_by_status", |s| s.order_counts_by_status())
            .await
    }
}

#[async_trait]
impl CouponStore for DualStore {
    async fn create_coupon(&self, coupon: &NewCoupon) -> Result<Coupon, StoreError> {
        self.route("create_coupon", |s| s.create_coupon(coupon)).await
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        self.route("find_coupon_by_code", |s| s.find_coupon_by_code(code))
            .await
    }

    async fn get_coupon(&self, id: CouponId) -> Result<Option<Coupon>, StoreError> {
        self.route("get_coupon", |s| s.get_coupon(id)).await
    }

    async fn list_coupons(&self, page: Page) -> Result<Vec<Coupon>, StoreError> {
        self.route("list_coupons", |s| s.list_coupons(page)).await
    }

    async fn update_coupon(
        &self,
        id: CouponId,
        update: &CouponUpdate,
    ) -> Result<Coupon, StoreError> {
        self.route("update_coupon", |s| s.update_coupon(id, update))
            .await
    }

    async fn delete_coupon(&self, id: CouponId) -> Result<(), StoreError> {
        self.route("delete_coupon", |s| s.delete_coupon(id)).await
    }

    async fn apply_coupon(&self, id: CouponId) -> Result<bool, StoreError> {
        self.route("apply_coupon", |s| s.apply_coupon(id)).await
    }
}

#[async_trait]
impl AuditStore for DualStore {
    async fn append_log(&self, entry: &NewAdminLogEntry) -> Result<AdminLogEntry, StoreError> {
        self.route("append_log", |s| s.append_log(entry)).await
    }

    async fn list_logs(
        &self,
        filter: &AuditFilter,
        page: Page,
    ) -> Result<Vec<AdminLogEntry>, StoreError> {
        self.route("list_logs", |s| s.list_logs(filter, page)).await
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::fallback::FallbackStore;

    fn policy(threshold: u32) -> FailoverPolicy {
        FailoverPolicy {
            timeout: Duration::from_secs(5),
            breaker_threshold: threshold,
            breaker_cooldown: Duration::from_secs(60),
        }
    }

    /// A store whose product snapshot is a directory, so every catalog call
    /// fails with `Unavailable`.
    fn unreachable_catalog(dir: &tempfile::TempDir) -> Arc<dyn Store> {
        Arc::new(FallbackStore::with_snapshot(dir.path()))
    }

    #[tokio::test]
    async fn unavailable_primary_fails_over() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fallback = Arc::new(FallbackStore::in_memory());
        let store = DualStore::new(unreachable_catalog(&dir), fallback.clone(), policy(3));

        let created = store
            .create_product(&NewProduct::new("Kept", Decimal::ONE, 2))
            .await
            .expect("served by fallback");

        let seen = fallback.get_product(created.id).await.expect("get");
        assert_eq!(seen.map(|p| p.name), Some("Kept".to_owned()));
        assert_eq!(store.breaker().consecutive_failures().await, 1);
        assert_eq!(store.mode().await, PersistenceMode::Primary);
    }

    #[tokio::test]
    async fn breaker_skips_primary_after_threshold() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = DualStore::new(
            unreachable_catalog(&dir),
            Arc::new(FallbackStore::in_memory()),
            policy(2),
        );

        for _ in 0..2 {
            store
                .count_products(&ProductFilter::default())
                .await
                .expect("fallback");
        }
        assert_eq!(store.mode().await, PersistenceMode::Degraded);
        assert!(!store.breaker().allow().await);
    }

    #[tokio::test]
    async fn request_errors_do_not_fail_over() {
        let fallback = Arc::new(FallbackStore::in_memory());
        let product = fallback
            .create_product(&NewProduct::new("Only in fallback", Decimal::ONE, 1))
            .await
            .expect("seed");
        let store = DualStore::new(
            Arc::new(FallbackStore::in_memory()),
            fallback.clone(),
            policy(1),
        );

        let err = store.delete_product(product.id).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert!(fallback.get_product(product.id).await.expect("get").is_some());
        assert_eq!(store.mode().await, PersistenceMode::Primary);
    }

    #[tokio::test]
    async fn demo_mode_uses_fallback_only() {
        let store = DualStore::fallback_only(Arc::new(FallbackStore::in_memory()));
        assert_eq!(store.mode().await, PersistenceMode::Demo);
        let created = store
            .create_coupon(&NewCoupon::new(
                "save5",
                stockhub_core::DiscountType::Fixed,
                Decimal::new(500, 2),
            ))
            .await
            .expect("create");
        assert_eq!(created.code, "SAVE5");
    }
}
