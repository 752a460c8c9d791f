//! The [`Shop`] facade shared by every caller.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use stockhub_core::{CouponId, OrderId, OrderStatus, UserId};

use crate::config::ShopConfig;
use crate::db::{PgStore, create_lazy_pool};
use crate::error::{CouponError, ShopError};
use crate::fallback::FallbackStore;
use crate::models::{
    BulkAction, BulkOutcome, Checkout, Coupon, DashboardStats, Order, OrderFilter,
    OrderStatusCounts, Page, Refund,
};
use crate::persistence::{DualStore, FailoverPolicy, PersistenceMode};
use crate::services::{AuditLog, CatalogService, CouponService, OrderService};
use crate::store::{Store, StoreError};

/// Services over one store, cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct Shop {
    inner: Arc<ShopInner>,
}

struct ShopInner {
    store: Arc<DualStore>,
    orders: OrderService,
    coupons: CouponService,
    catalog: CatalogService,
    audit: AuditLog,
}

impl Shop {
    /// Build the shop described by `config`.
    ///
    /// With a database URL the primary is `PostgreSQL` behind a lazy pool
    /// and the demo store stands in while it is unreachable. Without one
    /// the shop runs on the demo store alone.
    ///
    /// # Errors
    ///
    /// Returns `ShopError` if the database URL cannot be parsed.
    pub fn from_config(config: &ShopConfig) -> Result<Self, ShopError> {
        let fallback: Arc<dyn Store> = Arc::new(FallbackStore::demo(&config.snapshot_path));

        let Some(url) = config.database_url.as_ref() else {
            warn!(
                snapshot = %config.snapshot_path.display(),
                "No database configured, running in demo mode"
            );
            return Ok(Self::from_store(DualStore::fallback_only(fallback)));
        };

        let pool = create_lazy_pool(url, config.max_connections, config.store_timeout)
            .map_err(StoreError::from)?;
        let primary: Arc<dyn Store> = Arc::new(PgStore::new(pool));
        info!(
            timeout = ?config.store_timeout,
            breaker_threshold = config.breaker_threshold,
            "Using PostgreSQL with demo fallback"
        );
        Ok(Self::from_store(DualStore::new(
            primary,
            fallback,
            FailoverPolicy::from(config),
        )))
    }

    /// A shop on the demo store alone.
    #[must_use]
    pub fn demo(snapshot_path: impl Into<PathBuf>) -> Self {
        Self::from_store(DualStore::fallback_only(Arc::new(FallbackStore::demo(
            snapshot_path,
        ))))
    }

    /// Wire the services over an existing store.
    #[must_use]
    pub fn from_store(store: DualStore) -> Self {
        let store = Arc::new(store);
        let shared: Arc<dyn Store> = store.clone();
        let audit = AuditLog::new(shared.clone());

        Self {
            inner: Arc::new(ShopInner {
                orders: OrderService::new(shared.clone(), audit.clone()),
                coupons: CouponService::new(shared.clone(), audit.clone()),
                catalog: CatalogService::new(shared, audit.clone()),
                audit,
                store,
            }),
        }
    }

    #[must_use]
    pub fn orders(&self) -> &OrderService {
        &self.inner.orders
    }

    #[must_use]
    pub fn coupons(&self) -> &CouponService {
        &self.inner.coupons
    }

    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    #[must_use]
    pub fn audit(&self) -> &AuditLog {
        &self.inner.audit
    }

    /// The routing store, for breaker inspection.
    #[must_use]
    pub fn store(&self) -> &DualStore {
        &self.inner.store
    }

    /// Which store is currently serving calls.
    pub async fn mode(&self) -> PersistenceMode {
        self.inner.store.mode().await
    }

    /// See [`OrderService::create_order`].
    ///
    /// # Errors
    ///
    /// Returns `ShopError` on validation, stock or storage failure.
    pub async fn create_order(&self, checkout: &Checkout) -> Result<Order, ShopError> {
        self.inner.orders.create_order(checkout).await
    }

    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown id.
    pub async fn get_order(&self, id: OrderId) -> Result<Order, ShopError> {
        self.inner.orders.get_order(id).await
    }

    /// See [`OrderService::set_status`].
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown id.
    pub async fn set_status(
        &self,
        id: OrderId,
        status: OrderStatus,
        admin: Option<UserId>,
    ) -> Result<Order, ShopError> {
        self.inner.orders.set_status(id, status, admin).await
    }

    /// See [`OrderService::verify_delivery`].
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown id.
    pub async fn verify_delivery(
        &self,
        id: OrderId,
        notes: Option<&str>,
        admin: Option<UserId>,
    ) -> Result<Order, ShopError> {
        self.inner.orders.verify_delivery(id, notes, admin).await
    }

    /// See [`OrderService::bulk_action`].
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Validation` for an empty id list.
    pub async fn bulk_action(
        &self,
        ids: &[OrderId],
        action: BulkAction,
        admin: Option<UserId>,
    ) -> Result<BulkOutcome, ShopError> {
        self.inner.orders.bulk_action(ids, action, admin).await
    }

    /// See [`OrderService::process_refund`].
    ///
    /// # Errors
    ///
    /// Returns `ShopError` if the amount is invalid, the order is unknown or
    /// the refund transaction fails.
    pub async fn process_refund(
        &self,
        id: OrderId,
        amount: Decimal,
        reason: &str,
        admin: Option<UserId>,
        payment_reference: Option<&str>,
    ) -> Result<Refund, ShopError> {
        self.inner
            .orders
            .process_refund(id, amount, reason, admin, payment_reference)
            .await
    }

    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<Order>, ShopError> {
        self.inner.orders.list_orders(filter, page).await
    }

    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn dashboard_stats(&self) -> Result<DashboardStats, ShopError> {
        self.inner.orders.dashboard_stats().await
    }

    /// See [`OrderService::revenue_between`].
    ///
    /// # Errors
    ///
    /// Returns `ShopError` for an empty range or a store failure.
    pub async fn revenue_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Decimal, ShopError> {
        self.inner.orders.revenue_between(since, until).await
    }

    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn order_counts_by_status(&self) -> Result<OrderStatusCounts, ShopError> {
        self.inner.orders.order_counts_by_status().await
    }

    /// # Errors
    ///
    /// Returns `CouponError` if the code is unusable.
    pub async fn validate_coupon(&self, code: &str) -> Result<Coupon, CouponError> {
        self.inner.coupons.validate_coupon(code).await
    }

    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn apply_coupon(&self, id: CouponId) -> Result<bool, ShopError> {
        self.inner.coupons.apply_coupon(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::DEMO_ORDER_ID;

    #[tokio::test]
    async fn demo_shop_serves_demo_data() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shop = Shop::demo(dir.path().join("demo-products.json"));

        assert_eq!(shop.mode().await, PersistenceMode::Demo);
        let order = shop
            .get_order(OrderId::new(DEMO_ORDER_ID))
            .await
            .expect("demo order");
        assert_eq!(order.status, OrderStatus::Pending);

        let coupon = shop.validate_coupon("welcome10").await.expect("coupon");
        assert!(shop.apply_coupon(coupon.id).await.expect("apply"));
    }

    #[tokio::test]
    async fn config_without_database_is_demo() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ShopConfig {
            snapshot_path: dir.path().join("demo-products.json"),
            ..ShopConfig::default()
        };
        let shop = Shop::from_config(&config).expect("shop");
        assert_eq!(shop.mode().await, PersistenceMode::Demo);
        assert!(shop.dashboard_stats().await.is_ok());
    }
}
