//! `PostgreSQL` store.
//!
//! ## Tables
//!
//! - `users` - Registered customers and admins (referenced by orders and logs)
//! - `products` - Catalog with stock levels
//! - `stock_history` - Ledger of every stock change
//! - `product_media` - Image and file references per product
//! - `catalog_sync` - Time of the last synced-product import
//! - `orders` / `order_items` - Orders and their immutable lines
//! - `refunds` - Append-only refunds
//! - `coupons` - Discount codes with use counters
//! - `admin_logs` - Append-only audit trail
//!
//! # Migrations
//!
//! Migrations are stored in `crates/shop/migrations/` and run via:
//! ```bash
//! cargo run -p stockhub-cli -- migrate
//! ```

pub mod admin_logs;
pub mod coupons;
pub mod orders;
pub mod products;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use stockhub_core::{
    CouponId, MediaId, MediaKind, OrderId, OrderStatus, PaymentStatus, ProductId, ProductStatus,
};

pub use admin_logs::AdminLogRepository;
pub use coupons::CouponRepository;
pub use orders::OrderRepository;
pub use products::ProductRepository;

use crate::models::{
    AdminLogEntry, AuditFilter, Coupon, CouponUpdate, DashboardStats, ImportSummary,
    LowStockAlert, NewAdminLogEntry, NewCoupon, NewMedia, NewOrder, NewProduct, NewRefund, Order,
    OrderFilter, OrderStatusCounts, Page, Product, ProductFilter, ProductMedia, ProductUpdate, Refund, StatusChange,
    StockAdjustment, StockHistoryEntry,
};
use crate::store::{AuditStore, CatalogStore, CouponStore, OrderStore, StoreError};

/// Embedded schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Create a `PostgreSQL` connection pool.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `max_connections` - Upper bound on pooled connections
/// * `acquire_timeout` - How long a caller may wait for a connection
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    pool_options(max_connections, acquire_timeout)
        .connect(database_url.expose_secret())
        .await
}

/// Create a pool that connects on first use.
///
/// Lets the shop start while the database is down; the first failing call
/// then routes to the fallback store.
///
/// # Errors
///
/// Returns `sqlx::Error` if the URL cannot be parsed.
pub fn create_lazy_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, sqlx::Error> {
    pool_options(max_connections, acquire_timeout).connect_lazy(database_url.expose_secret())
}

fn pool_options(max_connections: u32, acquire_timeout: Duration) -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(0)
        .acquire_timeout(acquire_timeout)
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// `ILIKE` pattern matching `term` anywhere, with wildcards in `term` escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// [`crate::store::Store`] backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl CatalogStore for PgStore {
    async fn create_product(&self, product: &NewProduct) -> Result<Product, StoreError> {
        ProductRepository::new(&self.pool).create(product).await
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        ProductRepository::new(&self.pool).get_by_id(id).await
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<Vec<Product>, StoreError> {
        ProductRepository::new(&self.pool).list(filter, page).await
    }

    async fn count_products(&self, filter: &ProductFilter) -> Result<i64, StoreError> {
        ProductRepository::new(&self.pool).count(filter).await
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, StoreError> {
        ProductRepository::new(&self.pool).update(id, update).await
    }

    async fn set_product_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<Product, StoreError> {
        ProductRepository::new(&self.pool).set_status(id, status).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        ProductRepository::new(&self.pool).delete(id).await
    }

    async fn adjust_stock(
        &self,
        adjustment: &StockAdjustment,
    ) -> Result<StockHistoryEntry, StoreError> {
        ProductRepository::new(&self.pool).adjust_stock(adjustment).await
    }

    async fn stock_history(
        &self,
        id: ProductId,
        limit: i64,
    ) -> Result<Vec<StockHistoryEntry>, StoreError> {
        ProductRepository::new(&self.pool).history(id, limit).await
    }

    async fn low_stock_alerts(&self) -> Result<Vec<LowStockAlert>, StoreError> {
        ProductRepository::new(&self.pool).low_stock().await
    }

    async fn add_media(&self, media: &NewMedia) -> Result<ProductMedia, StoreError> {
        ProductRepository::new(&self.pool).add_media(media).await
    }

    async fn list_media(
        &self,
        product_id: ProductId,
        kind: Option<MediaKind>,
    ) -> Result<Vec<ProductMedia>, StoreError> {
        ProductRepository::new(&self.pool)
            .list_media(product_id, kind)
            .await
    }

    async fn delete_media(&self, id: MediaId) -> Result<(), StoreError> {
        ProductRepository::new(&self.pool).delete_media(id).await
    }

    async fn import_products(&self, products: &[NewProduct]) -> Result<ImportSummary, StoreError> {
        ProductRepository::new(&self.pool).import(products).await
    }
}

#[async_trait]
impl OrderStore for PgStore {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, StoreError> {
        OrderRepository::new(&self.pool).create(order).await
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        OrderRepository::new(&self.pool).get_by_id(id).await
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<StatusChange, StoreError> {
        OrderRepository::new(&self.pool).set_status(id, status).await
    }

    async fn mark_delivered(&self, id: OrderId, notes: Option<&str>) -> Result<Order, StoreError> {
        OrderRepository::new(&self.pool)
            .mark_delivered(id, notes)
            .await
    }

    async fn set_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
        payment_intent_id: Option<&str>,
    ) -> Result<Order, StoreError> {
        OrderRepository::new(&self.pool)
            .set_payment_status(id, status, payment_intent_id)
            .await
    }

    async fn record_refund(&self, refund: &NewRefund) -> Result<Refund, StoreError> {
        OrderRepository::new(&self.pool).record_refund(refund).await
    }

    async fn refunds_for(&self, id: OrderId) -> Result<Vec<Refund>, StoreError> {
        OrderRepository::new(&self.pool).refunds_for(id).await
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<Order>, StoreError> {
        OrderRepository::new(&self.pool).list(filter, page).await
    }

    async fn order_stats(&self, now: DateTime<Utc>) -> Result<DashboardStats, StoreError> {
        OrderRepository::new(&self.pool).stats(now).await
    }

    async fn revenue_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Decimal, StoreError> {
        OrderRepository::new(&self.pool)
            .revenue_between(since, until)
            .await
    }

    async fn order_counts_by_status(&self) -> Result<OrderStatusCounts, StoreError> {
        OrderRepository::new(&self.pool).counts_by_status().await
    }
}

#[async_trait]
impl CouponStore for PgStore {
    async fn create_coupon(&self, coupon: &NewCoupon) -> Result<Coupon, StoreError> {
        CouponRepository::new(&self.pool).create(coupon).await
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        CouponRepository::new(&self.pool).find_by_code(code).await
    }

    async fn get_coupon(&self, id: CouponId) -> Result<Option<Coupon>, StoreError> {
        CouponRepository::new(&self.pool).get_by_id(id).await
    }

    async fn list_coupons(&self, page: Page) -> Result<Vec<Coupon>, StoreError> {
        CouponRepository::new(&self.pool).list(page).await
    }

    async fn update_coupon(
        &self,
        id: CouponId,
        update: &CouponUpdate,
    ) -> Result<Coupon, StoreError> {
        CouponRepository::new(&self.pool).update(id, update).await
    }

    async fn delete_coupon(&self, id: CouponId) -> Result<(), StoreError> {
        CouponRepository::new(&self.pool).delete(id).await
    }

    async fn apply_coupon(&self, id: CouponId) -> Result<bool, StoreError> {
        CouponRepository::new(&self.pool).apply(id).await
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append_log(&self, entry: &NewAdminLogEntry) -> Result<AdminLogEntry, StoreError> {
        AdminLogRepository::new(&self.pool).append(entry).await
    }

    async fn list_logs(
        &self,
        filter: &AuditFilter,
        page: Page,
    ) -> Result<Vec<AdminLogEntry>, StoreError> {
        AdminLogRepository::new(&self.pool).list(filter, page).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("acme"), "%acme%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
