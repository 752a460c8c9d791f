//! Storage interface shared by the `PostgreSQL` and fallback stores.
//!
//! Services only ever talk to `dyn Store`. [`crate::db::PgStore`] and
//! [`crate::fallback::FallbackStore`] implement it directly, and
//! [`crate::persistence::DualStore`] implements it by routing every call to
//! one of the two.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use stockhub_core::{
    CouponId, MediaId, MediaKind, OrderId, OrderStatus, PaymentStatus, ProductId, ProductStatus,
};

use crate::models::{
    AdminLogEntry, AuditFilter, Coupon, CouponUpdate, DashboardStats, ImportSummary,
    LowStockAlert, NewAdminLogEntry, NewCoupon, NewMedia, NewOrder, NewProduct, NewRefund, Order,
    OrderFilter, OrderStatusCounts, Page, Product, ProductFilter, ProductMedia, ProductUpdate, Refund, StatusChange,
    StockAdjustment, StockHistoryEntry,
};

/// Errors raised by a store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached (connect, I/O, TLS, pool, timeout).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Requested entity was not found.
    #[error("{0} not found")]
    NotFound(String),

    /// A guard or constraint rejected the write (stock, unique code, ...).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A multi-statement write failed and was rolled back.
    #[error("transaction failed: {0}")]
    Transaction(String),

    /// Stored data could not be mapped back into a model.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Any other database error.
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    /// Shorthand for [`StoreError::NotFound`].
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Whether the error means the backend is unreachable, as opposed to a
    /// problem with this particular request.
    #[must_use]
    pub const fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Protocol(_)
            | sqlx::Error::WorkerCrashed => Self::Unavailable(err.to_string()),
            sqlx::Error::RowNotFound => Self::NotFound("row".to_owned()),
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                Self::Conflict(db.message().to_owned())
            }
            sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => {
                Self::DataCorruption(err.to_string())
            }
            _ => Self::Database(err),
        }
    }
}

/// Products, stock ledger and media.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn create_product(&self, product: &NewProduct) -> Result<Product, StoreError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<Vec<Product>, StoreError>;

    async fn count_products(&self, filter: &ProductFilter) -> Result<i64, StoreError>;

    /// Apply a partial update. Fails with `NotFound` for unknown ids.
    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, StoreError>;

    /// Change the status without touching stock (soft delete, publish).
    async fn set_product_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<Product, StoreError>;

    /// Remove the product. Order lines keep their name and price.
    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError>;

    /// Set the stock level and append the matching ledger row atomically.
    async fn adjust_stock(
        &self,
        adjustment: &StockAdjustment,
    ) -> Result<StockHistoryEntry, StoreError>;

    /// Ledger rows for a product, newest first.
    async fn stock_history(
        &self,
        id: ProductId,
        limit: i64,
    ) -> Result<Vec<StockHistoryEntry>, StoreError>;

    /// Active products at or below their threshold, lowest stock first.
    async fn low_stock_alerts(&self) -> Result<Vec<LowStockAlert>, StoreError>;

    async fn add_media(&self, media: &NewMedia) -> Result<ProductMedia, StoreError>;

    /// Media for a product ordered by `sort_order`, optionally of one kind.
    async fn list_media(
        &self,
        product_id: ProductId,
        kind: Option<MediaKind>,
    ) -> Result<Vec<ProductMedia>, StoreError>;

    async fn delete_media(&self, id: MediaId) -> Result<(), StoreError>;

    /// Insert a synced product list and stamp the sync time.
    async fn import_products(&self, products: &[NewProduct]) -> Result<ImportSummary, StoreError>;
}

/// Orders, order items and refunds.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist the order, its items and every stock reservation as one unit.
    ///
    /// Fails with `NotFound` for an unknown product and `Conflict` when a
    /// product is not sellable or lacks stock; nothing is written then.
    async fn create_order(&self, order: &NewOrder) -> Result<Order, StoreError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError>;

    /// Overwrite the status, returning the previous one.
    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<StatusChange, StoreError>;

    /// Set `delivered`, re-stamp the delivery date and record the notes.
    async fn mark_delivered(&self, id: OrderId, notes: Option<&str>) -> Result<Order, StoreError>;

    async fn set_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
        payment_intent_id: Option<&str>,
    ) -> Result<Order, StoreError>;

    /// Mark the order refunded and insert the refund as one unit.
    async fn record_refund(&self, refund: &NewRefund) -> Result<Refund, StoreError>;

    /// Refunds for an order, newest first.
    async fn refunds_for(&self, id: OrderId) -> Result<Vec<Refund>, StoreError>;

    /// Orders matching the filter, newest first.
    async fn list_orders(&self, filter: &OrderFilter, page: Page)
    -> Result<Vec<Order>, StoreError>;

    async fn order_stats(&self, now: DateTime<Utc>) -> Result<DashboardStats, StoreError>;

    /// Revenue of delivered, unrefunded orders created in `[since, until)`.
    async fn revenue_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Decimal, StoreError>;

    async fn order_counts_by_status(&self) -> Result<OrderStatusCounts, StoreError>;
}

/// Discount codes.
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Fails with `Conflict` when the code is taken.
    async fn create_coupon(&self, coupon: &NewCoupon) -> Result<Coupon, StoreError>;

    /// Look up by normalized code.
    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError>;

    async fn get_coupon(&self, id: CouponId) -> Result<Option<Coupon>, StoreError>;

    async fn list_coupons(&self, page: Page) -> Result<Vec<Coupon>, StoreError>;

    async fn update_coupon(&self, id: CouponId, update: &CouponUpdate)
    -> Result<Coupon, StoreError>;

    async fn delete_coupon(&self, id: CouponId) -> Result<(), StoreError>;

    /// Increment the use count unless it would pass `max_uses`.
    ///
    /// Returns `false` when the coupon is exhausted or missing.
    async fn apply_coupon(&self, id: CouponId) -> Result<bool, StoreError>;
}

/// Append-only admin audit trail.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append_log(&self, entry: &NewAdminLogEntry) -> Result<AdminLogEntry, StoreError>;

    /// Entries newest first.
    async fn list_logs(
        &self,
        filter: &AuditFilter,
        page: Page,
    ) -> Result<Vec<AdminLogEntry>, StoreError>;
}

/// Everything the services need from storage.
pub trait Store: CatalogStore + OrderStore + CouponStore + AuditStore {}

impl<T> Store for T where T: CatalogStore + OrderStore + CouponStore + AuditStore {}

