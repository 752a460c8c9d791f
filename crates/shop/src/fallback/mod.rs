//! In-process store used when `PostgreSQL` is not configured or unreachable.
//!
//! Every operation runs inside one `tokio::sync::Mutex`, which makes each
//! call atomic within the process. Products are mirrored to a JSON snapshot
//! (see [`snapshot`]); orders, refunds, coupons, stock history, media and
//! audit entries live in memory only and are lost on restart.
//!
//! The snapshot gives no cross-process transactional guarantees: two
//! processes writing at the same time will overwrite each other.

pub mod snapshot;

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use stockhub_core::{
    AdminLogId, CouponId, DiscountType, MediaId, MediaKind, OrderId, OrderItemId, OrderStatus,
    PaymentStatus, ProductId, ProductStatus, RefundId, RefundStatus, StockChangeKind,
    StockHistoryId,
};

use crate::models::coupon::normalize_code;
use crate::models::order::{DEFAULT_DELIVERY_METHOD, revenue_between};
use crate::models::{
    AdminLogEntry, AuditFilter, BillingDetails, Coupon, CouponUpdate, DashboardStats,
    ImportSummary, LowStockAlert, NewAdminLogEntry, NewCoupon, NewMedia, NewOrder, NewProduct,
    NewRefund, Order, OrderFilter, OrderItem, OrderStatusCounts, Page, Product, ProductFilter, ProductMedia,
    ProductUpdate, Refund, ShippingDetails, StatusChange, StockAdjustment, StockHistoryEntry,
};
use crate::store::{AuditStore, CatalogStore, CouponStore, OrderStore, StoreError};

use snapshot::{Snapshot, SnapshotFile};

/// Id of the order present in the demo dataset.
pub const DEMO_ORDER_ID: i32 = 10_000;

/// First id handed out to fallback orders.
const FIRST_ORDER_ID: i32 = 10_001;

/// Monotonic id counters, one per table.
#[derive(Debug)]
struct Counters {
    order: i32,
    item: i32,
    refund: i32,
    coupon: i32,
    log: i32,
    history: i32,
    media: i32,
}

impl Default for Counters {
    fn default() -> Self {
        Self {
            order: FIRST_ORDER_ID,
            item: 1,
            refund: 1,
            coupon: 1,
            log: 1,
            history: 1,
            media: 1,
        }
    }
}

fn next(counter: &mut i32) -> i32 {
    let id = *counter;
    *counter += 1;
    id
}

#[derive(Debug, Default)]
struct State {
    catalog: Snapshot,
    orders: BTreeMap<OrderId, Order>,
    refunds: Vec<Refund>,
    coupons: BTreeMap<CouponId, Coupon>,
    logs: Vec<AdminLogEntry>,
    stock_history: Vec<StockHistoryEntry>,
    media: Vec<ProductMedia>,
    ids: Counters,
}

impl State {
    fn product_mut(&mut self, id: ProductId) -> Result<&mut Product, StoreError> {
        self.catalog
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found(format!("product {id}")))
    }

    fn order_mut(&mut self, id: OrderId) -> Result<&mut Order, StoreError> {
        self.orders
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("order {id}")))
    }

    fn history_entry(
        &mut self,
        adjustment: &StockAdjustment,
        previous_quantity: i32,
        now: DateTime<Utc>,
    ) -> StockHistoryEntry {
        StockHistoryEntry {
            id: StockHistoryId::new(next(&mut self.ids.history)),
            product_id: adjustment.product_id,
            admin_id: adjustment.admin_id,
            previous_quantity,
            new_quantity: adjustment.new_quantity,
            change_type: adjustment.kind,
            reason: adjustment.reason.clone(),
            created_at: now,
        }
    }
}

fn build_product(id: ProductId, input: &NewProduct, now: DateTime<Utc>) -> Product {
    Product {
        id,
        name: input.name.clone(),
        description: input.description.clone(),
        short_description: input.short_description.clone(),
        full_description: input.full_description.clone(),
        price: input.price,
        sale_price: input.sale_price,
        cost: input.cost,
        quantity: input.quantity,
        min_stock_alert: input.min_stock_alert,
        status: input.initial_status(),
        category: input.category.clone(),
        tags: input.tags.clone(),
        keywords: input.keywords.clone(),
        sku: input.sku.clone(),
        image_url: input.image_url.clone(),
        manual_url: input.manual_url.clone(),
        is_published: input.is_published,
        featured: input.featured,
        created_at: now,
        updated_at: now,
    }
}

/// Non-durable [`crate::store::Store`] with an optional product snapshot.
#[derive(Debug, Default)]
pub struct FallbackStore {
    state: Mutex<State>,
    snapshot: Option<SnapshotFile>,
}

impl FallbackStore {
    /// An empty store with no snapshot file.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// An empty store whose products are mirrored to `path`.
    #[must_use]
    pub fn with_snapshot(path: impl Into<PathBuf>) -> Self {
        Self {
            state: Mutex::new(State::default()),
            snapshot: Some(SnapshotFile::new(path)),
        }
    }

    /// The demo dataset: products from `path` (if the file exists), the demo
    /// order `10000` and a `WELCOME10` coupon.
    #[must_use]
    pub fn demo(path: impl Into<PathBuf>) -> Self {
        let now = Utc::now();
        let mut state = State::default();

        let total = Decimal::new(4999, 2);
        let demo_order = Order {
            id: OrderId::new(DEMO_ORDER_ID),
            user_id: None,
            guest_email: Some("demo@buyer.com".to_owned()),
            shipping: ShippingDetails {
                contact_handle: Some("demo_user".to_owned()),
                delivery_method: DEFAULT_DELIVERY_METHOD.to_owned(),
            },
            billing: BillingDetails {
                contact_handle: Some("demo_user".to_owned()),
                email: Some("demo@buyer.com".to_owned()),
                payment_method: "usdt".to_owned(),
                transaction_id: "demo_tx_12345".to_owned(),
            },
            items: vec![OrderItem {
                id: OrderItemId::new(next(&mut state.ids.item)),
                product_id: None,
                product_name: "Instagram Verified Account".to_owned(),
                quantity: 1,
                unit_price: total,
            }],
            total_amount: total,
            payment_reference: "demo_tx_12345".to_owned(),
            payment_status: PaymentStatus::Unpaid,
            payment_intent_id: None,
            refund_status: RefundStatus::NotRefunded,
            status: OrderStatus::Pending,
            delivery_date: None,
            verification_notes: None,
            created_at: now - Duration::hours(2),
            updated_at: now - Duration::hours(2),
        };
        state.orders.insert(demo_order.id, demo_order);

        let coupon = Coupon {
            id: CouponId::new(next(&mut state.ids.coupon)),
            code: "WELCOME10".to_owned(),
            discount_type: DiscountType::Percent,
            discount_value: Decimal::from(10),
            max_uses: Some(100),
            uses: 0,
            expires_at: None,
            is_active: true,
            created_at: now,
        };
        state.coupons.insert(coupon.id, coupon);

        Self {
            state: Mutex::new(state),
            snapshot: Some(SnapshotFile::new(path)),
        }
    }

    /// Refresh the product list from the snapshot, if one is configured.
    async fn reload(&self, state: &mut State) -> Result<(), StoreError> {
        if let Some(file) = &self.snapshot
            && let Some(snapshot) = file.load().await?
        {
            state.catalog = snapshot;
        }
        Ok(())
    }

    /// Persist `catalog`, then install it. Memory is left untouched if the
    /// write fails.
    async fn commit_catalog(&self, state: &mut State, catalog: Snapshot) -> Result<(), StoreError> {
        if let Some(file) = &self.snapshot {
            file.save(&catalog).await?;
        }
        state.catalog = catalog;
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for FallbackStore {
    async fn create_product(&self, product: &NewProduct) -> Result<Product, StoreError> {
        let mut state = self.state.lock().await;
        self.reload(&mut state).await?;

        if let Some(sku) = &product.sku
            && state.catalog.products.iter().any(|p| p.sku.as_ref() == Some(sku))
        {
            return Err(StoreError::Conflict(format!("sku {sku} already exists")));
        }

        let mut catalog = state.catalog.clone();
        let created = build_product(ProductId::new(next(&mut catalog.counter)), product, Utc::now());
        catalog.products.push(created.clone());
        self.commit_catalog(&mut state, catalog).await?;
        Ok(created)
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let mut state = self.state.lock().await;
        self.reload(&mut state).await?;
        Ok(state.catalog.products.iter().find(|p| p.id == id).cloned())
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<Vec<Product>, StoreError> {
        let mut state = self.state.lock().await;
        self.reload(&mut state).await?;
        let mut matching: Vec<Product> = state
            .catalog
            .products
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        filter.sort.sort(&mut matching);
        Ok(page.slice(matching))
    }

    async fn count_products(&self, filter: &ProductFilter) -> Result<i64, StoreError> {
        let mut state = self.state.lock().await;
        self.reload(&mut state).await?;
        let count = state
            .catalog
            .products
            .iter()
            .filter(|p| filter.matches(p))
            .count();
        Ok(i64::try_from(count).unwrap_or(i64::MAX))
    }

    async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
    ) -> Result<Product, StoreError> {
        let mut state = self.state.lock().await;
        self.reload(&mut state).await?;

        let mut catalog = state.catalog.clone();
        let product = catalog
            .products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| StoreError::not_found(format!("product {id}")))?;
        update.apply_to(product);
        product.updated_at = Utc::now();
        let updated = product.clone();

        self.commit_catalog(&mut state, catalog).await?;
        Ok(updated)
    }

    async fn set_product_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<Product, StoreError> {
        let update = ProductUpdate {
            status: Some(status),
            ..ProductUpdate::default()
        };
        self.update_product(id, &update).await
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        self.reload(&mut state).await?;

        let mut catalog = state.catalog.clone();
        let before = catalog.products.len();
        catalog.products.retain(|p| p.id != id);
        if catalog.products.len() == before {
            return Err(StoreError::not_found(format!("product {id}")));
        }
        self.commit_catalog(&mut state, catalog).await?;

        state.stock_history.retain(|h| h.product_id != id);
        state.media.retain(|m| m.product_id != id);
        for order in state.orders.values_mut() {
            for item in &mut order.items {
                if item.product_id == Some(id) {
                    item.product_id = None;
                }
            }
        }
        Ok(())
    }

    async fn adjust_stock(
        &self,
        adjustment: &StockAdjustment,
    ) -> Result<StockHistoryEntry, StoreError> {
        if adjustment.new_quantity < 0 {
            return Err(StoreError::Conflict("stock cannot be negative".to_owned()));
        }
        let mut state = self.state.lock().await;
        self.reload(&mut state).await?;
        let now = Utc::now();

        let mut catalog = state.catalog.clone();
        let product = catalog
            .products
            .iter_mut()
            .find(|p| p.id == adjustment.product_id)
            .ok_or_else(|| StoreError::not_found(format!("product {}", adjustment.product_id)))?;
        let previous = product.quantity;
        product.quantity = adjustment.new_quantity;
        product.status = product.status.for_quantity(adjustment.new_quantity);
        product.updated_at = now;

        self.commit_catalog(&mut state, catalog).await?;
        let entry = state.history_entry(adjustment, previous, now);
        state.stock_history.push(entry.clone());
        Ok(entry)
    }

    async fn stock_history(
        &self,
        id: ProductId,
        limit: i64,
    ) -> Result<Vec<StockHistoryEntry>, StoreError> {
        let state = self.state.lock().await;
        let take = usize::try_from(limit).unwrap_or(0);
        Ok(state
            .stock_history
            .iter()
            .rev()
            .filter(|h| h.product_id == id)
            .take(take)
            .cloned()
            .collect())
    }

    async fn low_stock_alerts(&self) -> Result<Vec<LowStockAlert>, StoreError> {
        let mut state = self.state.lock().await;
        self.reload(&mut state).await?;
        let mut alerts: Vec<LowStockAlert> = state
            .catalog
            .products
            .iter()
            .filter(|p| p.is_low_stock())
            .map(LowStockAlert::from)
            .collect();
        alerts.sort_by_key(|a| (a.quantity, a.product_id));
        Ok(alerts)
    }

    async fn add_media(&self, media: &NewMedia) -> Result<ProductMedia, StoreError> {
        let mut state = self.state.lock().await;
        self.reload(&mut state).await?;
        state.product_mut(media.product_id)?;

        if media.is_main {
            for existing in &mut state.media {
                if existing.product_id == media.product_id && existing.kind == media.kind {
                    existing.is_main = false;
                }
            }
        }
        let created = ProductMedia {
            id: MediaId::new(next(&mut state.ids.media)),
            product_id: media.product_id,
            kind: media.kind,
            url: media.url.clone(),
            label: media.label.clone(),
            file_type: media.file_type.clone(),
            is_main: media.is_main,
            sort_order: media.sort_order,
            created_at: Utc::now(),
        };
        state.media.push(created.clone());
        Ok(created)
    }

    async fn list_media(
        &self,
        product_id: ProductId,
        kind: Option<MediaKind>,
    ) -> Result<Vec<ProductMedia>, StoreError> {
        let state = self.state.lock().await;
        let mut media: Vec<ProductMedia> = state
            .media
            .iter()
            .filter(|m| m.product_id == product_id && kind.is_none_or(|k| m.kind == k))
            .cloned()
            .collect();
        media.sort_by_key(|m| (m.sort_order, m.id));
        Ok(media)
    }

    async fn delete_media(&self, id: MediaId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let before = state.media.len();
        state.media.retain(|m| m.id != id);
        if state.media.len() == before {
            return Err(StoreError::not_found(format!("media {id}")));
        }
        Ok(())
    }

    async fn import_products(&self, products: &[NewProduct]) -> Result<ImportSummary, StoreError> {
        let mut state = self.state.lock().await;
        self.reload(&mut state).await?;
        let now = Utc::now();

        let mut catalog = state.catalog.clone();
        let mut created = Vec::with_capacity(products.len());
        for input in products {
            let product = build_product(ProductId::new(next(&mut catalog.counter)), input, now);
            created.push((product.id, product.quantity));
            catalog.products.push(product);
        }
        catalog.last_sync = Some(now);
        self.commit_catalog(&mut state, catalog).await?;

        for (product_id, quantity) in created.iter().copied().filter(|(_, q)| *q > 0) {
            let adjustment = StockAdjustment {
                product_id,
                new_quantity: quantity,
                kind: StockChangeKind::Import,
                reason: Some("synced product list".to_owned()),
                admin_id: None,
            };
            let entry = state.history_entry(&adjustment, 0, now);
            state.stock_history.push(entry);
        }

        Ok(ImportSummary {
            created: created.len(),
            synced_at: Some(now),
        })
    }
}

#[async_trait]
impl OrderStore for FallbackStore {
    async fn create_order(&self, order: &NewOrder) -> Result<Order, StoreError> {
        let mut state = self.state.lock().await;
        self.reload(&mut state).await?;
        let now = Utc::now();
        let order_id = OrderId::new(state.ids.order);

        // Reserve against a copy so a failing line leaves nothing behind.
        let mut catalog = state.catalog.clone();
        let mut sales = Vec::new();
        for line in &order.items {
            let Some(product_id) = line.product_id else {
                continue;
            };
            let product = catalog
                .products
                .iter_mut()
                .find(|p| p.id == product_id)
                .ok_or_else(|| StoreError::not_found(format!("product {product_id}")))?;
            if !product.status.is_sellable() {
                return Err(StoreError::Conflict(format!(
                    "product {product_id} is {}, {} in stock",
                    product.status, product.quantity
                )));
            }
            if product.quantity < line.quantity {
                return Err(StoreError::Conflict(format!(
                    "insufficient stock for product {product_id}: requested {}, available {}",
                    line.quantity, product.quantity
                )));
            }
            let previous = product.quantity;
            product.quantity -= line.quantity;
            product.status = product.status.for_quantity(product.quantity);
            product.updated_at = now;
            let sale = StockAdjustment {
                product_id,
                new_quantity: product.quantity,
                kind: StockChangeKind::Sale,
                reason: Some(format!("order #{order_id}")),
                admin_id: None,
            };
            sales.push((sale, previous));
        }
        if !sales.is_empty() {
            self.commit_catalog(&mut state, catalog).await?;
        }

        state.ids.order += 1;
        for (sale, previous) in &sales {
            let entry = state.history_entry(sale, *previous, now);
            state.stock_history.push(entry);
        }

        let items = order
            .items
            .iter()
            .map(|line| OrderItem {
                id: OrderItemId::new(next(&mut state.ids.item)),
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();
        let created = Order {
            id: order_id,
            user_id: order.user_id,
            guest_email: order.guest_email.clone(),
            shipping: order.shipping.clone(),
            billing: order.billing.clone(),
            items,
            total_amount: order.total_amount,
            payment_reference: order.payment_reference.clone(),
            payment_status: PaymentStatus::Unpaid,
            payment_intent_id: None,
            refund_status: RefundStatus::NotRefunded,
            status: OrderStatus::Pending,
            delivery_date: None,
            verification_notes: None,
            created_at: now,
            updated_at: now,
        };
        state.orders.insert(order_id, created.clone());
        Ok(created)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn set_order_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<StatusChange, StoreError> {
        let mut state = self.state.lock().await;
        let order = state.order_mut(id)?;
        let previous = order.status;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(StatusChange {
            previous,
            order: order.clone(),
        })
    }

    async fn mark_delivered(&self, id: OrderId, notes: Option<&str>) -> Result<Order, StoreError> {
        let mut state = self.state.lock().await;
        let order = state.order_mut(id)?;
        let now = Utc::now();
        order.status = OrderStatus::Delivered;
        order.delivery_date = Some(now);
        if let Some(notes) = notes {
            order.verification_notes = Some(notes.to_owned());
        }
        order.updated_at = now;
        Ok(order.clone())
    }

    async fn set_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
        payment_intent_id: Option<&str>,
    ) -> Result<Order, StoreError> {
        let mut state = self.state.lock().await;
        let order = state.order_mut(id)?;
        order.payment_status = status;
        if let Some(intent) = payment_intent_id {
            order.payment_intent_id = Some(intent.to_owned());
        }
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn record_refund(&self, refund: &NewRefund) -> Result<Refund, StoreError> {
        let mut state = self.state.lock().await;
        state.order_mut(refund.order_id)?;
        // Checked before any write so a rejected refund leaves the order as is.
        if refund.amount <= Decimal::ZERO {
            return Err(StoreError::Transaction(format!(
                "refund amount must be positive, got {}",
                refund.amount
            )));
        }

        let now = Utc::now();
        let order = state.order_mut(refund.order_id)?;
        order.refund_status = RefundStatus::Refunded;
        order.updated_at = now;

        let created = Refund {
            id: RefundId::new(next(&mut state.ids.refund)),
            order_id: refund.order_id,
            admin_id: refund.admin_id,
            amount: refund.amount,
            reason: refund.reason.clone(),
            payment_reference: refund.payment_reference.clone(),
            created_at: now,
        };
        state.refunds.push(created.clone());
        Ok(created)
    }

    async fn refunds_for(&self, id: OrderId) -> Result<Vec<Refund>, StoreError> {
        let state = self.state.lock().await;
        Ok(state
            .refunds
            .iter()
            .rev()
            .filter(|r| r.order_id == id)
            .cloned()
            .collect())
    }

    async fn list_orders(
        &self,
        filter: &OrderFilter,
        page: Page,
    ) -> Result<Vec<Order>, StoreError> {
        let state = self.state.lock().await;
        let mut matching: Vec<&Order> = state.orders.values().filter(|o| filter.matches(o)).collect();
        matching.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(page.slice(matching.into_iter().cloned()))
    }

    async fn order_stats(&self, now: DateTime<Utc>) -> Result<DashboardStats, StoreError> {
        let state = self.state.lock().await;
        Ok(DashboardStats::from_orders(state.orders.values(), now))
    }

    async fn revenue_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Decimal, StoreError> {
        let state = self.state.lock().await;
        Ok(revenue_between(state.orders.values(), since, until))
    }

    async fn order_counts_by_status(&self) -> Result<OrderStatusCounts, StoreError> {
        let state = self.state.lock().await;
        Ok(OrderStatusCounts::from_orders(state.orders.values()))
    }
}

#[async_trait]
impl CouponStore for FallbackStore {
    async fn create_coupon(&self, coupon: &NewCoupon) -> Result<Coupon, StoreError> {
        let mut state = self.state.lock().await;
        let code = normalize_code(&coupon.code);
        if state.coupons.values().any(|c| c.code == code) {
            return Err(StoreError::Conflict(format!("coupon code {code} already exists")));
        }
        let created = Coupon {
            id: CouponId::new(next(&mut state.ids.coupon)),
            code,
            discount_type: coupon.discount_type,
            discount_value: coupon.discount_value,
            max_uses: coupon.max_uses,
            uses: 0,
            expires_at: coupon.expires_at,
            is_active: coupon.is_active,
            created_at: Utc::now(),
        };
        state.coupons.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_coupon_by_code(&self, code: &str) -> Result<Option<Coupon>, StoreError> {
        let code = normalize_code(code);
        let state = self.state.lock().await;
        Ok(state.coupons.values().find(|c| c.code == code).cloned())
    }

    async fn get_coupon(&self, id: CouponId) -> Result<Option<Coupon>, StoreError> {
        Ok(self.state.lock().await.coupons.get(&id).cloned())
    }

    async fn list_coupons(&self, page: Page) -> Result<Vec<Coupon>, StoreError> {
        let state = self.state.lock().await;
        let mut coupons: Vec<&Coupon> = state.coupons.values().collect();
        coupons.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(page.slice(coupons.into_iter().cloned()))
    }

    async fn update_coupon(
        &self,
        id: CouponId,
        update: &CouponUpdate,
    ) -> Result<Coupon, StoreError> {
        let mut state = self.state.lock().await;
        let coupon = state
            .coupons
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found(format!("coupon {id}")))?;
        let mut updated = coupon.clone();
        update.apply_to(&mut updated);
        if updated.max_uses.is_some_and(|max| updated.uses > max) {
            return Err(StoreError::Conflict(format!(
                "coupon {id} already used {} times",
                updated.uses
            )));
        }
        *coupon = updated.clone();
        Ok(updated)
    }

    async fn delete_coupon(&self, id: CouponId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .coupons
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(format!("coupon {id}")))
    }

    async fn apply_coupon(&self, id: CouponId) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let Some(coupon) = state.coupons.get_mut(&id) else {
            return Ok(false);
        };
        if coupon.is_exhausted() {
            return Ok(false);
        }
        coupon.uses += 1;
        Ok(true)
    }
}

#[async_trait]
impl AuditStore for FallbackStore {
    async fn append_log(&self, entry: &NewAdminLogEntry) -> Result<AdminLogEntry, StoreError> {
        let mut state = self.state.lock().await;
        let stored = AdminLogEntry {
            id: AdminLogId::new(next(&mut state.ids.log)),
            admin_id: entry.admin_id,
            action: entry.action,
            target_type: entry.target_type,
            target_id: entry.target_id,
            details: entry.details.clone(),
            timestamp: Utc::now(),
        };
        state.logs.push(stored.clone());
        Ok(stored)
    }

    async fn list_logs(
        &self,
        filter: &AuditFilter,
        page: Page,
    ) -> Result<Vec<AdminLogEntry>, StoreError> {
        let state = self.state.lock().await;
        Ok(page.slice(state.logs.iter().rev().filter(|e| filter.matches(e)).cloned()))
    }
}
