//! Order repository: orders, line items, refunds and dashboard figures.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};

use stockhub_core::{
    OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, RefundId, RefundStatus, UserId,
};

use super::like_pattern;
use super::products::reserve_stock;
use crate::models::order::start_of_day;
use crate::models::{
    BillingDetails, DashboardStats, DateWindow, NewOrder, NewRefund, Order, OrderFilter,
    OrderItem, OrderStatusCounts, Page, Refund, ShippingDetails, StatusChange,
};
use crate::store::StoreError;

// =============================================================================
// Internal Row Types
// =============================================================================

const ORDER_COLUMNS: &str = "o.order_id, o.user_id, o.guest_email, o.shipping_address, \
     o.billing_address, o.total_amount, o.payment_id, o.payment_status, o.payment_intent_id, \
     o.refund_status, o.status, o.delivery_date, o.verification_notes, o.created_at, o.updated_at";

const REFUND_COLUMNS: &str =
    "refund_id, order_id, admin_id, refund_amount, refund_reason, payment_intent_id, created_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    order_id: OrderId,
    user_id: Option<UserId>,
    guest_email: Option<String>,
    shipping_address: Json<ShippingDetails>,
    billing_address: Json<BillingDetails>,
    total_amount: Decimal,
    payment_id: String,
    payment_status: PaymentStatus,
    payment_intent_id: Option<String>,
    refund_status: RefundStatus,
    status: OrderStatus,
    delivery_date: Option<DateTime<Utc>>,
    verification_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.order_id,
            user_id: self.user_id,
            guest_email: self.guest_email,
            shipping: self.shipping_address.0,
            billing: self.billing_address.0,
            items,
            total_amount: self.total_amount,
            payment_reference: self.payment_id,
            payment_status: self.payment_status,
            payment_intent_id: self.payment_intent_id,
            refund_status: self.refund_status,
            status: self.status,
            delivery_date: self.delivery_date,
            verification_notes: self.verification_notes,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    item_id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    product_name: String,
    quantity: i32,
    price: Decimal,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.item_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.price,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    refund_id: RefundId,
    order_id: OrderId,
    admin_id: Option<UserId>,
    refund_amount: Decimal,
    refund_reason: String,
    payment_intent_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<RefundRow> for Refund {
    fn from(row: RefundRow) -> Self {
        Self {
            id: row.refund_id,
            order_id: row.order_id,
            admin_id: row.admin_id,
            amount: row.refund_amount,
            reason: row.refund_reason,
            payment_reference: row.payment_intent_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StatsRow {
    today_orders: i64,
    seven_day_orders: i64,
    thirty_day_orders: i64,
    daily_revenue: Decimal,
    monthly_revenue: Decimal,
    pending_orders: i64,
    delivered_orders: i64,
}

// =============================================================================
// Shared statements
// =============================================================================

/// Load orders with their items, preserving the row order.
async fn attach_items(
    conn: &mut PgConnection,
    rows: Vec<OrderRow>,
) -> Result<Vec<Order>, StoreError> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }
    let ids: Vec<i32> = rows.iter().map(|r| r.order_id.get()).collect();
    let items = sqlx::query_as::<_, OrderItemRow>(
        r"
        SELECT item_id, order_id, product_id, product_name, quantity, price
        FROM order_items
        WHERE order_id = ANY($1)
        ORDER BY item_id ASC
        ",
    )
    .bind(&ids)
    .fetch_all(conn)
    .await?;

    let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(item.into());
    }

    Ok(rows
        .into_iter()
        .map(|row| {
            let items = by_order.remove(&row.order_id).unwrap_or_default();
            row.into_order(items)
        })
        .collect())
}

async fn fetch_order(conn: &mut PgConnection, id: OrderId) -> Result<Option<Order>, StoreError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.order_id = $1");
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    match row {
        None => Ok(None),
        Some(row) => Ok(attach_items(conn, vec![row]).await?.pop()),
    }
}

async fn require_order(conn: &mut PgConnection, id: OrderId) -> Result<Order, StoreError> {
    fetch_order(conn, id)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("order {id}")))
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    /// Create a new order repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert the order, its items and the stock reservations in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound`/`StoreError::Conflict` from the stock
    /// reservation; the transaction is rolled back then.
    pub async fn create(&self, order: &NewOrder) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;

        let order_id = sqlx::query_scalar::<_, OrderId>(
            r"
            INSERT INTO orders (
                user_id, guest_email, shipping_address, billing_address,
                total_amount, payment_id
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING order_id
            ",
        )
        .bind(order.user_id)
        .bind(order.guest_email.as_deref())
        .bind(Json(&order.shipping))
        .bind(Json(&order.billing))
        .bind(order.total_amount)
        .bind(&order.payment_reference)
        .fetch_one(&mut *tx)
        .await?;

        for item in &order.items {
            sqlx::query(
                r"
                INSERT INTO order_items (order_id, product_id, product_name, quantity, price)
                VALUES ($1, $2, $3, $4, $5)
                ",
            )
            .bind(order_id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(item.quantity)
            .bind(item.unit_price)
            .execute(&mut *tx)
            .await?;

            if let Some(product_id) = item.product_id {
                reserve_stock(&mut *tx, product_id, item.quantity, &format!("order #{order_id}"))
                    .await?;
            }
        }

        let created = require_order(&mut *tx, order_id).await?;
        tx.commit().await?;
        Ok(created)
    }

    /// Get an order with its items.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn get_by_id(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        fetch_order(&mut *conn, id).await
    }

    /// Overwrite the status under a row lock, returning the previous one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the order does not exist.
    pub async fn set_status(
        &self,
        id: OrderId,
        status: OrderStatus,
    ) -> Result<StatusChange, StoreError> {
        let mut tx = self.pool.begin().await?;

        let previous = sqlx::query_scalar::<_, OrderStatus>(
            "SELECT status FROM orders WHERE order_id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::not_found(format!("order {id}")))?;

        sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE order_id = $1")
            .bind(id)
            .bind(status)
            .execute(&mut *tx)
            .await?;

        let order = require_order(&mut *tx, id).await?;
        tx.commit().await?;
        Ok(StatusChange { previous, order })
    }

    /// Mark delivered, re-stamp the delivery date and keep the notes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the order does not exist.
    pub async fn mark_delivered(
        &self,
        id: OrderId,
        notes: Option<&str>,
    ) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            r"
            UPDATE orders
            SET status = 'delivered',
                delivery_date = NOW(),
                verification_notes = COALESCE($2, verification_notes),
                updated_at = NOW()
            WHERE order_id = $1
            ",
        )
        .bind(id)
        .bind(notes)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("order {id}")));
        }
        require_order(&mut *conn, id).await
    }

    /// Record payment state.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the order does not exist.
    pub async fn set_payment_status(
        &self,
        id: OrderId,
        status: PaymentStatus,
        payment_intent_id: Option<&str>,
    ) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            r"
            UPDATE orders
            SET payment_status = $2,
                payment_intent_id = COALESCE($3, payment_intent_id),
                updated_at = NOW()
            WHERE order_id = $1
            ",
        )
        .bind(id)
        .bind(status)
        .bind(payment_intent_id)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("order {id}")));
        }
        require_order(&mut *conn, id).await
    }

    /// Flag the order refunded and insert the refund, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the order does not exist and
    /// `StoreError::Transaction` if the refund insert or commit fails.
    pub async fn record_refund(&self, refund: &NewRefund) -> Result<Refund, StoreError> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r"
            UPDATE orders
            SET refund_status = 'refunded', updated_at = NOW()
            WHERE order_id = $1
            ",
        )
        .bind(refund.order_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("order {}", refund.order_id)));
        }

        let sql = format!(
            r"
            INSERT INTO refunds (order_id, admin_id, refund_amount, refund_reason, payment_intent_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {REFUND_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, RefundRow>(&sql)
            .bind(refund.order_id)
            .bind(refund.admin_id)
            .bind(refund.amount)
            .bind(&refund.reason)
            .bind(refund.payment_reference.as_deref())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| StoreError::Transaction(format!("refund insert rolled back: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Transaction(format!("refund commit failed: {e}")))?;

        Ok(row.into())
    }

    /// Refunds for an order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn refunds_for(&self, id: OrderId) -> Result<Vec<Refund>, StoreError> {
        let sql = format!(
            "SELECT {REFUND_COLUMNS} FROM refunds WHERE order_id = $1 \
             ORDER BY created_at DESC, refund_id DESC"
        );
        let rows = sqlx::query_as::<_, RefundRow>(&sql)
            .bind(id)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Orders matching the filter, newest first.
    ///
    /// The search term matches the registered customer's name or email, the
    /// guest email (case-insensitive substring) or the exact order id.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn list(&self, filter: &OrderFilter, page: Page) -> Result<Vec<Order>, StoreError> {
        let term = filter.search_term();
        let sql = format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM orders o
            LEFT JOIN users u ON u.user_id = o.user_id
            WHERE ($1::order_status IS NULL OR o.status = $1)
              AND ($2::int IS NULL OR o.user_id = $2)
              AND ($3::timestamptz IS NULL OR o.created_at >= $3)
              AND ($4::timestamptz IS NULL OR o.created_at < $4)
              AND ($5::text IS NULL
                   OR u.name ILIKE $6
                   OR u.email ILIKE $6
                   OR o.guest_email ILIKE $6
                   OR o.order_id::text = $5)
            ORDER BY o.created_at DESC, o.order_id DESC
            LIMIT $7 OFFSET $8
            "
        );

        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(filter.status)
            .bind(filter.user_id)
            .bind(filter.since)
            .bind(filter.until)
            .bind(term)
            .bind(term.map(like_pattern))
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&mut *conn)
            .await?;

        attach_items(&mut *conn, rows).await
    }

    /// Dashboard counters and the most recent orders.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if a query fails.
    pub async fn stats(&self, now: DateTime<Utc>) -> Result<DashboardStats, StoreError> {
        let mut conn = self.pool.acquire().await?;

        let row = sqlx::query_as::<_, StatsRow>(
            r"
            SELECT
                COUNT(*) FILTER (WHERE created_at >= $1) AS today_orders,
                COUNT(*) FILTER (WHERE created_at >= $2) AS seven_day_orders,
                COUNT(*) FILTER (WHERE created_at >= $3) AS thirty_day_orders,
                COALESCE(SUM(total_amount) FILTER (
                    WHERE created_at >= $1 AND status = 'delivered' AND refund_status <> 'refunded'
                ), 0) AS daily_revenue,
                COALESCE(SUM(total_amount) FILTER (
                    WHERE created_at >= $4 AND status = 'delivered' AND refund_status <> 'refunded'
                ), 0) AS monthly_revenue,
                COUNT(*) FILTER (WHERE status = 'pending') AS pending_orders,
                COUNT(*) FILTER (WHERE status = 'delivered') AS delivered_orders
            FROM orders
            ",
        )
        .bind(start_of_day(now))
        .bind(now - Duration::days(7))
        .bind(now - Duration::days(30))
        .bind(DateWindow::Month.start(now))
        .fetch_one(&mut *conn)
        .await?;

        let limit = i64::try_from(DashboardStats::RECENT_LIMIT).unwrap_or(5);
        let sql = format!(
            "SELECT {ORDER_COLUMNS} FROM orders o ORDER BY o.created_at DESC, o.order_id DESC LIMIT $1"
        );
        let recent = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(limit)
            .fetch_all(&mut *conn)
            .await?;
        let recent_orders = attach_items(&mut *conn, recent).await?;

        Ok(DashboardStats {
            today_orders: row.today_orders,
            seven_day_orders: row.seven_day_orders,
            thirty_day_orders: row.thirty_day_orders,
            daily_revenue: row.daily_revenue,
            monthly_revenue: row.monthly_revenue,
            pending_orders: row.pending_orders,
            delivered_orders: row.delivered_orders,
            recent_orders,
        })
    }

    /// Revenue of delivered, unrefunded orders created in `[since, until)`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn revenue_between(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<Decimal, StoreError> {
        let revenue: Decimal = sqlx::query_scalar(
            r"
            SELECT COALESCE(SUM(total_amount), 0)
            FROM orders
            WHERE status = 'delivered' AND refund_status <> 'refunded'
              AND ($1::timestamptz IS NULL OR created_at >= $1)
              AND ($2::timestamptz IS NULL OR created_at < $2)
            ",
        )
        .bind(since)
        .bind(until)
        .fetch_one(self.pool)
        .await?;

        Ok(revenue)
    }

    /// Number of orders in each status.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn counts_by_status(&self) -> Result<OrderStatusCounts, StoreError> {
        let rows: Vec<(OrderStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status")
                .fetch_all(self.pool)
                .await?;

        let mut counts = OrderStatusCounts::default();
        for (status, count) in rows {
            counts.add(status, count);
        }
        Ok(counts)
    }
}
