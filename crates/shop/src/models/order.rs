//! Order domain models: checkout input, persisted orders, refunds and reports.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockhub_core::{
    OrderId, OrderItemId, OrderStatus, PaymentStatus, ProductId, RefundId, RefundStatus, UserId,
};

use super::contains_ignore_case;

/// Delivery method recorded when the buyer does not pick one.
pub const DEFAULT_DELIVERY_METHOD: &str = "messenger_and_email";

/// Where and how purchased goods are delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingDetails {
    pub contact_handle: Option<String>,
    pub delivery_method: String,
}

/// How the buyer paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingDetails {
    pub contact_handle: Option<String>,
    pub email: Option<String>,
    pub payment_method: String,
    pub transaction_id: String,
}

/// A persisted order line. Name and price are captured at checkout time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

/// A customer order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: Option<UserId>,
    pub guest_email: Option<String>,
    pub shipping: ShippingDetails,
    pub billing: BillingDetails,
    pub items: Vec<OrderItem>,
    pub total_amount: Decimal,
    /// Payment reference given at checkout (e.g. a transaction hash).
    pub payment_reference: String,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: Option<String>,
    pub refund_status: RefundStatus,
    pub status: OrderStatus,
    pub delivery_date: Option<DateTime<Utc>>,
    pub verification_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether the order counts towards revenue: delivered and not refunded.
    #[must_use]
    pub fn is_revenue_counted(&self) -> bool {
        self.status == OrderStatus::Delivered && self.refund_status != RefundStatus::Refunded
    }
}

/// A checkout line before it is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Catalog product to reserve stock from. Free-form lines carry `None`.
    pub product_id: Option<ProductId>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl LineItem {
    /// A line referencing a catalog product.
    #[must_use]
    pub fn product(
        product_id: ProductId,
        name: impl Into<String>,
        quantity: i32,
        unit_price: Decimal,
    ) -> Self {
        Self {
            product_id: Some(product_id),
            product_name: name.into(),
            quantity,
            unit_price,
        }
    }

    /// A free-form line with no stock reservation.
    #[must_use]
    pub fn custom(name: impl Into<String>, quantity: i32, unit_price: Decimal) -> Self {
        Self {
            product_id: None,
            product_name: name.into(),
            quantity,
            unit_price,
        }
    }

    /// `unit_price × quantity`, or `None` if it overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price.checked_mul(Decimal::from(self.quantity))
    }
}

/// Who is buying.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Buyer {
    /// A logged-in customer.
    Registered { user_id: UserId },
    /// A guest; both the email and the messenger handle are used for delivery.
    Guest {
        email: String,
        contact_handle: String,
    },
}

/// Payment information submitted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    /// e.g. `usdt`, `btc`.
    pub method: String,
    /// External payment reference such as a transaction id.
    pub reference: String,
}

/// Unvalidated checkout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkout {
    pub buyer: Buyer,
    pub items: Vec<LineItem>,
    pub payment: PaymentDetails,
    /// Overrides the computed item total when present.
    #[serde(default)]
    pub explicit_total: Option<Decimal>,
    #[serde(default)]
    pub delivery_method: Option<String>,
}

/// A validated order ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: Option<UserId>,
    pub guest_email: Option<String>,
    pub shipping: ShippingDetails,
    pub billing: BillingDetails,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub payment_reference: String,
}

/// The result of a status overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub previous: OrderStatus,
    pub order: Order,
}

/// Admin bulk operation over several orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Deliver,
    Cancel,
}

impl BulkAction {
    /// Status every order is moved to.
    #[must_use]
    pub const fn target_status(self) -> OrderStatus {
        match self {
            Self::Deliver => OrderStatus::Delivered,
            Self::Cancel => OrderStatus::Cancelled,
        }
    }

    /// Stored spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Deliver => "deliver",
            Self::Cancel => "cancel",
        }
    }
}

impl std::str::FromStr for BulkAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deliver" => Ok(Self::Deliver),
            "cancel" => Ok(Self::Cancel),
            _ => Err(format!("invalid bulk action: {s}")),
        }
    }
}

/// Outcome of a best-effort bulk operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failed: Vec<OrderId>,
}

/// Input for booking a refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRefund {
    pub order_id: OrderId,
    pub admin_id: Option<UserId>,
    pub amount: Decimal,
    pub reason: String,
    pub payment_reference: Option<String>,
}

/// A refund booked against an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Refund {
    pub id: RefundId,
    pub order_id: OrderId,
    pub admin_id: Option<UserId>,
    pub amount: Decimal,
    pub reason: String,
    pub payment_reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Relative creation-date window used by the admin order list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateWindow {
    /// Since midnight UTC.
    Today,
    /// The last seven days.
    Week,
    /// Since the first day of the current month, UTC.
    Month,
}

impl DateWindow {
    /// Start of the window relative to `now`.
    #[must_use]
    pub fn start(self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Today => start_of_day(now),
            Self::Week => now - Duration::days(7),
            Self::Month => Utc
                .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
                .single()
                .unwrap_or_else(|| start_of_day(now)),
        }
    }
}

/// Midnight UTC of the day containing `now`.
#[must_use]
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map_or(now, |midnight| midnight.and_utc())
}

/// Admin order listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub user_id: Option<UserId>,
    /// Inclusive lower bound on `created_at`.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub until: Option<DateTime<Utc>>,
    /// Customer name/email, guest email (substring) or exact order id.
    pub search: Option<String>,
}

impl OrderFilter {
    /// Restrict to orders created inside `window`.
    #[must_use]
    pub fn within(mut self, window: DateWindow, now: DateTime<Utc>) -> Self {
        self.since = Some(window.start(now));
        self
    }

    /// The search term, trimmed, if non-empty.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// In-memory equivalent of the SQL `WHERE` clause.
    ///
    /// Registered customers' names are not known to the in-memory store, so
    /// the search only covers guest emails and order ids there.
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        if self.status.is_some_and(|s| s != order.status) {
            return false;
        }
        if self.user_id.is_some_and(|u| order.user_id != Some(u)) {
            return false;
        }
        if self.since.is_some_and(|since| order.created_at < since) {
            return false;
        }
        if self.until.is_some_and(|until| order.created_at >= until) {
            return false;
        }
        match self.search_term() {
            None => true,
            Some(term) => {
                let needle = term.to_lowercase();
                order.id.to_string() == term
                    || order
                        .guest_email
                        .as_deref()
                        .is_some_and(|email| contains_ignore_case(email, &needle))
            }
        }
    }
}

/// Number of orders in each status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStatusCounts {
    pub pending: i64,
    pub delivered: i64,
    pub cancelled: i64,
}

impl OrderStatusCounts {
    /// Count an in-memory order list.
    #[must_use]
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut counts = Self::default();
        for order in orders {
            counts.add(order.status, 1);
        }
        counts
    }

    /// Add `count` orders in `status`.
    pub fn add(&mut self, status: OrderStatus, count: i64) {
        match status {
            OrderStatus::Pending => self.pending += count,
            OrderStatus::Delivered => self.delivered += count,
            OrderStatus::Cancelled => self.cancelled += count,
        }
    }

    #[must_use]
    pub const fn total(&self) -> i64 {
        self.pending + self.delivered + self.cancelled
    }
}

/// Revenue of the revenue-counted orders created in `[since, until)`.
/// Either bound may be open.
#[must_use]
pub fn revenue_between<'a>(
    orders: impl IntoIterator<Item = &'a Order>,
    since: Option<DateTime<Utc>>,
    until: Option<DateTime<Utc>>,
) -> Decimal {
    orders
        .into_iter()
        .filter(|o| o.is_revenue_counted())
        .filter(|o| since.is_none_or(|since| o.created_at >= since))
        .filter(|o| until.is_none_or(|until| o.created_at < until))
        .map(|o| o.total_amount)
        .sum()
}

/// Figures shown on the admin dashboard.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardStats {
    pub today_orders: i64,
    pub seven_day_orders: i64,
    pub thirty_day_orders: i64,
    /// Revenue of today's revenue-counted orders.
    pub daily_revenue: Decimal,
    /// Revenue of this month's revenue-counted orders.
    pub monthly_revenue: Decimal,
    pub pending_orders: i64,
    pub delivered_orders: i64,
    /// The five newest orders.
    pub recent_orders: Vec<Order>,
}

impl DashboardStats {
    /// Number of orders listed in `recent_orders`.
    pub const RECENT_LIMIT: usize = 5;

    /// Compute the dashboard from a full order list (in-memory stores).
    #[must_use]
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>, now: DateTime<Utc>) -> Self {
        let today = start_of_day(now);
        let week = now - Duration::days(7);
        let month_ago = now - Duration::days(30);
        let month_start = DateWindow::Month.start(now);

        let mut stats = Self::default();
        let mut all: Vec<&Order> = Vec::new();
        for order in orders {
            if order.created_at >= today {
                stats.today_orders += 1;
            }
            if order.created_at >= week {
                stats.seven_day_orders += 1;
            }
            if order.created_at >= month_ago {
                stats.thirty_day_orders += 1;
            }
            if order.is_revenue_counted() {
                if order.created_at >= today {
                    stats.daily_revenue += order.total_amount;
                }
                if order.created_at >= month_start {
                    stats.monthly_revenue += order.total_amount;
                }
            }
            match order.status {
                OrderStatus::Pending => stats.pending_orders += 1,
                OrderStatus::Delivered => stats.delivered_orders += 1,
                OrderStatus::Cancelled => {}
            }
            all.push(order);
        }

        all.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        stats.recent_orders = all
            .into_iter()
            .take(Self::RECENT_LIMIT)
            .cloned()
            .collect();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(id: i32, status: OrderStatus, total: i64, created_at: DateTime<Utc>) -> Order {
        Order {
            id: OrderId::new(id),
            user_id: None,
            guest_email: Some(format!("buyer{id}@example.com")),
            shipping: ShippingDetails {
                contact_handle: Some("buyer".to_owned()),
                delivery_method: DEFAULT_DELIVERY_METHOD.to_owned(),
            },
            billing: BillingDetails {
                contact_handle: Some("buyer".to_owned()),
                email: None,
                payment_method: "usdt".to_owned(),
                transaction_id: "tx".to_owned(),
            },
            items: Vec::new(),
            total_amount: Decimal::new(total, 2),
            payment_reference: "tx".to_owned(),
            payment_status: PaymentStatus::Unpaid,
            payment_intent_id: None,
            refund_status: RefundStatus::NotRefunded,
            status,
            delivery_date: None,
            verification_notes: None,
            created_at,
            updated_at: created_at,
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).single().expect("valid date")
    }

    #[test]
    fn date_windows() {
        let now = at(2026, 10, 16, 15);
        assert_eq!(DateWindow::Today.start(now), at(2026, 10, 16, 0));
        assert_eq!(DateWindow::Week.start(now), at(2026, 10, 9, 15));
        assert_eq!(DateWindow::Month.start(now), at(2026, 10, 1, 0));
    }

    #[test]
    fn filter_search_by_id_and_guest_email() {
        let o = order(10_000, OrderStatus::Pending, 4999, at(2026, 10, 16, 10));
        let by_id = OrderFilter {
            search: Some("10000".to_owned()),
            ..OrderFilter::default()
        };
        let by_email = OrderFilter {
            search: Some("BUYER10000@".to_owned()),
            ..OrderFilter::default()
        };
        let miss = OrderFilter {
            search: Some("1000".to_owned()),
            ..OrderFilter::default()
        };
        assert!(by_id.matches(&o));
        assert!(by_email.matches(&o));
        assert!(!miss.matches(&o));
    }

    #[test]
    fn filter_by_status_and_window() {
        let now = at(2026, 10, 16, 15);
        let old = order(1, OrderStatus::Pending, 100, at(2026, 9, 30, 23));
        let recent = order(2, OrderStatus::Delivered, 100, at(2026, 10, 2, 8));
        let this_month = OrderFilter::default().within(DateWindow::Month, now);
        assert!(!this_month.matches(&old));
        assert!(this_month.matches(&recent));

        let pending = OrderFilter {
            status: Some(OrderStatus::Pending),
            ..OrderFilter::default()
        };
        assert!(pending.matches(&old));
        assert!(!pending.matches(&recent));
    }

    #[test]
    fn dashboard_counts_only_delivered_unrefunded_revenue() {
        let now = at(2026, 10, 16, 15);
        let mut refunded = order(3, OrderStatus::Delivered, 1000, at(2026, 10, 16, 9));
        refunded.refund_status = RefundStatus::Refunded;
        let orders = vec![
            order(1, OrderStatus::Delivered, 4999, at(2026, 10, 16, 9)),
            order(2, OrderStatus::Pending, 2500, at(2026, 10, 16, 10)),
            refunded,
            order(4, OrderStatus::Delivered, 1000, at(2026, 10, 3, 9)),
            order(5, OrderStatus::Cancelled, 700, at(2026, 9, 1, 9)),
            order(6, OrderStatus::Delivered, 300, at(2026, 8, 1, 9)),
        ];

        let stats = DashboardStats::from_orders(&orders, now);
        assert_eq!(stats.today_orders, 3);
        assert_eq!(stats.seven_day_orders, 3);
        assert_eq!(stats.thirty_day_orders, 4);
        assert_eq!(stats.daily_revenue, Decimal::new(4999, 2));
        assert_eq!(stats.monthly_revenue, Decimal::new(5999, 2));
        assert_eq!(stats.pending_orders, 1);
        assert_eq!(stats.delivered_orders, 4);
        let recent: Vec<i32> = stats.recent_orders.iter().map(|o| o.id.get()).collect();
        assert_eq!(recent, vec![2, 3, 1, 4, 5]);
    }

    #[test]
    fn revenue_between_honors_bounds_and_refunds() {
        let mut refunded = order(2, OrderStatus::Delivered, 1000, at(2026, 10, 5, 9));
        refunded.refund_status = RefundStatus::Refunded;
        let orders = vec![
            order(1, OrderStatus::Delivered, 4999, at(2026, 10, 1, 0)),
            refunded,
            order(3, OrderStatus::Pending, 2500, at(2026, 10, 6, 9)),
            order(4, OrderStatus::Delivered, 700, at(2026, 10, 10, 0)),
        ];

        let october = (Some(at(2026, 10, 1, 0)), Some(at(2026, 10, 10, 0)));
        assert_eq!(
            revenue_between(&orders, october.0, october.1),
            Decimal::new(4999, 2)
        );
        assert_eq!(revenue_between(&orders, None, None), Decimal::new(5699, 2));
        assert_eq!(
            revenue_between(&orders, Some(at(2026, 11, 1, 0)), None),
            Decimal::ZERO
        );
    }

    #[test]
    fn status_counts() {
        let now = at(2026, 10, 16, 15);
        let orders = vec![
            order(1, OrderStatus::Pending, 100, now),
            order(2, OrderStatus::Pending, 100, now),
            order(3, OrderStatus::Cancelled, 100, now),
        ];
        let counts = OrderStatusCounts::from_orders(&orders);
        assert_eq!(
            counts,
            OrderStatusCounts {
                pending: 2,
                delivered: 0,
                cancelled: 1,
            }
        );
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn line_total_overflow_is_none() {
        assert_eq!(
            LineItem::custom("A", 3, Decimal::new(250, 2)).line_total(),
            Some(Decimal::new(750, 2))
        );
        assert_eq!(LineItem::custom("A", 2, Decimal::MAX).line_total(), None);
    }

    #[test]
    fn bulk_action_targets() {
        assert_eq!(BulkAction::Deliver.target_status(), OrderStatus::Delivered);
        assert_eq!("cancel".parse(), Ok(BulkAction::Cancel));
        assert!("archive".parse::<BulkAction>().is_err());
    }
}
