//! Integration tests for the order lifecycle on the demo store.
//!
//! Checkout through delivery, bulk actions, refunds and the dashboard, all
//! driven through the `Shop` facade.

use chrono::Utc;

use stockhub_core::{OrderId, OrderStatus, RefundStatus, UserId};
use stockhub_integration_tests::{
    cents, demo_config, guest_checkout, line_for, quantity_of, stock_product,
};
use stockhub_shop::models::{
    AuditAction, AuditFilter, BulkAction, Buyer, LineItem, OrderFilter, Page,
};
use stockhub_shop::{Shop, ShopError};

const ADMIN: Option<UserId> = Some(UserId::new(1));

fn shop() -> (Shop, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = Shop::from_config(&demo_config(dir.path())).expect("shop");
    (shop, dir)
}

// =============================================================================
// Checkout
// =============================================================================

#[tokio::test]
async fn test_checkout_reserves_stock_and_totals_lines() {
    let (shop, _dir) = shop();
    let product = stock_product(&shop, "Verified Account", cents(2500), 5)
        .await
        .expect("product");

    let order = shop
        .create_order(&guest_checkout(vec![
            line_for(&product, 2),
            LineItem::custom("Setup fee", 1, cents(499)),
        ]))
        .await
        .expect("order");

    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount, cents(5499));
    assert_eq!(order.items.len(), 2);
    assert_eq!(quantity_of(&shop, product.id).await.expect("qty"), 3);

    let history = shop
        .catalog()
        .stock_history(product.id, None)
        .await
        .expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!((history[0].previous_quantity, history[0].new_quantity), (5, 3));
}

#[tokio::test]
async fn test_checkout_beyond_stock_is_rejected_whole() {
    let (shop, _dir) = shop();
    let scarce = stock_product(&shop, "Scarce", cents(1000), 1)
        .await
        .expect("product");
    let plenty = stock_product(&shop, "Plenty", cents(1000), 10)
        .await
        .expect("product");

    let err = shop
        .create_order(&guest_checkout(vec![
            line_for(&plenty, 2),
            line_for(&scarce, 2),
        ]))
        .await
        .unwrap_err();

    assert!(matches!(err, ShopError::Conflict(_)));
    assert_eq!(quantity_of(&shop, plenty.id).await.expect("qty"), 10);
    assert_eq!(quantity_of(&shop, scarce.id).await.expect("qty"), 1);
}

#[tokio::test]
async fn test_checkout_validation() {
    let (shop, _dir) = shop();

    let empty = guest_checkout(Vec::new());
    assert!(matches!(
        shop.create_order(&empty).await,
        Err(ShopError::Validation(_))
    ));

    let mut bad_email = guest_checkout(vec![LineItem::custom("Item", 1, cents(100))]);
    bad_email.buyer = Buyer::Guest {
        email: "not-an-email".to_owned(),
        contact_handle: "@buyer".to_owned(),
    };
    assert!(matches!(
        shop.create_order(&bad_email).await,
        Err(ShopError::Validation(_))
    ));
}

// =============================================================================
// Delivery and Status
// =============================================================================

#[tokio::test]
async fn test_verify_delivery_is_idempotent() {
    let (shop, _dir) = shop();
    let order = shop
        .create_order(&guest_checkout(vec![LineItem::custom("Item", 1, cents(100))]))
        .await
        .expect("order");

    let first = shop
        .verify_delivery(order.id, None, ADMIN)
        .await
        .expect("verify");
    let second = shop
        .verify_delivery(order.id, Some("Resent credentials"), ADMIN)
        .await
        .expect("verify again");

    assert_eq!(first.status, OrderStatus::Delivered);
    assert_eq!(second.status, OrderStatus::Delivered);
    assert!(second.delivery_date >= first.delivery_date);
    assert_eq!(second.verification_notes.as_deref(), Some("Resent credentials"));

    let entries = shop
        .audit()
        .list(&AuditFilter::default(), None)
        .await
        .expect("audit");
    let verifications = entries
        .iter()
        .filter(|e| e.action == AuditAction::VerifyOrder)
        .count();
    assert_eq!(verifications, 2);
}

#[tokio::test]
async fn test_status_override_from_terminal_is_applied() {
    let (shop, _dir) = shop();
    let order = shop
        .create_order(&guest_checkout(vec![LineItem::custom("Item", 1, cents(100))]))
        .await
        .expect("order");

    shop.set_status(order.id, OrderStatus::Cancelled, ADMIN)
        .await
        .expect("cancel");
    let reopened = shop
        .set_status(order.id, OrderStatus::Pending, ADMIN)
        .await
        .expect("override");
    assert_eq!(reopened.status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_bulk_deliver_skips_missing_orders() {
    let (shop, _dir) = shop();
    let mut ids = Vec::new();
    for _ in 0..2 {
        let order = shop
            .create_order(&guest_checkout(vec![LineItem::custom("Item", 1, cents(100))]))
            .await
            .expect("order");
        ids.push(order.id);
    }
    let missing = OrderId::new(99_999);
    let requested = [ids[0], missing, ids[1]];

    let outcome = shop
        .bulk_action(&requested, BulkAction::Deliver, ADMIN)
        .await
        .expect("bulk");

    assert_eq!(outcome.succeeded, 2);
    assert_eq!(outcome.failed, vec![missing]);
    for &id in &ids {
        let order = shop.get_order(id).await.expect("order");
        assert_eq!(order.status, OrderStatus::Delivered);
        assert!(order.delivery_date.is_some());
    }

    let entries = shop
        .audit()
        .list(&AuditFilter::default(), None)
        .await
        .expect("audit");
    let bulk = entries
        .iter()
        .find(|e| e.action == AuditAction::BulkAction)
        .expect("bulk entry");
    assert_eq!(bulk.details["updated_count"], 2);
    assert_eq!(bulk.details["action"], "deliver");
    assert_eq!(bulk.details["order_ids"], format!("{},{}", ids[0], ids[1]));
    assert_eq!(bulk.details["failed_ids"], missing.to_string());
}

#[tokio::test]
async fn test_bulk_action_with_nothing_updated_is_not_audited() {
    let (shop, _dir) = shop();
    let outcome = shop
        .bulk_action(&[OrderId::new(99_998)], BulkAction::Cancel, ADMIN)
        .await
        .expect("bulk");
    assert_eq!(outcome.succeeded, 0);

    let entries = shop
        .audit()
        .list(&AuditFilter::default(), None)
        .await
        .expect("audit");
    assert!(entries.iter().all(|e| e.action != AuditAction::BulkAction));
}

// =============================================================================
// Refunds and Dashboard
// =============================================================================

#[tokio::test]
async fn test_refund_marks_order_and_leaves_status() {
    let (shop, _dir) = shop();
    let order = shop
        .create_order(&guest_checkout(vec![LineItem::custom("Item", 2, cents(1500))]))
        .await
        .expect("order");
    shop.verify_delivery(order.id, None, ADMIN)
        .await
        .expect("deliver");

    let refund = shop
        .process_refund(order.id, cents(3000), " Customer request ", ADMIN, Some("re_1"))
        .await
        .expect("refund");
    assert_eq!(refund.reason, "Customer request");

    let refunded = shop.get_order(order.id).await.expect("order");
    assert_eq!(refunded.refund_status, RefundStatus::Refunded);
    assert_eq!(refunded.status, OrderStatus::Delivered);
    assert_eq!(shop.orders().refunds(order.id).await.expect("refunds").len(), 1);

    assert!(matches!(
        shop.process_refund(OrderId::new(99_997), cents(100), "x", ADMIN, None)
            .await,
        Err(ShopError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_dashboard_counts_delivered_unrefunded_revenue() {
    let (shop, _dir) = shop();
    let mut orders = Vec::new();
    for amount in [1000, 2000, 4000] {
        let order = shop
            .create_order(&guest_checkout(vec![LineItem::custom("Item", 1, cents(amount))]))
            .await
            .expect("order");
        orders.push(order);
    }
    shop.verify_delivery(orders[0].id, None, ADMIN)
        .await
        .expect("deliver");
    shop.verify_delivery(orders[1].id, None, ADMIN)
        .await
        .expect("deliver");
    shop.process_refund(orders[1].id, cents(2000), "refund", ADMIN, None)
        .await
        .expect("refund");

    let stats = shop.dashboard_stats().await.expect("stats");
    assert_eq!(stats.daily_revenue, cents(1000));
    assert_eq!(stats.delivered_orders, 2);
    // The undelivered order and the demo order
    assert_eq!(stats.pending_orders, 2);
    assert_eq!(stats.recent_orders.first().map(|o| o.id), Some(orders[2].id));

    let pending = shop
        .list_orders(
            &OrderFilter {
                status: Some(OrderStatus::Pending),
                ..OrderFilter::default()
            },
            Page::default(),
        )
        .await
        .expect("list");
    assert_eq!(pending.len(), 2);
}

#[tokio::test]
async fn test_revenue_range_and_status_counts() {
    let (shop, _dir) = shop();
    let started = Utc::now();
    let mut orders = Vec::new();
    for amount in [1500, 3000] {
        let order = shop
            .create_order(&guest_checkout(vec![LineItem::custom("Item", 1, cents(amount))]))
            .await
            .expect("order");
        shop.verify_delivery(order.id, None, ADMIN)
            .await
            .expect("deliver");
        orders.push(order);
    }
    shop.set_status(orders[1].id, OrderStatus::Cancelled, ADMIN)
        .await
        .expect("cancel");

    // The demo order is pending and older than `started`
    assert_eq!(
        shop.revenue_between(Some(started), None)
            .await
            .expect("revenue"),
        cents(1500)
    );
    assert_eq!(
        shop.revenue_between(None, Some(started))
            .await
            .expect("revenue"),
        cents(0)
    );

    let counts = shop.order_counts_by_status().await.expect("counts");
    assert_eq!((counts.pending, counts.delivered, counts.cancelled), (1, 1, 1));
}
