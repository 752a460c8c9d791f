//! Integration tests for failover to the demo store.
//!
//! The primary points at a TEST-NET address, so every call either fails to
//! connect or hits the store timeout. Both must land on the fallback.

use std::time::Instant;

use stockhub_core::{OrderId, OrderStatus};
use stockhub_integration_tests::{cents, guest_checkout, unreachable_config};
use stockhub_shop::fallback::DEMO_ORDER_ID;
use stockhub_shop::models::LineItem;
use stockhub_shop::persistence::BreakerState;
use stockhub_shop::{PersistenceMode, Shop};

#[tokio::test]
async fn test_order_created_during_outage_is_readable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = Shop::from_config(&unreachable_config(dir.path())).expect("shop");
    assert_eq!(shop.mode().await, PersistenceMode::Primary);

    let order = shop
        .create_order(&guest_checkout(vec![LineItem::custom("Item", 1, cents(4999))]))
        .await
        .expect("order served by fallback");
    assert_eq!(order.id, OrderId::new(DEMO_ORDER_ID + 1));

    let read = shop.get_order(order.id).await.expect("read back");
    assert_eq!(read.status, OrderStatus::Pending);
    assert_eq!(read.total_amount, cents(4999));
    assert_eq!(shop.mode().await, PersistenceMode::Degraded);
}

#[tokio::test]
async fn test_open_breaker_skips_primary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = Shop::from_config(&unreachable_config(dir.path())).expect("shop");

    // First call pays for the timeout and opens the breaker
    shop.dashboard_stats().await.expect("stats");
    assert_eq!(shop.store().breaker().state().await, BreakerState::Open);

    let started = Instant::now();
    for _ in 0..5 {
        shop.get_order(OrderId::new(DEMO_ORDER_ID))
            .await
            .expect("demo order");
    }
    // Well under one store timeout for all five calls
    assert!(started.elapsed() < std::time::Duration::from_millis(300));
}

#[tokio::test]
async fn test_request_errors_do_not_open_breaker_in_demo_mode() {
    let dir = tempfile::tempdir().expect("tempdir");
    let shop = Shop::demo(dir.path().join("demo-products.json"));

    assert!(shop.get_order(OrderId::new(1)).await.is_err());
    assert_eq!(shop.mode().await, PersistenceMode::Demo);
    assert_eq!(shop.store().breaker().consecutive_failures().await, 0);
}
