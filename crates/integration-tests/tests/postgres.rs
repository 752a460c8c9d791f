//! Integration tests against a real `PostgreSQL` database.
//!
//! Ignored by default. Set `STOCKHUB_TEST_DATABASE_URL` to a scratch
//! database and run with `--ignored`. Every test uses unique names so runs
//! can share one database.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;

use stockhub_core::{DiscountType, OrderStatus, RefundStatus};
use stockhub_integration_tests::{
    TEST_DATABASE_ENV, cents, guest_checkout, line_for, pg_store, quantity_of, stock_product,
    unique,
};
use stockhub_shop::fallback::FallbackStore;
use stockhub_shop::models::{CouponUpdate, LineItem, NewCoupon, NewRefund};
use stockhub_shop::store::{OrderStore, StoreError};
use stockhub_shop::{DualStore, FailoverPolicy, PersistenceMode, Shop, ShopError};

async fn pg_shop() -> Shop {
    let store = pg_store()
        .await
        .unwrap_or_else(|| panic!("{TEST_DATABASE_ENV} must be set for ignored tests"));
    Shop::from_store(DualStore::new(
        Arc::new(store),
        Arc::new(FallbackStore::in_memory()),
        FailoverPolicy::default(),
    ))
}

#[tokio::test]
#[ignore = "requires STOCKHUB_TEST_DATABASE_URL"]
async fn test_pg_order_and_refund_are_atomic() {
    let shop = pg_shop().await;
    let product = stock_product(&shop, &unique("pg-account"), cents(2000), 3)
        .await
        .expect("product");

    let order = shop
        .create_order(&guest_checkout(vec![line_for(&product, 2)]))
        .await
        .expect("order");
    assert_eq!(quantity_of(&shop, product.id).await.expect("qty"), 1);
    assert_eq!(shop.mode().await, PersistenceMode::Primary);

    // Second checkout needs more than is left: nothing may change
    let err = shop
        .create_order(&guest_checkout(vec![
            LineItem::custom("Fee", 1, cents(100)),
            line_for(&product, 2),
        ]))
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::Conflict(_)));
    assert_eq!(quantity_of(&shop, product.id).await.expect("qty"), 1);

    shop.verify_delivery(order.id, None, None)
        .await
        .expect("deliver");
    let refund = shop
        .process_refund(order.id, cents(4000), "Requested", None, Some("re_pg"))
        .await
        .expect("refund");
    assert_eq!(refund.amount, cents(4000));

    let refunded = shop.get_order(order.id).await.expect("order");
    assert_eq!(refunded.refund_status, RefundStatus::Refunded);
    assert_eq!(refunded.status, OrderStatus::Delivered);
    assert_eq!(
        shop.orders().refunds(order.id).await.expect("refunds").len(),
        1
    );
}

#[tokio::test]
#[ignore = "requires STOCKHUB_TEST_DATABASE_URL"]
async fn test_pg_refund_of_missing_order_writes_nothing() {
    let store = pg_store()
        .await
        .unwrap_or_else(|| panic!("{TEST_DATABASE_ENV} must be set for ignored tests"));
    let shop = pg_shop().await;

    let missing = stockhub_core::OrderId::new(i32::MAX);
    assert!(matches!(
        shop.process_refund(missing, cents(100), "none", None, None)
            .await,
        Err(ShopError::NotFound(_))
    ));
    assert!(store.refunds_for(missing).await.expect("refunds").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires STOCKHUB_TEST_DATABASE_URL"]
async fn test_pg_concurrent_coupon_uses_respect_limit() {
    let shop = pg_shop().await;
    let code = unique("PG").to_uppercase();
    let coupon = shop
        .coupons()
        .create_coupon(
            &NewCoupon::new(&code, DiscountType::Percent, Decimal::from(15)).with_max_uses(3),
            None,
        )
        .await
        .expect("coupon");

    let attempts = (0..12).map(|_| {
        let shop = shop.clone();
        let id = coupon.id;
        tokio::spawn(async move { shop.apply_coupon(id).await })
    });
    let successes = join_all(attempts)
        .await
        .into_iter()
        .map(|joined| joined.expect("task").expect("apply"))
        .filter(|applied| *applied)
        .count();
    assert_eq!(successes, 3);

    let duplicate = shop
        .coupons()
        .create_coupon(
            &NewCoupon::new(code.to_lowercase(), DiscountType::Fixed, cents(100)),
            None,
        )
        .await;
    assert!(matches!(duplicate, Err(ShopError::Conflict(_))));
}

#[tokio::test]
#[ignore = "requires STOCKHUB_TEST_DATABASE_URL"]
async fn test_pg_refund_rolled_back_after_order_update() {
    let store = pg_store()
        .await
        .unwrap_or_else(|| panic!("{TEST_DATABASE_ENV} must be set for ignored tests"));
    let shop = pg_shop().await;
    let order = shop
        .create_order(&guest_checkout(vec![LineItem::custom("Item", 1, cents(900))]))
        .await
        .expect("order");

    // The order row is flagged first; the refund insert then fails its check
    let err = store
        .record_refund(&NewRefund {
            order_id: order.id,
            admin_id: None,
            amount: Decimal::ZERO,
            reason: "zero".to_owned(),
            payment_reference: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Transaction(_)), "{err:?}");

    let unchanged = store
        .get_order(order.id)
        .await
        .expect("get")
        .expect("order exists");
    assert_eq!(unchanged.refund_status, RefundStatus::NotRefunded);
    assert!(store.refunds_for(order.id).await.expect("refunds").is_empty());
}

#[tokio::test]
#[ignore = "requires STOCKHUB_TEST_DATABASE_URL"]
async fn test_pg_max_uses_below_uses_is_a_conflict() {
    let shop = pg_shop().await;
    let coupon = shop
        .coupons()
        .create_coupon(
            &NewCoupon::new(unique("LIMIT"), DiscountType::Fixed, cents(100)).with_max_uses(5),
            None,
        )
        .await
        .expect("coupon");
    for _ in 0..3 {
        assert!(shop.apply_coupon(coupon.id).await.expect("apply"));
    }

    let lower = CouponUpdate {
        max_uses: Some(2),
        ..CouponUpdate::default()
    };
    assert!(matches!(
        shop.coupons().update_coupon(coupon.id, &lower, None).await,
        Err(ShopError::Conflict(_))
    ));
    let kept = shop
        .coupons()
        .update_coupon(
            coupon.id,
            &CouponUpdate {
                max_uses: Some(3),
                ..CouponUpdate::default()
            },
            None,
        )
        .await
        .expect("update");
    assert_eq!((kept.uses, kept.max_uses), (3, Some(3)));
}

#[tokio::test]
#[ignore = "requires STOCKHUB_TEST_DATABASE_URL"]
async fn test_pg_revenue_and_status_counts() {
    let shop = pg_shop().await;
    let before = shop.order_counts_by_status().await.expect("counts");
    let started = Utc::now();

    let delivered = shop
        .create_order(&guest_checkout(vec![LineItem::custom("Item", 1, cents(123_456))]))
        .await
        .expect("order");
    shop.verify_delivery(delivered.id, None, None)
        .await
        .expect("deliver");
    let cancelled = shop
        .create_order(&guest_checkout(vec![LineItem::custom("Item", 1, cents(100))]))
        .await
        .expect("order");
    shop.set_status(cancelled.id, OrderStatus::Cancelled, None)
        .await
        .expect("cancel");

    // Other tests may share the database, so only lower bounds hold
    let revenue = shop
        .revenue_between(Some(started), None)
        .await
        .expect("revenue");
    assert!(revenue >= cents(123_456));
    let long_ago = Utc
        .with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .expect("date");
    assert_eq!(
        shop.revenue_between(None, Some(long_ago))
            .await
            .expect("revenue"),
        Decimal::ZERO
    );

    let after = shop.order_counts_by_status().await.expect("counts");
    assert!(after.delivered > before.delivered);
    assert!(after.cancelled > before.cancelled);
}
