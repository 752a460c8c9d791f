//! Integration tests for the product snapshot shared between processes.
//!
//! Two `Shop`s on one snapshot path stand in for two processes.

use stockhub_core::StockChangeKind;
use stockhub_integration_tests::{
    cents, demo_config, guest_checkout, line_for, quantity_of, stock_product,
};
use stockhub_shop::fallback::snapshot::SnapshotFile;
use stockhub_shop::models::{NewProduct, ProductFilter, ProductUpdate};
use stockhub_shop::Shop;

#[tokio::test]
async fn test_products_written_by_one_process_are_seen_by_another() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = Shop::from_config(&demo_config(dir.path())).expect("shop");
    let second = Shop::from_config(&demo_config(dir.path())).expect("shop");

    let product = stock_product(&first, "Shared Account", cents(1500), 4)
        .await
        .expect("product");

    let seen = second.catalog().get_product(product.id).await.expect("get");
    assert_eq!(seen.name, "Shared Account");

    second
        .create_order(&guest_checkout(vec![line_for(&seen, 3)]))
        .await
        .expect("order");
    assert_eq!(quantity_of(&first, product.id).await.expect("qty"), 1);

    first
        .catalog()
        .update_product(
            product.id,
            &ProductUpdate {
                price: Some(cents(1200)),
                ..ProductUpdate::default()
            },
            None,
        )
        .await
        .expect("update");
    let repriced = second.catalog().get_product(product.id).await.expect("get");
    assert_eq!(repriced.price, cents(1200));
}

#[tokio::test]
async fn test_ids_keep_increasing_across_processes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = Shop::from_config(&demo_config(dir.path())).expect("shop");
    let a = stock_product(&first, "A", cents(100), 1).await.expect("a");

    let second = Shop::from_config(&demo_config(dir.path())).expect("shop");
    let b = stock_product(&second, "B", cents(100), 1).await.expect("b");
    let c = stock_product(&first, "C", cents(100), 1).await.expect("c");

    assert!(a.id < b.id && b.id < c.id);
    let count = second
        .catalog()
        .count_products(&ProductFilter::default())
        .await
        .expect("count");
    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_import_stamps_last_sync_in_snapshot() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = demo_config(dir.path());
    let shop = Shop::from_config(&config).expect("shop");

    let summary = shop
        .catalog()
        .import_synced(
            &[
                NewProduct::new("Synced One", cents(999), 2),
                NewProduct::new("Synced Two", cents(1999), 0),
            ],
            None,
        )
        .await
        .expect("import");
    assert_eq!(summary.created, 2);

    let snapshot = SnapshotFile::new(&config.snapshot_path)
        .load()
        .await
        .expect("load")
        .expect("snapshot written");
    assert_eq!(snapshot.products.len(), 2);
    assert_eq!(snapshot.last_sync, summary.synced_at);

    let synced = snapshot
        .products
        .iter()
        .find(|p| p.name == "Synced One")
        .expect("product");
    let history = shop
        .catalog()
        .stock_history(synced.id, None)
        .await
        .expect("history");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].change_type, StockChangeKind::Import);
}
