//! Product catalog: products, stock ledger, media and synced imports.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, instrument, warn};

use stockhub_core::{MediaId, MediaKind, ProductId, ProductStatus, StockChangeKind, UserId};

use crate::error::ShopError;
use crate::models::{
    AuditAction, AuditTarget, ImportSummary, LowStockAlert, NewAdminLogEntry, NewMedia,
    NewProduct, Page, Product, ProductFilter, ProductMedia, ProductUpdate, StockAdjustment,
    StockHistoryEntry,
};
use crate::services::AuditLog;
use crate::store::Store;

/// Default number of ledger rows returned by [`CatalogService::stock_history`].
pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

fn check_product(product: &NewProduct) -> Result<(), ShopError> {
    if product.name.trim().is_empty() {
        return Err(ShopError::validation("product name cannot be empty"));
    }
    check_money("price", Some(product.price))?;
    check_money("sale price", product.sale_price)?;
    check_money("cost", product.cost)?;
    if product.quantity < 0 {
        return Err(ShopError::validation("quantity cannot be negative"));
    }
    if product.min_stock_alert < 0 {
        return Err(ShopError::validation("stock alert threshold cannot be negative"));
    }
    Ok(())
}

fn check_money(field: &str, value: Option<Decimal>) -> Result<(), ShopError> {
    match value {
        Some(v) if v < Decimal::ZERO => {
            Err(ShopError::validation(format!("{field} cannot be negative")))
        }
        _ => Ok(()),
    }
}

/// Product catalog service.
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn Store>,
    audit: AuditLog,
}

impl CatalogService {
    #[must_use]
    pub fn new(store: Arc<dyn Store>, audit: AuditLog) -> Self {
        Self { store, audit }
    }

    /// # Errors
    ///
    /// - `Validation` for an empty name or negative amounts
    /// - `Conflict` if the SKU is taken
    #[instrument(skip(self, product), fields(name = %product.name))]
    pub async fn create_product(
        &self,
        product: &NewProduct,
        admin: Option<UserId>,
    ) -> Result<Product, ShopError> {
        check_product(product)?;
        let created = self.store.create_product(product).await?;
        info!(product_id = %created.id, status = %created.status, "Product created");

        self.audit
            .record(NewAdminLogEntry::new(
                admin,
                AuditAction::Create,
                AuditTarget::Product,
                created.id.get(),
                json!(product),
            ))
            .await?;
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown id.
    pub async fn get_product(&self, id: ProductId) -> Result<Product, ShopError> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("product {id}")))
    }

    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<Vec<Product>, ShopError> {
        Ok(self.store.list_products(filter, page).await?)
    }

    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn count_products(&self, filter: &ProductFilter) -> Result<i64, ShopError> {
        Ok(self.store.count_products(filter).await?)
    }

    /// Apply a partial update. Stock is changed through
    /// [`Self::adjust_stock`] instead.
    ///
    /// # Errors
    ///
    /// - `Validation` for an empty update, an empty name or negative amounts
    /// - `NotFound` for an unknown id
    #[instrument(skip(self, update), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: ProductId,
        update: &ProductUpdate,
        admin: Option<UserId>,
    ) -> Result<Product, ShopError> {
        if update.is_empty() {
            return Err(ShopError::validation("no product fields to update"));
        }
        if update.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(ShopError::validation("product name cannot be empty"));
        }
        check_money("price", update.price)?;
        check_money("sale price", update.sale_price)?;
        check_money("cost", update.cost)?;
        if update.min_stock_alert.is_some_and(|t| t < 0) {
            return Err(ShopError::validation("stock alert threshold cannot be negative"));
        }

        let updated = self.store.update_product(id, update).await?;
        info!(status = %updated.status, "Product updated");

        self.audit
            .record(NewAdminLogEntry::new(
                admin,
                AuditAction::Update,
                AuditTarget::Product,
                id.get(),
                json!(update),
            ))
            .await?;
        Ok(updated)
    }

    /// Hide the product by marking it `deleted`. Orders keep referencing it.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown id.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn soft_delete_product(
        &self,
        id: ProductId,
        admin: Option<UserId>,
    ) -> Result<Product, ShopError> {
        let product = self
            .store
            .set_product_status(id, ProductStatus::Deleted)
            .await?;
        info!("Product soft-deleted");

        self.audit
            .record(NewAdminLogEntry::new(
                admin,
                AuditAction::Delete,
                AuditTarget::Product,
                id.get(),
                json!({ "soft": true }),
            ))
            .await?;
        Ok(product)
    }

    /// Remove the product, its ledger and media. Order lines keep their name
    /// and price but lose the reference.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown id.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn delete_product(&self, id: ProductId, admin: Option<UserId>) -> Result<(), ShopError> {
        self.store.delete_product(id).await?;
        warn!("Product permanently deleted");

        self.audit
            .record(NewAdminLogEntry::new(
                admin,
                AuditAction::Delete,
                AuditTarget::Product,
                id.get(),
                json!({ "soft": false }),
            ))
            .await?;
        Ok(())
    }

    /// Set the stock level and append the ledger row in one unit.
    ///
    /// # Errors
    ///
    /// - `Validation` for a negative quantity
    /// - `NotFound` for an unknown id
    #[instrument(skip(self, reason), fields(product_id = %id, kind = %kind))]
    pub async fn adjust_stock(
        &self,
        id: ProductId,
        new_quantity: i32,
        kind: StockChangeKind,
        reason: Option<&str>,
        admin: Option<UserId>,
    ) -> Result<StockHistoryEntry, ShopError> {
        if new_quantity < 0 {
            return Err(ShopError::validation("quantity cannot be negative"));
        }
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        let entry = self
            .store
            .adjust_stock(&StockAdjustment {
                product_id: id,
                new_quantity,
                kind,
                reason: reason.map(str::to_owned),
                admin_id: admin,
            })
            .await?;
        info!(
            previous = entry.previous_quantity,
            new = entry.new_quantity,
            "Stock adjusted"
        );

        self.audit
            .record(NewAdminLogEntry::new(
                admin,
                AuditAction::AdjustStock,
                AuditTarget::Product,
                id.get(),
                json!({
                    "previous_quantity": entry.previous_quantity,
                    "new_quantity": entry.new_quantity,
                    "change_type": kind,
                    "reason": reason,
                }),
            ))
            .await?;
        Ok(entry)
    }

    /// Newest first. `None` returns [`DEFAULT_HISTORY_LIMIT`] rows.
    ///
    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn stock_history(
        &self,
        id: ProductId,
        limit: Option<i64>,
    ) -> Result<Vec<StockHistoryEntry>, ShopError> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).clamp(1, Page::MAX_LIMIT);
        Ok(self.store.stock_history(id, limit).await?)
    }

    /// Active products at or below their threshold, lowest stock first.
    ///
    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn low_stock_alerts(&self) -> Result<Vec<LowStockAlert>, ShopError> {
        Ok(self.store.low_stock_alerts().await?)
    }

    /// # Errors
    ///
    /// - `Validation` for an empty URL
    /// - `NotFound` for an unknown product
    #[instrument(skip(self, media), fields(product_id = %media.product_id, kind = %media.kind))]
    pub async fn add_media(&self, media: &NewMedia) -> Result<ProductMedia, ShopError> {
        if media.url.trim().is_empty() {
            return Err(ShopError::validation("media url cannot be empty"));
        }
        let created = self.store.add_media(media).await?;
        info!(media_id = %created.id, "Media attached");
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `ShopError` if the store fails.
    pub async fn list_media(
        &self,
        product_id: ProductId,
        kind: Option<MediaKind>,
    ) -> Result<Vec<ProductMedia>, ShopError> {
        Ok(self.store.list_media(product_id, kind).await?)
    }

    /// # Errors
    ///
    /// Returns `ShopError::NotFound` for an unknown id.
    pub async fn remove_media(&self, id: MediaId) -> Result<(), ShopError> {
        self.store.delete_media(id).await?;
        info!(media_id = %id, "Media removed");
        Ok(())
    }

    /// Ingest a product list produced by the external sync job and stamp the
    /// sync time. The whole list is rejected if any record is invalid.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::Validation` naming the first invalid record.
    #[instrument(skip(self, products), fields(count = products.len()))]
    pub async fn import_synced(
        &self,
        products: &[NewProduct],
        admin: Option<UserId>,
    ) -> Result<ImportSummary, ShopError> {
        for (index, product) in products.iter().enumerate() {
            check_product(product).map_err(|e| match e {
                ShopError::Validation(msg) => {
                    ShopError::Validation(format!("record {index} ({}): {msg}", product.name))
                }
                other => other,
            })?;
        }

        let summary = self.store.import_products(products).await?;
        info!(created = summary.created, "Synced products imported");

        self.audit
            .record(NewAdminLogEntry::new(
                admin,
                AuditAction::Import,
                AuditTarget::Product,
                None::<i32>,
                json!({
                    "created": summary.created,
                    "synced_at": summary.synced_at,
                }),
            ))
            .await?;
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::FallbackStore;
    use crate::models::AuditFilter;

    fn cents(amount: i64) -> Decimal {
        Decimal::new(amount, 2)
    }

    fn service() -> (CatalogService, AuditLog) {
        let store: Arc<dyn Store> = Arc::new(FallbackStore::in_memory());
        let audit = AuditLog::new(store.clone());
        (CatalogService::new(store, audit.clone()), audit)
    }

    #[tokio::test]
    async fn stock_status_follows_quantity() {
        let (catalog, _) = service();
        let product = catalog
            .create_product(&NewProduct::new("Account", cents(999), 1), None)
            .await
            .expect("create");
        assert_eq!(product.status, ProductStatus::Active);

        let entry = catalog
            .adjust_stock(product.id, 0, StockChangeKind::Adjustment, Some("audit"), None)
            .await
            .expect("adjust");
        assert_eq!((entry.previous_quantity, entry.new_quantity), (1, 0));
        assert_eq!(
            catalog.get_product(product.id).await.expect("get").status,
            ProductStatus::OutOfStock
        );

        catalog
            .adjust_stock(product.id, 4, StockChangeKind::Restock, None, None)
            .await
            .expect("restock");
        assert_eq!(
            catalog.get_product(product.id).await.expect("get").status,
            ProductStatus::Active
        );

        let history = catalog.stock_history(product.id, None).await.expect("history");
        let kinds: Vec<_> = history.iter().map(|h| h.change_type).collect();
        assert_eq!(kinds, vec![StockChangeKind::Restock, StockChangeKind::Adjustment]);
    }

    #[tokio::test]
    async fn rejects_invalid_input() {
        let (catalog, audit) = service();
        assert!(matches!(
            catalog
                .create_product(&NewProduct::new(" ", cents(100), 1), None)
                .await,
            Err(ShopError::Validation(_))
        ));
        assert!(matches!(
            catalog
                .create_product(&NewProduct::new("Neg", cents(-100), 1), None)
                .await,
            Err(ShopError::Validation(_))
        ));
        assert!(matches!(
            catalog
                .adjust_stock(ProductId::new(1), -1, StockChangeKind::Adjustment, None, None)
                .await,
            Err(ShopError::Validation(_))
        ));
        assert!(matches!(
            catalog
                .update_product(ProductId::new(1), &ProductUpdate::default(), None)
                .await,
            Err(ShopError::Validation(_))
        ));
        assert!(
            audit
                .list(&AuditFilter::default(), None)
                .await
                .expect("list")
                .is_empty()
        );
    }

    #[tokio::test]
    async fn soft_delete_hides_from_storefront() {
        let (catalog, audit) = service();
        let product = catalog
            .create_product(&NewProduct::new("Hidden", cents(100), 3), Some(UserId::new(9)))
            .await
            .expect("create");
        catalog
            .soft_delete_product(product.id, Some(UserId::new(9)))
            .await
            .expect("soft delete");

        let visible = catalog
            .list_products(&ProductFilter::storefront(), Page::default())
            .await
            .expect("list");
        assert!(visible.is_empty());
        assert_eq!(
            catalog.get_product(product.id).await.expect("get").status,
            ProductStatus::Deleted
        );

        let entries = audit.list(&AuditFilter::default(), None).await.expect("list");
        assert_eq!(entries[0].action, AuditAction::Delete);
        assert_eq!(entries[0].details["soft"], json!(true));
    }

    #[tokio::test]
    async fn low_stock_lowest_first() {
        let (catalog, _) = service();
        for (name, quantity) in [("Three", 3), ("One", 1), ("Plenty", 50)] {
            catalog
                .create_product(
                    &NewProduct::new(name, cents(100), quantity).with_min_stock_alert(5),
                    None,
                )
                .await
                .expect("create");
        }
        let alerts = catalog.low_stock_alerts().await.expect("alerts");
        let names: Vec<_> = alerts.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["One", "Three"]);
    }

    #[tokio::test]
    async fn import_rejects_whole_batch_on_bad_record() {
        let (catalog, audit) = service();
        let err = catalog
            .import_synced(
                &[
                    NewProduct::new("Good", cents(100), 1),
                    NewProduct::new("Bad", cents(100), -3),
                ],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Validation(ref msg) if msg.contains("record 1")));
        assert_eq!(
            catalog
                .count_products(&ProductFilter::default())
                .await
                .expect("count"),
            0
        );

        let summary = catalog
            .import_synced(&[NewProduct::new("Good", cents(100), 1)], None)
            .await
            .expect("import");
        assert_eq!(summary.created, 1);
        assert!(summary.synced_at.is_some());
        let entries = audit.list(&AuditFilter::default(), None).await.expect("list");
        assert_eq!(entries[0].action, AuditAction::Import);
    }

    #[tokio::test]
    async fn media_requires_existing_product() {
        let (catalog, _) = service();
        let media = NewMedia {
            product_id: ProductId::new(77),
            kind: MediaKind::File,
            url: "https://cdn.example.com/manual.pdf".to_owned(),
            label: Some("Manual".to_owned()),
            file_type: Some("pdf".to_owned()),
            is_main: false,
            sort_order: 0,
        };
        assert!(matches!(
            catalog.add_media(&media).await,
            Err(ShopError::NotFound(_))
        ));
        assert!(matches!(
            catalog.remove_media(MediaId::new(1)).await,
            Err(ShopError::NotFound(_))
        ));
    }
}
