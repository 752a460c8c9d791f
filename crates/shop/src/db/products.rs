//! Product repository: catalog rows, stock ledger and media.
//!
//! Queries use the runtime `sqlx::query*` functions so the crate builds
//! without a live database or an offline query cache.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use stockhub_core::{
    MediaId, MediaKind, ProductId, ProductStatus, StockChangeKind, StockHistoryId, UserId,
};

use super::like_pattern;
use crate::models::{
    ImportSummary, LowStockAlert, NewMedia, NewProduct, Page, Product, ProductFilter,
    ProductMedia, ProductUpdate, StockAdjustment, StockHistoryEntry,
};
use crate::store::StoreError;

// =============================================================================
// Internal Row Types
// =============================================================================

const PRODUCT_COLUMNS: &str = "product_id, name, description, short_description, \
     full_description, price, sale_price, cost, quantity, min_stock_alert, status, category, \
     tags, keywords, sku, image_url, manual_url, is_published, featured, created_at, updated_at";

const HISTORY_COLUMNS: &str = "history_id, product_id, admin_id, previous_quantity, \
     new_quantity, change_type, reason, created_at";

const MEDIA_COLUMNS: &str =
    "media_id, product_id, kind, url, label, file_type, is_main, sort_order, created_at";

/// Filter clause shared by listing and counting. Binds `$1..$4`.
const FILTER_CLAUSE: &str = "($1::text IS NULL OR category = $1) \
     AND (cardinality($2::text[]) = 0 OR status::text = ANY($2)) \
     AND ($3::text IS NULL OR name ILIKE $3 OR description ILIKE $3 OR sku ILIKE $3) \
     AND (NOT $4 OR is_published)";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    product_id: ProductId,
    name: String,
    description: String,
    short_description: Option<String>,
    full_description: Option<String>,
    price: Decimal,
    sale_price: Option<Decimal>,
    cost: Option<Decimal>,
    quantity: i32,
    min_stock_alert: i32,
    status: ProductStatus,
    category: Option<String>,
    tags: String,
    keywords: String,
    sku: Option<String>,
    image_url: Option<String>,
    manual_url: Option<String>,
    is_published: bool,
    featured: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.product_id,
            name: row.name,
            description: row.description,
            short_description: row.short_description,
            full_description: row.full_description,
            price: row.price,
            sale_price: row.sale_price,
            cost: row.cost,
            quantity: row.quantity,
            min_stock_alert: row.min_stock_alert,
            status: row.status,
            category: row.category,
            tags: row.tags,
            keywords: row.keywords,
            sku: row.sku,
            image_url: row.image_url,
            manual_url: row.manual_url,
            is_published: row.is_published,
            featured: row.featured,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StockHistoryRow {
    history_id: StockHistoryId,
    product_id: ProductId,
    admin_id: Option<UserId>,
    previous_quantity: i32,
    new_quantity: i32,
    change_type: StockChangeKind,
    reason: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<StockHistoryRow> for StockHistoryEntry {
    fn from(row: StockHistoryRow) -> Self {
        Self {
            id: row.history_id,
            product_id: row.product_id,
            admin_id: row.admin_id,
            previous_quantity: row.previous_quantity,
            new_quantity: row.new_quantity,
            change_type: row.change_type,
            reason: row.reason,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MediaRow {
    media_id: MediaId,
    product_id: ProductId,
    kind: MediaKind,
    url: String,
    label: Option<String>,
    file_type: Option<String>,
    is_main: bool,
    sort_order: i32,
    created_at: DateTime<Utc>,
}

impl From<MediaRow> for ProductMedia {
    fn from(row: MediaRow) -> Self {
        Self {
            id: row.media_id,
            product_id: row.product_id,
            kind: row.kind,
            url: row.url,
            label: row.label,
            file_type: row.file_type,
            is_main: row.is_main,
            sort_order: row.sort_order,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ReservationRow {
    previous_quantity: i32,
    new_quantity: i32,
}

// =============================================================================
// Shared statements
// =============================================================================

/// Insert one product inside the caller's connection or transaction.
async fn insert_product(
    conn: &mut PgConnection,
    product: &NewProduct,
) -> Result<Product, StoreError> {
    let sql = format!(
        r"
        INSERT INTO products (
            name, description, short_description, full_description, price, sale_price,
            cost, quantity, min_stock_alert, status, category, tags, keywords, sku,
            image_url, manual_url, is_published, featured
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
        RETURNING {PRODUCT_COLUMNS}
        "
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.short_description)
        .bind(&product.full_description)
        .bind(product.price)
        .bind(product.sale_price)
        .bind(product.cost)
        .bind(product.quantity)
        .bind(product.min_stock_alert)
        .bind(product.initial_status())
        .bind(&product.category)
        .bind(&product.tags)
        .bind(&product.keywords)
        .bind(&product.sku)
        .bind(&product.image_url)
        .bind(&product.manual_url)
        .bind(product.is_published)
        .bind(product.featured)
        .fetch_one(conn)
        .await?;

    Ok(row.into())
}

/// Append a ledger row inside the caller's transaction.
async fn insert_history(
    conn: &mut PgConnection,
    product_id: ProductId,
    admin_id: Option<UserId>,
    previous_quantity: i32,
    new_quantity: i32,
    kind: StockChangeKind,
    reason: Option<&str>,
) -> Result<StockHistoryEntry, StoreError> {
    let sql = format!(
        r"
        INSERT INTO stock_history (
            product_id, admin_id, previous_quantity, new_quantity, change_type, reason
        )
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {HISTORY_COLUMNS}
        "
    );
    let row = sqlx::query_as::<_, StockHistoryRow>(&sql)
        .bind(product_id)
        .bind(admin_id)
        .bind(previous_quantity)
        .bind(new_quantity)
        .bind(kind)
        .bind(reason)
        .fetch_one(conn)
        .await?;

    Ok(row.into())
}

/// Take `quantity` units of an active product inside the caller's transaction.
///
/// The decrement is guarded by `quantity >= n`, so concurrent checkouts can
/// never drive stock negative. Records a `sale` ledger row.
///
/// # Errors
///
/// Returns `StoreError::NotFound` for an unknown product and
/// `StoreError::Conflict` when it is not sellable or lacks stock.
pub(super) async fn reserve_stock(
    conn: &mut PgConnection,
    product_id: ProductId,
    quantity: i32,
    reason: &str,
) -> Result<(), StoreError> {
    let reserved = sqlx::query_as::<_, ReservationRow>(
        r"
        UPDATE products
        SET quantity = quantity - $2,
            status = CASE WHEN quantity - $2 = 0
                          THEN 'out_of_stock'::product_status
                          ELSE status END,
            updated_at = NOW()
        WHERE product_id = $1 AND status = 'active' AND quantity >= $2
        RETURNING quantity + $2 AS previous_quantity, quantity AS new_quantity
        ",
    )
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(reserved) = reserved else {
        let current = sqlx::query_as::<_, (i32, ProductStatus)>(
            "SELECT quantity, status FROM products WHERE product_id = $1",
        )
        .bind(product_id)
        .fetch_optional(&mut *conn)
        .await?;

        return Err(match current {
            None => StoreError::not_found(format!("product {product_id}")),
            Some((available, status)) if !status.is_sellable() => {
                StoreError::Conflict(format!("product {product_id} is {status}, {available} in stock"))
            }
            Some((available, _)) => StoreError::Conflict(format!(
                "insufficient stock for product {product_id}: requested {quantity}, available {available}"
            )),
        });
    };

    insert_history(
        conn,
        product_id,
        None,
        reserved.previous_quantity,
        reserved.new_quantity,
        StockChangeKind::Sale,
        Some(reason),
    )
    .await?;

    Ok(())
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog database operations.
pub struct ProductRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ProductRepository<'a> {
    /// Create a new product repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Conflict` if the SKU is taken.
    pub async fn create(&self, product: &NewProduct) -> Result<Product, StoreError> {
        let mut conn = self.pool.acquire().await?;
        insert_product(&mut conn, product).await
    }

    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn get_by_id(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE product_id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// List products matching a filter.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: Page,
    ) -> Result<Vec<Product>, StoreError> {
        // `order_by` only ever yields fixed clauses.
        let sql = format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE {FILTER_CLAUSE} \
             ORDER BY {} LIMIT $5 OFFSET $6",
            filter.sort.order_by()
        );
        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(filter.category.as_deref())
            .bind(status_names(filter))
            .bind(search_pattern(filter))
            .bind(filter.published_only)
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Count products matching a filter.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn count(&self, filter: &ProductFilter) -> Result<i64, StoreError> {
        let sql = format!("SELECT COUNT(*) FROM products WHERE {FILTER_CLAUSE}");
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .bind(filter.category.as_deref())
            .bind(status_names(filter))
            .bind(search_pattern(filter))
            .bind(filter.published_only)
            .fetch_one(self.pool)
            .await?;

        Ok(count)
    }

    /// Apply a partial update. Stock-driven status rules still hold afterwards.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the product does not exist.
    pub async fn update(&self, id: ProductId, update: &ProductUpdate) -> Result<Product, StoreError> {
        let sql = format!(
            r"
            UPDATE products SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                short_description = COALESCE($4, short_description),
                full_description = COALESCE($5, full_description),
                price = COALESCE($6, price),
                sale_price = COALESCE($7, sale_price),
                cost = COALESCE($8, cost),
                min_stock_alert = COALESCE($9, min_stock_alert),
                status = {status},
                category = COALESCE($11, category),
                tags = COALESCE($12, tags),
                keywords = COALESCE($13, keywords),
                sku = COALESCE($14, sku),
                image_url = COALESCE($15, image_url),
                manual_url = COALESCE($16, manual_url),
                is_published = COALESCE($17, is_published),
                featured = COALESCE($18, featured),
                updated_at = NOW()
            WHERE product_id = $1
            RETURNING {PRODUCT_COLUMNS}
            ",
            status = status_for_quantity("$10"),
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(update.name.as_deref())
            .bind(update.description.as_deref())
            .bind(update.short_description.as_deref())
            .bind(update.full_description.as_deref())
            .bind(update.price)
            .bind(update.sale_price)
            .bind(update.cost)
            .bind(update.min_stock_alert)
            .bind(update.status)
            .bind(update.category.as_deref())
            .bind(update.tags.as_deref())
            .bind(update.keywords.as_deref())
            .bind(update.sku.as_deref())
            .bind(update.image_url.as_deref())
            .bind(update.manual_url.as_deref())
            .bind(update.is_published)
            .bind(update.featured)
            .fetch_optional(self.pool)
            .await?;

        row.map(Into::into)
            .ok_or_else(|| StoreError::not_found(format!("product {id}")))
    }

    /// Change the status, keeping stock-driven status rules.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the product does not exist.
    pub async fn set_status(
        &self,
        id: ProductId,
        status: ProductStatus,
    ) -> Result<Product, StoreError> {
        let sql = format!(
            "UPDATE products SET status = {}, updated_at = NOW() \
             WHERE product_id = $1 RETURNING {PRODUCT_COLUMNS}",
            status_for_quantity("$2::product_status"),
        );
        let row = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(id)
            .bind(Some(status))
            .fetch_optional(self.pool)
            .await?;

        row.map(Into::into)
            .ok_or_else(|| StoreError::not_found(format!("product {id}")))
    }

    /// Delete a product row.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the product does not exist.
    pub async fn delete(&self, id: ProductId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM products WHERE product_id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("product {id}")));
        }
        Ok(())
    }

    /// Set the stock level and append a ledger row in one transaction.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the product does not exist and
    /// `StoreError::Conflict` for a negative quantity.
    pub async fn adjust_stock(
        &self,
        adjustment: &StockAdjustment,
    ) -> Result<StockHistoryEntry, StoreError> {
        if adjustment.new_quantity < 0 {
            return Err(StoreError::Conflict("stock cannot be negative".to_owned()));
        }
        let id = adjustment.product_id;
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, (i32, ProductStatus)>(
            "SELECT quantity, status FROM products WHERE product_id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((previous, status)) = current else {
            return Err(StoreError::not_found(format!("product {id}")));
        };

        sqlx::query(
            "UPDATE products SET quantity = $2, status = $3, updated_at = NOW() \
             WHERE product_id = $1",
        )
        .bind(id)
        .bind(adjustment.new_quantity)
        .bind(status.for_quantity(adjustment.new_quantity))
        .execute(&mut *tx)
        .await?;

        let entry = insert_history(
            &mut *tx,
            id,
            adjustment.admin_id,
            previous,
            adjustment.new_quantity,
            adjustment.kind,
            adjustment.reason.as_deref(),
        )
        .await?;

        tx.commit().await?;
        Ok(entry)
    }

    /// Ledger rows for a product, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn history(
        &self,
        id: ProductId,
        limit: i64,
    ) -> Result<Vec<StockHistoryEntry>, StoreError> {
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM stock_history WHERE product_id = $1 \
             ORDER BY created_at DESC, history_id DESC LIMIT $2"
        );
        let rows = sqlx::query_as::<_, StockHistoryRow>(&sql)
            .bind(id)
            .bind(limit)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Active products at or below their alert threshold, lowest stock first.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn low_stock(&self) -> Result<Vec<LowStockAlert>, StoreError> {
        let rows = sqlx::query_as::<_, (ProductId, String, i32, i32)>(
            r"
            SELECT product_id, name, quantity, min_stock_alert
            FROM products
            WHERE status = 'active' AND quantity <= min_stock_alert
            ORDER BY quantity ASC, product_id ASC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(product_id, name, quantity, min_stock_alert)| LowStockAlert {
                product_id,
                name,
                quantity,
                min_stock_alert,
            })
            .collect())
    }

    /// Attach media. A new main image demotes the previous one.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the product does not exist.
    pub async fn add_media(&self, media: &NewMedia) -> Result<ProductMedia, StoreError> {
        let mut tx = self.pool.begin().await?;

        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM products WHERE product_id = $1)",
        )
        .bind(media.product_id)
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            return Err(StoreError::not_found(format!("product {}", media.product_id)));
        }

        if media.is_main {
            sqlx::query(
                "UPDATE product_media SET is_main = FALSE WHERE product_id = $1 AND kind = $2",
            )
            .bind(media.product_id)
            .bind(media.kind)
            .execute(&mut *tx)
            .await?;
        }

        let sql = format!(
            r"
            INSERT INTO product_media (product_id, kind, url, label, file_type, is_main, sort_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {MEDIA_COLUMNS}
            "
        );
        let row = sqlx::query_as::<_, MediaRow>(&sql)
            .bind(media.product_id)
            .bind(media.kind)
            .bind(&media.url)
            .bind(&media.label)
            .bind(&media.file_type)
            .bind(media.is_main)
            .bind(media.sort_order)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    /// Media for a product in display order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the query fails.
    pub async fn list_media(
        &self,
        product_id: ProductId,
        kind: Option<MediaKind>,
    ) -> Result<Vec<ProductMedia>, StoreError> {
        let sql = format!(
            "SELECT {MEDIA_COLUMNS} FROM product_media \
             WHERE product_id = $1 AND ($2::media_kind IS NULL OR kind = $2) \
             ORDER BY sort_order ASC, media_id ASC"
        );
        let rows = sqlx::query_as::<_, MediaRow>(&sql)
            .bind(product_id)
            .bind(kind)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Remove a media reference.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if it does not exist.
    pub async fn delete_media(&self, id: MediaId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM product_media WHERE media_id = $1")
            .bind(id)
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(format!("media {id}")));
        }
        Ok(())
    }

    /// Insert a synced product list and stamp the sync time, all or nothing.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if any insert fails; nothing is written then.
    pub async fn import(&self, products: &[NewProduct]) -> Result<ImportSummary, StoreError> {
        let mut tx = self.pool.begin().await?;

        for new_product in products {
            let product = insert_product(&mut *tx, new_product).await?;
            if product.quantity > 0 {
                insert_history(
                    &mut *tx,
                    product.id,
                    None,
                    0,
                    product.quantity,
                    StockChangeKind::Import,
                    Some("synced product list"),
                )
                .await?;
            }
        }

        let synced_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r"
            INSERT INTO catalog_sync (id, last_sync) VALUES (TRUE, NOW())
            ON CONFLICT (id) DO UPDATE SET last_sync = EXCLUDED.last_sync
            RETURNING last_sync
            ",
        )
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(ImportSummary {
            created: products.len(),
            synced_at: Some(synced_at),
        })
    }
}

/// Status after a write, mirroring `ProductStatus::for_quantity`. `param`
/// is the placeholder carrying the requested status (NULL keeps the current).
fn status_for_quantity(param: &str) -> String {
    format!(
        "CASE \
         WHEN quantity <= 0 AND COALESCE({param}, status) = 'active' THEN 'out_of_stock'::product_status \
         WHEN quantity > 0 AND COALESCE({param}, status) = 'out_of_stock' THEN 'active'::product_status \
         ELSE COALESCE({param}, status) END"
    )
}

fn status_names(filter: &ProductFilter) -> Vec<String> {
    filter
        .statuses
        .iter()
        .map(|s| s.as_str().to_owned())
        .collect()
}

fn search_pattern(filter: &ProductFilter) -> Option<String> {
    filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(like_pattern)
}
