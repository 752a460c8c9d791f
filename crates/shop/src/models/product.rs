//! Catalog domain models: products, stock ledger and product media.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockhub_core::{MediaId, MediaKind, ProductId, ProductStatus, StockChangeKind, StockHistoryId, UserId};

use super::contains_ignore_case;

/// A product in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub short_description: Option<String>,
    pub full_description: Option<String>,
    /// List price.
    pub price: Decimal,
    /// Discounted price shown instead of `price` when present.
    pub sale_price: Option<Decimal>,
    /// Purchase cost, for margin reporting.
    pub cost: Option<Decimal>,
    /// Units in stock. Never negative.
    pub quantity: i32,
    /// Stock level at or below which the product shows up in low-stock alerts.
    pub min_stock_alert: i32,
    pub status: ProductStatus,
    pub category: Option<String>,
    /// Comma-separated tags.
    pub tags: String,
    /// Comma-separated search keywords.
    pub keywords: String,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub manual_url: Option<String>,
    pub is_published: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price a buyer pays right now.
    #[must_use]
    pub fn effective_price(&self) -> Decimal {
        self.sale_price.unwrap_or(self.price)
    }

    /// Whether the product should appear in low-stock alerts.
    #[must_use]
    pub fn is_low_stock(&self) -> bool {
        self.status == ProductStatus::Active && self.quantity <= self.min_stock_alert
    }
}

/// Input for creating a product.
///
/// Also the record format of synced product lists, so every field but
/// `name` and `price` has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub full_description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub sale_price: Option<Decimal>,
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub quantity: i32,
    #[serde(default)]
    pub min_stock_alert: i32,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: String,
    #[serde(default)]
    pub keywords: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub manual_url: Option<String>,
    #[serde(default = "published_by_default")]
    pub is_published: bool,
    #[serde(default)]
    pub featured: bool,
}

const fn published_by_default() -> bool {
    true
}

impl NewProduct {
    /// A published, active product with the given name, price and stock.
    #[must_use]
    pub fn new(name: impl Into<String>, price: Decimal, quantity: i32) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            short_description: None,
            full_description: None,
            price,
            sale_price: None,
            cost: None,
            quantity,
            min_stock_alert: 0,
            status: ProductStatus::Active,
            category: None,
            tags: String::new(),
            keywords: String::new(),
            sku: None,
            image_url: None,
            manual_url: None,
            is_published: true,
            featured: false,
        }
    }

    /// Set the category.
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the low-stock threshold.
    #[must_use]
    pub const fn with_min_stock_alert(mut self, threshold: i32) -> Self {
        self.min_stock_alert = threshold;
        self
    }

    /// Status the product is stored with, after applying the stock rule.
    #[must_use]
    pub const fn initial_status(&self) -> ProductStatus {
        self.status.for_quantity(self.quantity)
    }
}

/// Partial product update.
///
/// Only the fields listed here can be changed through an update; stock goes
/// through [`StockAdjustment`] so every change lands in the ledger. `None`
/// leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub short_description: Option<String>,
    pub full_description: Option<String>,
    pub price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub min_stock_alert: Option<i32>,
    pub status: Option<ProductStatus>,
    pub category: Option<String>,
    pub tags: Option<String>,
    pub keywords: Option<String>,
    pub sku: Option<String>,
    pub image_url: Option<String>,
    pub manual_url: Option<String>,
    pub is_published: Option<bool>,
    pub featured: Option<bool>,
}

impl ProductUpdate {
    /// Whether the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the update to an in-memory product.
    pub fn apply_to(&self, product: &mut Product) {
        fn set<T: Clone>(slot: &mut T, value: Option<&T>) {
            if let Some(v) = value {
                slot.clone_from(v);
            }
        }
        fn set_opt<T: Clone>(slot: &mut Option<T>, value: Option<&T>) {
            if let Some(v) = value {
                *slot = Some(v.clone());
            }
        }

        set(&mut product.name, self.name.as_ref());
        set(&mut product.description, self.description.as_ref());
        set_opt(&mut product.short_description, self.short_description.as_ref());
        set_opt(&mut product.full_description, self.full_description.as_ref());
        set(&mut product.price, self.price.as_ref());
        set_opt(&mut product.sale_price, self.sale_price.as_ref());
        set_opt(&mut product.cost, self.cost.as_ref());
        set(&mut product.min_stock_alert, self.min_stock_alert.as_ref());
        set(&mut product.status, self.status.as_ref());
        set_opt(&mut product.category, self.category.as_ref());
        set(&mut product.tags, self.tags.as_ref());
        set(&mut product.keywords, self.keywords.as_ref());
        set_opt(&mut product.sku, self.sku.as_ref());
        set_opt(&mut product.image_url, self.image_url.as_ref());
        set_opt(&mut product.manual_url, self.manual_url.as_ref());
        set(&mut product.is_published, self.is_published.as_ref());
        set(&mut product.featured, self.featured.as_ref());
        product.status = product.status.for_quantity(product.quantity);
    }
}

/// Sort order for product listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
    Name,
    StockAsc,
}

impl ProductSort {
    /// `ORDER BY` clause for the sort. Only these fixed strings ever reach SQL.
    #[must_use]
    pub const fn order_by(self) -> &'static str {
        match self {
            Self::Newest => "created_at DESC, product_id DESC",
            Self::Oldest => "created_at ASC, product_id ASC",
            Self::PriceAsc => "price ASC, product_id ASC",
            Self::PriceDesc => "price DESC, product_id DESC",
            Self::Name => "name ASC, product_id ASC",
            Self::StockAsc => "quantity ASC, product_id ASC",
        }
    }

    /// Sort products in memory the same way the SQL clause does.
    pub fn sort(self, products: &mut [Product]) {
        match self {
            Self::Newest => products.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id))),
            Self::Oldest => products.sort_by_key(|p| (p.created_at, p.id)),
            Self::PriceAsc => products.sort_by_key(|p| (p.price, p.id)),
            Self::PriceDesc => products.sort_by(|a, b| (b.price, b.id).cmp(&(a.price, a.id))),
            Self::Name => products.sort_by(|a, b| (&a.name, a.id).cmp(&(&b.name, b.id))),
            Self::StockAsc => products.sort_by_key(|p| (p.quantity, p.id)),
        }
    }
}

/// Product listing filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductFilter {
    pub category: Option<String>,
    /// Empty means any status.
    pub statuses: Vec<ProductStatus>,
    /// Case-insensitive match on name, description or SKU.
    pub search: Option<String>,
    pub published_only: bool,
    pub sort: ProductSort,
}

impl ProductFilter {
    /// Published, active products for the storefront.
    #[must_use]
    pub fn storefront() -> Self {
        Self {
            statuses: vec![ProductStatus::Active],
            published_only: true,
            ..Self::default()
        }
    }

    /// In-memory equivalent of the SQL `WHERE` clause.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if self
            .category
            .as_ref()
            .is_some_and(|c| product.category.as_ref() != Some(c))
        {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&product.status) {
            return false;
        }
        if self.published_only && !product.is_published {
            return false;
        }
        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            None => true,
            Some(term) => {
                let needle = term.to_lowercase();
                contains_ignore_case(&product.name, &needle)
                    || contains_ignore_case(&product.description, &needle)
                    || product
                        .sku
                        .as_deref()
                        .is_some_and(|sku| contains_ignore_case(sku, &needle))
            }
        }
    }
}

/// A stock level change requested by an admin or an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustment {
    pub product_id: ProductId,
    pub new_quantity: i32,
    pub kind: StockChangeKind,
    pub reason: Option<String>,
    pub admin_id: Option<UserId>,
}

/// One row of the stock ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockHistoryEntry {
    pub id: StockHistoryId,
    pub product_id: ProductId,
    pub admin_id: Option<UserId>,
    pub previous_quantity: i32,
    pub new_quantity: i32,
    pub change_type: StockChangeKind,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An active product at or below its alert threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowStockAlert {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: i32,
    pub min_stock_alert: i32,
}

impl From<&Product> for LowStockAlert {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            quantity: product.quantity,
            min_stock_alert: product.min_stock_alert,
        }
    }
}

/// An image or downloadable file reference attached to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductMedia {
    pub id: MediaId,
    pub product_id: ProductId,
    pub kind: MediaKind,
    pub url: String,
    /// Alt text for images, display name for files.
    pub label: Option<String>,
    pub file_type: Option<String>,
    pub is_main: bool,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
}

/// Input for attaching media to a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMedia {
    pub product_id: ProductId,
    pub kind: MediaKind,
    pub url: String,
    pub label: Option<String>,
    pub file_type: Option<String>,
    pub is_main: bool,
    pub sort_order: i32,
}

/// Result of ingesting a synced product list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub created: usize,
    pub synced_at: Option<DateTime<Utc>>,
}
