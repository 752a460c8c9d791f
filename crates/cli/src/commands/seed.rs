//! Seed the catalog with demo products and coupons.
//!
//! Safe to repeat: products are only inserted into an empty catalog and
//! coupons whose code already exists are skipped.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::info;

use stockhub_core::DiscountType;
use stockhub_shop::models::{NewCoupon, NewProduct, ProductFilter};
use stockhub_shop::{Shop, ShopConfig, ShopError};

use super::CliError;

fn demo_products() -> Vec<NewProduct> {
    [
        (
            "StockHub Pro Subscription",
            "Full access to every feature including premium tools and priority support.",
            1999,
            "Subscription",
            9999,
        ),
        (
            "Premium Tools",
            "Advanced productivity tools for developers and businesses.",
            4999,
            "Tools",
            500,
        ),
        (
            "Enterprise Solution",
            "Complete enterprise-grade solution with custom integrations.",
            9999,
            "Enterprise",
            100,
        ),
        (
            "Developer Starter Kit",
            "Everything you need to get started.",
            999,
            "Starter",
            2000,
        ),
        (
            "API Access Token",
            "Unlimited API access for your applications.",
            1499,
            "API",
            1000,
        ),
    ]
    .into_iter()
    .map(|(name, description, cents, category, quantity)| {
        NewProduct::new(name, Decimal::new(cents, 2), quantity)
            .with_description(description)
            .with_category(category)
    })
    .collect()
}

fn demo_coupons() -> Vec<NewCoupon> {
    let mut coupons = vec![
        NewCoupon::new("WELCOME10", DiscountType::Fixed, Decimal::from(10)).with_max_uses(100),
        NewCoupon::new("SAVE20", DiscountType::Percent, Decimal::from(20)).with_max_uses(50),
    ];
    let black_friday = NewCoupon::new("BLACKFRIDAY", DiscountType::Percent, Decimal::from(50))
        .with_max_uses(10);
    let end_of_year = NaiveDate::from_ymd_opt(2026, 12, 31)
        .and_then(|d| d.and_hms_opt(23, 59, 59))
        .map(|t| t.and_utc());
    // Skip an already expired seed coupon
    if let Some(at) = end_of_year
        && at > Utc::now()
    {
        coupons.push(black_friday.expiring_at(at));
    }
    coupons
}

/// Insert the demo dataset.
///
/// # Errors
///
/// Returns `CliError` if the store rejects a product or coupon for any
/// reason other than an existing coupon code.
pub async fn run(config: &ShopConfig) -> Result<(), CliError> {
    let shop = Shop::from_config(config)?;
    info!(mode = ?shop.mode().await, "Seeding");

    let existing = shop
        .catalog()
        .count_products(&ProductFilter::default())
        .await?;
    if existing == 0 {
        for product in demo_products() {
            shop.catalog().create_product(&product, None).await?;
        }
        info!("Demo products created");
    } else {
        info!(existing, "Catalog not empty, skipping demo products");
    }

    for coupon in demo_coupons() {
        match shop.coupons().create_coupon(&coupon, None).await {
            Ok(created) => info!(code = %created.code, "Coupon created"),
            Err(ShopError::Conflict(_)) => info!(code = %coupon.code, "Coupon already present"),
            Err(e) => return Err(e.into()),
        }
    }

    info!("Seeding complete");
    Ok(())
}
