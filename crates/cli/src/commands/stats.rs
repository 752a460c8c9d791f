//! Print dashboard statistics.

use rust_decimal::Decimal;
use serde::Serialize;

use stockhub_shop::models::{DashboardStats, OrderStatusCounts};
use stockhub_shop::{PersistenceMode, Shop, ShopConfig};

use super::CliError;

#[derive(Serialize)]
struct StatsReport {
    mode: PersistenceMode,
    /// Revenue of every delivered, unrefunded order.
    total_revenue: Decimal,
    status_counts: OrderStatusCounts,
    #[serde(flatten)]
    stats: DashboardStats,
}

async fn collect(shop: &Shop) -> Result<StatsReport, CliError> {
    let stats = shop.dashboard_stats().await?;
    let total_revenue = shop.revenue_between(None, None).await?;
    let status_counts = shop.order_counts_by_status().await?;
    // Read after the calls so a failover is reflected
    Ok(StatsReport {
        mode: shop.mode().await,
        total_revenue,
        status_counts,
        stats,
    })
}

/// Print the dashboard figures and the serving store as pretty JSON.
///
/// # Errors
///
/// Returns `CliError` if neither store can answer.
pub async fn run(config: &ShopConfig) -> Result<(), CliError> {
    let shop = Shop::from_config(config)?;
    let report = collect(&shop).await?;

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn report_covers_demo_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let shop = Shop::demo(dir.path().join("demo-products.json"));

        let report = collect(&shop).await.expect("report");
        assert_eq!(report.mode, PersistenceMode::Demo);
        assert_eq!(report.status_counts.total(), 1);

        let json = serde_json::to_value(&report).expect("json");
        assert_eq!(json["mode"], "demo");
        assert!(json.get("total_revenue").is_some());
        assert_eq!(json["status_counts"]["pending"], 1);
        assert!(json.get("pending_orders").is_some());
    }
}
