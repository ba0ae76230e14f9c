use anyhow::Context;
use storefront_app::{init_tracing, StorefrontSession};
use storefront_store::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("Failed to load config")?;
    init_tracing(&config.logging.filter);
    tracing::info!("Starting storefront client against {}", config.api.base_url);

    let session = StorefrontSession::from_config(&config);

    session.cart().load().await.context("Failed to load cart")?;
    let lines = session.cart().lines().await;
    tracing::info!(user = %session.user(), lines = lines.len(), "Cart loaded");
    for line in &lines {
        println!(
            "{:<24} x{:<3} {:>14}{}",
            line.product.as_str(),
            line.quantity,
            line.line_total().to_string(),
            if line.is_out_of_stock() { "  (out of stock)" } else { "" }
        );
    }

    let orders = session
        .history()
        .list(session.user())
        .await
        .context("Failed to list orders")?;
    tracing::info!(count = orders.len(), "Order history loaded");
    for order in &orders {
        let badge = order.status().badge();
        println!(
            "#{:<26} {:<14} {:>14}  {}",
            order.id().as_str(),
            badge.label,
            order.total_price().to_string(),
            order.created_at().format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}
