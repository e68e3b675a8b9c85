pub mod achievements;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod rpc;
pub mod scanner;
pub mod stats;
pub mod store;
pub mod types;

use std::sync::Arc;

use config::ScanConfig;
use gateway::Gateway;
use rpc::JsonRpcClient;
use scanner::Scanner;
use store::EventStore;

#[tokio::main]
pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Logs go to stderr so stdout stays clean for tooling.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = ScanConfig::from_env();
    log::info!("🚀 Starting stakescan...");
    log::info!("📊 Configuration:");
    log::info!("   Node URL: {}", config.node_url);
    log::info!("   Database: {}", config.db_path);
    log::info!(
        "   Batch size: {} ({} concurrent requests)",
        config.batch_size,
        config.max_concurrent_requests
    );

    let store = EventStore::open(&config.db_path)?;
    let rpc = Arc::new(JsonRpcClient::new(&config.node_url)?);
    let gateway = Arc::new(Gateway::new(&config));
    let scanner = Scanner::new(rpc, gateway.clone(), store.clone(), config.clone());

    scanner.run().await?;

    // Derived passes over whatever the scan indexed.
    let now = chrono::Utc::now().timestamp();
    for address in store.addresses_with_events()? {
        stats::refresh_trend_metrics(&store, &address, now, config.trend_staleness_hours)?;
    }
    stats::recompute_rankings(&store)?;
    achievements::run_achievement_pass(&store, now)?;

    let snapshot = gateway.snapshot();
    log::info!(
        "✅ Done. Gateway: {} allowed, {} rate limited, {} circuit rejected, {} upstream failures",
        snapshot.allowed,
        snapshot.rate_limited,
        snapshot.circuit_rejected,
        snapshot.upstream_failures
    );

    Ok(())
}
