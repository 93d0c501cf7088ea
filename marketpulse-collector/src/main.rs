use std::time::Duration;

use marketpulse_data::{EngineConfig, MarketDataAggregator, MarketSnapshot};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    init_logging();

    // Configurable via MARKETPULSE_SYMBOL env var (default: BTCUSDT)
    let symbol = std::env::var("MARKETPULSE_SYMBOL").unwrap_or_else(|_| "BTCUSDT".to_string());
    // Configurable via MARKETPULSE_INTERVAL_SECS env var (default: 300)
    let interval_secs = std::env::var("MARKETPULSE_INTERVAL_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(300);
    let run_once = std::env::var("MARKETPULSE_ONCE")
        .map(|value| matches!(value.as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    let out_path = std::env::var("MARKETPULSE_OUT").ok();

    info!("Starting marketpulse collector for {}", symbol);
    info!("Collection interval: {}s", interval_secs);

    let config = EngineConfig::new(symbol);
    let mut aggregator = match MarketDataAggregator::new(config) {
        Ok(aggregator) => aggregator,
        Err(error) => {
            error!("Failed to build aggregator: {}", error);
            std::process::exit(1);
        }
    };
    aggregator.start();

    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match aggregator.collect().await {
                    Ok(snapshot) => {
                        if let Err(error) = publish(&snapshot, out_path.as_deref()) {
                            warn!("Failed to publish snapshot: {}", error);
                        }
                    }
                    Err(error) => warn!("Collection cycle failed: {}", error),
                }
                if run_once {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received");
                break;
            }
        }
    }

    aggregator.stop().await;
    info!("Collector stopped");
}

/// Write the snapshot to `out_path`, or pretty-print it to stdout.
fn publish(snapshot: &MarketSnapshot, out_path: Option<&str>) -> std::io::Result<()> {
    let json = serde_json::to_string_pretty(snapshot)?;
    match out_path {
        Some(path) => std::fs::write(path, json),
        None => {
            println!("{json}");
            Ok(())
        }
    }
}

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_ansi(cfg!(debug_assertions))
        .init();
}
