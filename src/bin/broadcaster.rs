//! Broadcaster runtime
//!
//! Aggregates all five sources every tick and publishes the composite record
//! to the configured sink until CTRL+C or SIGTERM.
//!
//! Usage:
//!   cargo run --release --bin broadcaster
//!
//! Environment variables:
//!   REDIS_URL - Sink address (default: redis://localhost:6379/0, file:// for JSONL)
//!   REDIS_CHANNEL - Publish channel (default: terminal-v:data)
//!   BROADCAST_INTERVAL_MS - Tick interval (default: 200)
//!   TICK_DEADLINE_MS - Per-adapter bound within one tick (default: unset)

use dotenv::dotenv;
use log::{error, info};
use nexus_broadcaster::config::redact_url;
use nexus_broadcaster::{BroadcastConfig, Broadcaster, StopHandle};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let config = match BroadcastConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
            error!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(config.rust_log.as_str()))
        .init();

    info!("🚀 Broadcaster starting");
    info!("   ├─ Sink: {}", redact_url(&config.transport_url));
    info!("   ├─ Channel: {}", config.topic);
    info!("   ├─ Interval: {}ms", config.interval_ms);
    match config.tick_deadline_ms {
        Some(ms) => info!("   ├─ Tick deadline: {}ms", ms),
        None => info!("   ├─ Tick deadline: none"),
    }
    info!("   ├─ Symbols: {}", config.symbols.join(","));
    info!("   ├─ Region: {}", config.region);
    info!("   └─ Network: {}", config.network);

    let mut broadcaster = match Broadcaster::from_config(&config) {
        Ok(broadcaster) => broadcaster,
        Err(e) => {
            error!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    tokio::spawn(wait_for_shutdown(broadcaster.stop_handle()));
    info!("🔄 Press CTRL+C to shutdown gracefully");

    match broadcaster.start().await {
        Ok(published) => {
            info!("✅ Broadcaster runtime stopped ({} records published)", published);
            Ok(())
        }
        Err(e) => {
            error!("❌ Broadcaster failed: {}", e);
            std::process::exit(1);
        }
    }
}

async fn wait_for_shutdown(handle: StopHandle) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => log_ctrl_c(result),
                    _ = sigterm.recv() => info!("⚠️  Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                error!("❌ Failed to listen for SIGTERM: {}", e);
                log_ctrl_c(tokio::signal::ctrl_c().await);
            }
        }
    }

    #[cfg(not(unix))]
    log_ctrl_c(tokio::signal::ctrl_c().await);

    handle.stop();
}

fn log_ctrl_c(result: std::io::Result<()>) {
    match result {
        Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
        Err(err) => error!("❌ Failed to listen for CTRL+C: {}", err),
    }
}
