// src/main.rs
use anyhow::Context;
use dotenv::dotenv;
use found_fonts_foundry::proxy::{self, AppState};
use found_fonts_foundry::{utils, ArenaClient, Config, FetchClient, ResponseCache};
use log::{info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    utils::setup_logging().expect("Failed to initialize logging");
    info!("🚀 Found Fonts Foundry gallery backend starting...");

    let config = Arc::new(Config::from_env());
    config.validate_and_log();

    let cache = Arc::new(ResponseCache::new(config.cache_window()));
    let fetch = Arc::new(
        FetchClient::new(cache.clone(), config.as_ref()).context("building fetch client")?,
    );
    let arena = Arc::new(ArenaClient::new(fetch.clone(), config.as_ref()));

    // Periodic sweep keeps the cache bounded across long uptimes; it runs
    // against the shared map without blocking readers.
    let sweep_cache = cache.clone();
    let sweep_interval = Duration::from_secs(config.cache_sweep_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            sweep_cache.evict_stale(Instant::now());
        }
    });

    // Keep the channel-info entry warm; the cache window still bounds
    // actual upstream traffic to one call per window.
    let warm_fetch = fetch.clone();
    let warm_url = arena.channel_info_url();
    let refresh_interval = Duration::from_secs(config.metadata_refresh_interval_secs);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(refresh_interval);
        loop {
            interval.tick().await;
            if let Err(e) = warm_fetch.fetch_json(&warm_url, false).await {
                warn!("channel info refresh failed: {}", e);
            }
        }
    });

    let state = AppState {
        fetch: fetch.clone(),
        arena,
        config: config.clone(),
    };
    let app = proxy::router(state);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    info!("📡 Listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("🛑 Shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl-c");
    info!("CTRL-C received, shutting down...");
}
