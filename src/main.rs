use anyhow::Result;
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

mod config;
mod dashboard;
mod db;
mod feed;
mod sync;
mod view;

use config::Config;
use dashboard::AppState;
use db::Database;
use feed::FeedClient;
use sync::{FavouritesStore, SyncEngine, SyncState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    // Open database
    let db = Database::open(&config.database_path)?;
    info!("Database opened: {}", config.database_path);

    let favourites = FavouritesStore::load(Arc::new(db));
    info!("Loaded {} favourite(s)", favourites.len());
    let state = SyncState::new(favourites, config.search_min_chars);

    let feed = FeedClient::new(
        &config.feed_url,
        config.feed_username.as_deref(),
        config.retry_policy(),
    )?;

    let mut engine = SyncEngine::new(Arc::new(feed), state, config.timings());
    engine.start(config.poll_interval());

    // Start the view API
    let app = dashboard::router(AppState {
        sync: engine.state(),
    });
    let addr: SocketAddr = config.dashboard_addr.parse()?;
    info!("View API listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    engine.stop().await;
    Ok(())
}
