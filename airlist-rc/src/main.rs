//! Airlist Reconciler (airlist-rc) - Main entry point
//!
//! Mirrors a broadcast station's "now playing" stream into a bounded,
//! de-duplicated playlist on a remote music catalog, and exposes an
//! HTTP/SSE control surface for status and admin triggers.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use airlist_rc::api;
use airlist_rc::catalog::http::RetryPolicy;
use airlist_rc::catalog::HttpCatalog;
use airlist_rc::config::Config;
use airlist_rc::engine::Engine;
use airlist_rc::feed::HttpFeed;
use airlist_rc::notifier::{LogNotifier, Notifier, WebhookNotifier};
use airlist_rc::snapshot::JsonSnapshotStore;

/// Command-line arguments for airlist-rc
#[derive(Parser, Debug)]
#[command(name = "airlist-rc")]
#[command(about = "Broadcast-to-playlist reconciler")]
#[command(version)]
struct Args {
    /// Path to TOML config file
    #[arg(short, long)]
    config: Option<String>,

    /// Port to listen on (overrides config)
    #[arg(short, long, env = "AIRLIST_PORT")]
    port: Option<u16>,

    /// Station slug to monitor (overrides config)
    #[arg(long, env = "AIRLIST_STATION")]
    station: Option<String>,

    /// Target playlist id (overrides config)
    #[arg(long, env = "AIRLIST_PLAYLIST")]
    playlist: Option<String>,

    /// Catalog API bearer token (overrides config)
    #[arg(long, env = "AIRLIST_CATALOG_TOKEN", hide_env_values = true)]
    catalog_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "airlist_rc=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Parse command-line arguments
    let args = Args::parse();

    // Resolve and load configuration (CLI > env > platform config dir)
    let config_path = airlist_common::config::resolve_config_path(
        args.config.as_deref(),
        "AIRLIST_CONFIG",
    )
    .context("Failed to resolve config file")?;
    let mut config = Config::load(config_path.as_deref()).context("Failed to load config")?;

    if let Some(port) = args.port {
        config.port = port;
    }
    if let Some(station) = args.station {
        config.station_slug = station;
    }
    if let Some(playlist) = args.playlist {
        config.playlist_id = playlist;
    }
    if let Some(token) = args.catalog_token {
        config.catalog_token = Some(token);
    }
    config.validate().context("Invalid configuration")?;

    info!(
        station = %config.station_slug,
        playlist = %config.playlist_id,
        tick_interval_secs = config.tick_interval_secs,
        sweep_interval_secs = config.sweep_interval_secs,
        "Starting airlist reconciler"
    );

    // Wire up the collaborators
    let feed = Arc::new(
        HttpFeed::new(&config.feed_base_url, &config.station_slug)
            .context("Failed to build feed client")?,
    );
    let retry_policy = RetryPolicy {
        max_attempts: config.http_retry_attempts,
        base_delay: Duration::from_millis(config.http_retry_base_delay_ms),
    };
    let catalog = Arc::new(
        HttpCatalog::new(
            &config.catalog_base_url,
            &config.playlist_id,
            config.catalog_token.clone(),
            retry_policy,
        )
        .context("Failed to build catalog client")?,
    );
    let store = Arc::new(JsonSnapshotStore::new(config.snapshot_path.clone()));
    let notifier: Arc<dyn Notifier> = match config.notify_url.as_deref() {
        Some(url) => match WebhookNotifier::new(url) {
            Some(webhook) => Arc::new(webhook),
            None => Arc::new(LogNotifier),
        },
        None => Arc::new(LogNotifier),
    };

    let engine = Arc::new(Engine::new(&config, feed, catalog, store, notifier).await);
    info!("Reconciliation engine initialized");

    // Start the serialized cycle task
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let cycle = tokio::spawn(engine.clone().run(shutdown_rx.clone()));

    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    // Build and run the control surface
    let app = api::create_router(api::AppContext {
        engine: engine.clone(),
    });
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    let mut server_shutdown = shutdown_rx;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = server_shutdown.changed().await;
        })
        .await
        .context("Server error")?;

    // Let the cycle finish its final persist
    let _ = cycle.await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
