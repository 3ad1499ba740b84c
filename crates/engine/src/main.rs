//! SimBench Engine - control plane for embedded-target simulation and debug
//! backends.
//!
//! The engine:
//! - Spawns and supervises QEMU / Renode / OpenOCD children per session
//! - Drives them over per-command monitor connections
//! - Coordinates co-simulation groups across sessions
//! - Streams backend console output to WebSocket subscribers

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use simbench_engine::infrastructure::config::AppConfig;
use simbench_engine::infrastructure::http;
use simbench_engine::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simbench_engine=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting SimBench Engine");

    let config = AppConfig::from_env()?;
    tracing::info!("Configuration loaded");
    tracing::info!("  Data dir: {}", config.data_dir.display());
    tracing::info!("  Session cap: {}", config.max_sessions);
    tracing::info!(
        "  Backends: {} / {} / {}",
        config.qemu_binary,
        config.renode_binary,
        config.openocd_binary
    );

    let state = Arc::new(AppState::new(config).await?);
    tracing::info!("Application state initialized");

    let server_port = state.config.server_port;
    let shutdown_grace = state.config.shutdown_grace;

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(http::create_routes())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], server_port));
    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Drain in-flight requests after Ctrl+C, but only within the grace
    // window; stuck handlers must not block shutdown.
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown signal received");
                shutdown.cancel();
            }
        });
    }

    let server = axum::serve(listener, app).with_graceful_shutdown({
        let shutdown = shutdown.clone();
        async move { shutdown.cancelled().await }
    });

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("Server error: {}", e);
            }
        }
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(shutdown_grace).await;
        } => {
            tracing::warn!("Drain window elapsed; closing remaining connections");
        }
    }

    tracing::info!("Stopping live sessions");
    state.sessions.shutdown_all().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
