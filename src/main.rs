//! Movie API auth server
//!
//! Loads configuration, opens the auth database and serves the
//! authentication endpoints until Ctrl-C.

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use movie_api::{auth::AuthDb, config::Args, App};
use std::net::SocketAddr;
use std::path::Path;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let settings = Args::parse().into_settings()?;

    info!("🚀 Movie API auth service starting");

    let db = AuthDb::open(&settings.db_path)
        .with_context(|| format!("Failed to open auth database at {}", settings.db_path))?;
    let app = App::new(db, &settings)?;

    let _throttle_pruner = app.spawn_throttle_pruner();
    if let Some(interval) = settings.janitor_interval {
        info!("🧹 Refresh token janitor every {}s", interval.as_secs());
        let _janitor = app.spawn_janitor(interval);
    }

    let listener = TcpListener::bind(settings.bind)
        .await
        .with_context(|| format!("Failed to bind {}", settings.bind))?;
    info!("🎯 API server listening on {}", settings.bind);

    axum::serve(
        listener,
        app.router()
            .into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("👋 Shut down cleanly");
    Ok(())
}

/// Initialize tracing, honouring RUST_LOG when set
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "movie_api=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // Standard dotenv search (cwd + parents), then the crate root
    let _ = dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
