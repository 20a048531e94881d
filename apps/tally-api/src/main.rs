//! # Tally API
//!
//! ## Startup
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  env ──► AppConfig ──► SQLite pool (+ migrations) ──► QueryCache        │
//! │                                                          │              │
//! │                                      Redis ◄── REDIS_URL ┤ else memory  │
//! │                                                          ▼              │
//! │  client ───► HTTP (8080) ───► Router ───► Services ───► SQLite          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tally_api::{router, AppConfig, AppState, QueryCache};
use tally_db::{Database, DbConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,tally=debug,sqlx=warn")),
        )
        .with_target(true)
        .init();

    info!("Starting Tally API server...");

    let config = AppConfig::load().context("Failed to load configuration")?;
    info!(
        addr = %config.bind_addr,
        db_path = %config.db_path,
        cache_ttl_secs = config.cache_ttl_secs,
        "Configuration loaded"
    );
    if config.uses_dev_secret() {
        warn!("JWT_SECRET is not set; using the development secret");
    }

    let db = Database::new(DbConfig::new(&config.db_path).max_connections(config.db_max_connections))
        .await
        .context("Failed to open database")?;
    info!("Database ready");

    let ttl = Duration::from_secs(config.cache_ttl_secs);
    let cache = match config.redis_url.as_deref() {
        Some(url) => match QueryCache::redis(url, ttl).await {
            Ok(cache) => cache,
            Err(e) => {
                warn!(error = %e, "Failed to connect to Redis, using in-process cache");
                QueryCache::memory(ttl)
            }
        },
        None => QueryCache::memory(ttl),
    };
    info!(backend = cache.backend(), "Query cache ready");

    let addr = config.bind_addr;
    let state = AppState::new(db.clone(), cache, &config);
    let app = router(state);

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr}"))?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    db.close().await;
    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
