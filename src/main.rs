//! balance-api - Account Balance & Ledger Backend API
//!
//! Maintains per-account fixed-point balances and an immutable transaction
//! ledger, exposed as atomic credit/debit/transfer operations over HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::postgres::PgPoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use balance_api::api::{self, AppState};
use balance_api::jobs::{RateRefreshConfig, RateRefreshJob};
use balance_api::rates::RateCache;
use balance_api::store::PgBalanceStore;
use balance_api::{db, Config};

/// Initialize tracing/logging
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "balance_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    init_tracing();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    tracing::info!("Starting balance-api server");
    tracing::info!("Connecting to database...");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    if !db::check_schema(&pool).await? {
        tracing::error!("Database schema is not complete. Please run migrations.");
        return Err(anyhow::anyhow!("Database schema incomplete"));
    }

    tracing::info!("Database connected successfully");

    let rate_cache = Arc::new(RateCache::new(config.rates_ttl));

    // The refresh job is independent of the request path: without a rates
    // URL the service still runs, with conversion reported unavailable.
    let rates_job = match config.rates_url.clone() {
        Some(url) => Some(
            RateRefreshJob::new(
                rate_cache.clone(),
                RateRefreshConfig {
                    url,
                    refresh_interval: config.rates_refresh_interval,
                },
            )
            .start(),
        ),
        None => {
            tracing::warn!("EXCHANGE_RATES_URL not set, currency conversion disabled");
            None
        }
    };

    let store = Arc::new(PgBalanceStore::new(pool.clone(), config.lock_timeout));
    let state = AppState::new(store, rate_cache, config.base_currency.clone());

    let app = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api::create_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutting down...");
    if let Some(job) = rates_job {
        job.abort();
    }
    pool.close().await;
    tracing::info!("Database connections closed. Goodbye!");

    Ok(())
}

/// Shutdown signal handler for graceful shutdown
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}
