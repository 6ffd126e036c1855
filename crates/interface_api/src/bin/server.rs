//! Tour Payments - API Server Binary
//!
//! This binary starts the HTTP API server for the payment reconciliation core.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin payments-api
//!
//! # Run against the in-memory ledger with sandbox gateway credentials
//! API_STORAGE_BACKEND=memory API_GATEWAY__STORE_ID=teststore \
//!     API_GATEWAY__STORE_PASSWORD=secret cargo run --bin payments-api
//! ```
//!
//! # Environment Variables
//!
//! * `API_HOST` - Server host (default: 0.0.0.0)
//! * `API_PORT` - Server port (default: 8080)
//! * `API_JWT_SECRET` - JWT signing secret (required in production)
//! * `API_JWT_EXPIRATION_SECS` - JWT token expiration in seconds (default: 3600)
//! * `API_DATABASE_URL` - PostgreSQL connection string
//! * `API_LOG_LEVEL` - Log level: trace, debug, info, warn, error (default: info)
//! * `API_LOG_FORMAT` - `text` (default) or `json`
//! * `API_STORAGE_BACKEND` - `postgres` (default) or `memory`
//! * `API_FRONTEND_URL` - Base URL checkout redirects are sent to
//! * `API_GATEWAY__*` - SSLCommerz settings (`STORE_ID`, `STORE_PASSWORD`,
//!   `SANDBOX`, `SUCCESS_URL`, `FAIL_URL`, `CANCEL_URL`, `IPN_URL`, `TIMEOUT_SECS`)

use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_payments::adapters::{InMemoryLedgerStore, SslCommerzGateway};
use domain_payments::{LedgerStore, ReconciliationEngine};
use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresLedgerStore};
use interface_api::config::{ApiConfig, LogFormat, StorageBackend};
use interface_api::create_router;

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration, opens the ledger store,
/// and starts the HTTP server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = ApiConfig::from_env().context("Failed to load configuration")?;

    init_tracing(&config.log_level, config.log_format);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        storage = ?config.storage_backend,
        sandbox = config.gateway.sandbox,
        "Starting Tour Payments API Server"
    );

    let store = open_ledger_store(&config).await?;
    let gateway = Arc::new(
        SslCommerzGateway::new(config.gateway.clone())
            .context("Failed to configure payment gateway")?,
    );
    let engine = Arc::new(ReconciliationEngine::new(
        store,
        gateway,
        config.gateway.currency,
    ));

    let app = create_router(engine, config.clone());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .context("Invalid server address")?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber for structured logging.
///
/// `RUST_LOG` takes precedence over the configured level.
fn init_tracing(log_level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
    }
}

/// Connects the configured ledger store, migrating PostgreSQL first.
async fn open_ledger_store(config: &ApiConfig) -> anyhow::Result<Arc<dyn LedgerStore>> {
    match config.storage_backend {
        StorageBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let pool = create_pool(
                DatabaseConfig::new(config.database_url.clone())
                    .max_connections(10)
                    .min_connections(2)
                    .connect_timeout(Duration::from_secs(30)),
            )
            .await
            .context("Failed to connect to database")?;

            tracing::info!("Running database migrations...");
            run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            tracing::info!("Database ready");
            Ok(Arc::new(PostgresLedgerStore::new(pool)))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory ledger; bookings and payments are lost on restart");
            Ok(Arc::new(InMemoryLedgerStore::new()))
        }
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
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
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
