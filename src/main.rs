//! kassa-gateway server entry point.
//!
//! Starts the Axum HTTP server that receives, verifies, and reconciles
//! payment gateway webhook deliveries.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use kassa_gateway::api;
use kassa_gateway::app_state::AppState;
use kassa_gateway::config::GatewayConfig;
use kassa_gateway::persistence::{PaymentStore, PostgresStore};
use kassa_gateway::service::{NoopNotifier, NoopReferralProcessor, ReconciliationService};
use kassa_gateway::webhook::{KeyStore, SignatureVerifier};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env()?;
    if !config.enabled {
        tracing::warn!("payment processing is disabled via YOOKASSA_ENABLED; exiting");
        return Ok(());
    }
    if !config.credentials_configured() {
        tracing::warn!("shop credentials are not configured; outbound payment calls will fail");
    }
    tracing::info!(
        addr = %config.listen_addr,
        mode = config.signature_mode.as_str(),
        "starting kassa-gateway"
    );

    // Connect to PostgreSQL and apply migrations
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .min_connections(config.database_min_connections)
        .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!().run(&pool).await?;

    // Build persistence and service layers
    let store: Arc<dyn PaymentStore> = Arc::new(PostgresStore::new(pool));
    let reconciliation = Arc::new(ReconciliationService::new(
        store,
        Arc::new(NoopNotifier),
        Arc::new(NoopReferralProcessor),
    ));

    // Build webhook verification layer
    let key_store = Arc::new(KeyStore::new(
        &config.key_base_url,
        Duration::from_secs(config.key_fetch_timeout_secs),
        Duration::from_secs(config.key_refresh_secs),
    )?);
    let verifier = Arc::new(SignatureVerifier::new(key_store));

    // Build application state
    let listen_addr = config.listen_addr;
    let request_timeout = Duration::from_secs(config.request_timeout_secs);
    let app_state = AppState {
        reconciliation,
        verifier,
        config: Arc::new(config),
    };

    // Build router
    let app = Router::new()
        .merge(api::build_router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    tracing::info!(addr = %listen_addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Resolves once the process receives SIGINT or SIGTERM.
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            tracing::error!(%error, "failed to install interrupt handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => {}
        () = terminate => {}
    }

    tracing::info!("shutdown signal received, draining in-flight requests");
}
