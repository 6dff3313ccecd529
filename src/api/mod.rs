//! HTTP API layer: webhook intake, status, and health endpoints.
//!
//! All routes live at absolute paths matching what the payment gateway
//! is configured to call; there is no version prefix.

pub mod handlers;

use axum::Router;

use crate::app_state::AppState;

/// Service name reported by the health and status endpoints.
pub(crate) const SERVICE_NAME: &str = "yookassa_webhook";

/// Builds the complete router with all endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(handlers::webhook::routes())
        .merge(handlers::system::routes())
}
