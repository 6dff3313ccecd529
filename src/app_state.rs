//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::config::GatewayConfig;
use crate::service::ReconciliationService;
use crate::webhook::SignatureVerifier;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Reconciliation engine applying verified events to records.
    pub reconciliation: Arc<ReconciliationService>,
    /// Signature verifier for inbound deliveries.
    pub verifier: Arc<SignatureVerifier>,
    /// Gateway configuration snapshot.
    pub config: Arc<GatewayConfig>,
}
