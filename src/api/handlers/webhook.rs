//! Webhook endpoints: delivery intake and service status.
//!
//! The intake handler runs the full pipeline for each delivery: read
//! the raw body, verify its signature, gate on the configured
//! verification mode, parse the payload, and hand the event to the
//! reconciliation engine. The gateway retries any non-200 response, so
//! every distinct failure maps to a deliberate status code.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::SERVICE_NAME;
use crate::app_state::AppState;
use crate::config::SignatureMode;
use crate::error::{ErrorResponse, GatewayError};
use crate::webhook::{ParsedWebhook, Verification, parse_event};

/// Header names checked for the delivery signature, in order.
const SIGNATURE_HEADERS: [&str; 2] = ["Signature", "X-YooKassa-Signature"];

/// `POST /webhook/yookassa` — Receive a payment notification.
///
/// # Errors
///
/// Returns [`GatewayError`] when the signature is rejected in strict
/// mode, the payload is malformed, or reconciliation fails.
#[utoipa::path(
    post,
    path = "/webhook/yookassa",
    tag = "Webhooks",
    summary = "Receive a payment notification",
    description = "Verifies the delivery signature, parses the payment event, and applies it to the matching payment record. Unhandled event types are acknowledged without processing. The payment gateway retries any non-200 response.",
    request_body(content = String, content_type = "application/json", description = "Raw notification JSON"),
    responses(
        (status = 200, description = "Notification processed or acknowledged", body = String),
        (status = 400, description = "Malformed payload", body = ErrorResponse),
        (status = 401, description = "Signature rejected in strict mode", body = ErrorResponse),
        (status = 404, description = "No payment record for this notification", body = ErrorResponse),
        (status = 500, description = "Reconciliation failed", body = ErrorResponse),
    )
)]
pub async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, GatewayError> {
    let verification = state
        .verifier
        .verify(signature_header(&headers), &body)
        .await;
    match (&verification, state.config.signature_mode) {
        (Verification::Valid { key_id }, _) => {
            tracing::debug!(key_id, "webhook signature verified");
        }
        (outcome, SignatureMode::Strict) => {
            return Err(GatewayError::SignatureRejected(describe_rejection(outcome)));
        }
        (outcome, SignatureMode::Lenient) => {
            tracing::warn!(
                reason = %describe_rejection(outcome),
                "processing webhook with unverified signature"
            );
        }
    }

    match parse_event(&body)? {
        ParsedWebhook::Ignored { event_type } => {
            tracing::info!(event_type, "webhook acknowledged without processing");
            Ok((StatusCode::OK, "OK"))
        }
        ParsedWebhook::Event(event) => {
            let outcome = state.reconciliation.apply(&event).await?;
            tracing::info!(
                gateway_payment_id = %event.gateway_payment_id,
                kind = event.kind.as_str(),
                ?outcome,
                "webhook processed"
            );
            Ok((StatusCode::OK, "OK"))
        }
    }
}

/// Introspection summary of the webhook service.
#[derive(Debug, Serialize, ToSchema)]
struct StatusResponse {
    service: String,
    status: String,
    endpoints: EndpointList,
    config: ConfigSummary,
    timestamp: String,
}

/// Absolute paths of the endpoints this service exposes.
#[derive(Debug, Serialize, ToSchema)]
struct EndpointList {
    webhook: String,
    health: String,
    status: String,
}

/// Configuration summary that never reveals credential values.
#[derive(Debug, Serialize, ToSchema)]
struct ConfigSummary {
    enabled: bool,
    shop_id_set: bool,
    secret_key_set: bool,
    signature_mode: String,
}

/// `GET /webhook/yookassa/status` — Webhook service introspection.
#[utoipa::path(
    get,
    path = "/webhook/yookassa/status",
    tag = "Webhooks",
    summary = "Webhook service status",
    description = "Reports the exposed endpoints and a configuration summary. Credentials are reported as set/unset flags only.",
    responses(
        (status = 200, description = "Service status", body = StatusResponse),
    )
)]
pub async fn webhook_status(State(state): State<AppState>) -> impl IntoResponse {
    let config = &state.config;
    Json(StatusResponse {
        service: SERVICE_NAME.to_string(),
        status: "running".to_string(),
        endpoints: EndpointList {
            webhook: "/webhook/yookassa".to_string(),
            health: "/health".to_string(),
            status: "/webhook/yookassa/status".to_string(),
        },
        config: ConfigSummary {
            enabled: config.enabled,
            shop_id_set: !config.shop_id.is_empty(),
            secret_key_set: !config.secret_key.is_empty(),
            signature_mode: config.signature_mode.as_str().to_string(),
        },
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Webhook routes mounted at their absolute paths.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/webhook/yookassa", post(receive_webhook))
        .route("/webhook/yookassa/status", get(webhook_status))
}

fn signature_header(headers: &HeaderMap) -> Option<&str> {
    SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name))
        .and_then(|value| value.to_str().ok())
}

fn describe_rejection(outcome: &Verification) -> String {
    match outcome {
        Verification::Valid { key_id } => format!("verified under key {key_id}"),
        Verification::Invalid { key_id } => {
            format!("signature does not match under key {key_id}")
        }
        Verification::Unverifiable { reason } => reason.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::sync::{Arc, OnceLock};
    use std::time::Duration;

    use axum::Router;
    use axum::body::Body;
    use axum::http::Request;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use rsa::RsaPrivateKey;
    use rsa::pkcs1v15::SigningKey;
    use rsa::pkcs8::{EncodePublicKey, LineEnding};
    use rsa::sha2::Sha256;
    use rsa::signature::{SignatureEncoding, Signer};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::config::GatewayConfig;
    use crate::domain::NewPayment;
    use crate::persistence::{MemoryStore, PaymentStore};
    use crate::service::{NoopNotifier, NoopReferralProcessor, ReconciliationService};
    use crate::webhook::{KeyStore, SignatureVerifier};

    fn test_config(mode: SignatureMode, key_base_url: &str) -> GatewayConfig {
        let Ok(listen_addr) = "127.0.0.1:0".parse() else {
            panic!("listen addr should parse");
        };
        GatewayConfig {
            listen_addr,
            database_url: String::new(),
            database_max_connections: 1,
            database_min_connections: 0,
            database_connect_timeout_secs: 1,
            enabled: true,
            shop_id: "shop-1".to_string(),
            secret_key: "sk-test".to_string(),
            api_base_url: "http://127.0.0.1:9".to_string(),
            key_base_url: key_base_url.to_string(),
            key_fetch_timeout_secs: 1,
            key_refresh_secs: 3600,
            gateway_timeout_secs: 1,
            request_timeout_secs: 5,
            signature_mode: mode,
            min_topup_amount: Decimal::ONE,
            max_topup_amount: Decimal::from(75_000u32),
        }
    }

    fn make_app(mode: SignatureMode, key_base_url: &str) -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let reconciliation = ReconciliationService::new(
            Arc::clone(&store) as Arc<dyn PaymentStore>,
            Arc::new(NoopNotifier),
            Arc::new(NoopReferralProcessor),
        );
        let key_store =
            match KeyStore::new(key_base_url, Duration::from_secs(2), Duration::from_secs(3600)) {
                Ok(key_store) => key_store,
                Err(e) => panic!("key store should build: {e}"),
            };
        let state = AppState {
            reconciliation: Arc::new(reconciliation),
            verifier: Arc::new(SignatureVerifier::new(Arc::new(key_store))),
            config: Arc::new(test_config(mode, key_base_url)),
        };
        (crate::api::build_router().with_state(state), store)
    }

    async fn seed_payment(store: &MemoryStore, gateway_payment_id: &str) {
        let Ok(_) = store
            .insert_payment(NewPayment {
                gateway_payment_id: gateway_payment_id.to_string(),
                user_id: 42,
                amount: dec!(250.00),
                currency: "RUB".to_string(),
                description: Some("Balance top-up".to_string()),
                confirmation_url: None,
                metadata: serde_json::json!({"user_id": "42"}),
            })
            .await
        else {
            panic!("seed insert should succeed");
        };
    }

    fn succeeded_payload(gateway_payment_id: &str) -> Vec<u8> {
        let body = serde_json::json!({
            "event": "payment.succeeded",
            "object": {
                "id": gateway_payment_id,
                "status": "succeeded",
                "amount": {"value": "250.00", "currency": "RUB"},
                "paid": true,
                "metadata": {"user_id": "42"}
            }
        });
        match serde_json::to_vec(&body) {
            Ok(raw) => raw,
            Err(e) => panic!("payload should serialize: {e}"),
        }
    }

    async fn post_webhook(
        app: Router,
        payload: Vec<u8>,
        signature: Option<&str>,
    ) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/webhook/yookassa")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header("Signature", signature);
        }
        let Ok(request) = builder.body(Body::from(payload)) else {
            panic!("request should build");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router should respond");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should read");
        };
        (status, bytes.to_vec())
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let Ok(request) = Request::builder().method("GET").uri(uri).body(Body::empty()) else {
            panic!("request should build");
        };
        let Ok(response) = app.oneshot(request).await else {
            panic!("router should respond");
        };
        let status = response.status();
        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("body should read");
        };
        let Ok(value) = serde_json::from_slice(&bytes) else {
            panic!("body should be JSON");
        };
        (status, value)
    }

    fn error_code(body: &[u8]) -> Option<u64> {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        value.get("error")?.get("code")?.as_u64()
    }

    #[tokio::test]
    async fn lenient_mode_processes_unsigned_webhooks() {
        let (app, store) = make_app(SignatureMode::Lenient, "http://127.0.0.1:9");
        seed_payment(&store, "pay_123").await;

        let (status, body) = post_webhook(app, succeeded_payload("pay_123"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
        assert_eq!(store.balance_of(42).await, dec!(250.00));
    }

    #[tokio::test]
    async fn replayed_delivery_returns_ok_without_a_second_credit() {
        let (app, store) = make_app(SignatureMode::Lenient, "http://127.0.0.1:9");
        seed_payment(&store, "pay_123").await;

        let (first, _) = post_webhook(app.clone(), succeeded_payload("pay_123"), None).await;
        let (second, _) = post_webhook(app, succeeded_payload("pay_123"), None).await;
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);
        assert_eq!(store.balance_of(42).await, dec!(250.00));
        assert_eq!(store.ledger_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_event_types_are_acknowledged() {
        let (app, store) = make_app(SignatureMode::Lenient, "http://127.0.0.1:9");
        let payload = serde_json::json!({
            "event": "refund.succeeded",
            "object": {"id": "ref_1"}
        });
        let Ok(raw) = serde_json::to_vec(&payload) else {
            panic!("payload should serialize");
        };

        let (status, body) = post_webhook(app, raw, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
        assert!(store.ledger_entries().await.is_empty());
    }

    #[tokio::test]
    async fn malformed_payloads_are_bad_requests() {
        let (app, _) = make_app(SignatureMode::Lenient, "http://127.0.0.1:9");
        let (status, body) = post_webhook(app, b"{not json".to_vec(), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&body), Some(1001));
    }

    #[tokio::test]
    async fn missing_object_is_a_bad_request() {
        let (app, _) = make_app(SignatureMode::Lenient, "http://127.0.0.1:9");
        let payload = serde_json::json!({"event": "payment.succeeded"});
        let Ok(raw) = serde_json::to_vec(&payload) else {
            panic!("payload should serialize");
        };
        let (status, _) = post_webhook(app, raw, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_payment_is_not_found() {
        let (app, _) = make_app(SignatureMode::Lenient, "http://127.0.0.1:9");
        let (status, body) = post_webhook(app, succeeded_payload("pay_unseen"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_code(&body), Some(2001));
    }

    #[tokio::test]
    async fn strict_mode_rejects_unsigned_webhooks() {
        let (app, store) = make_app(SignatureMode::Strict, "http://127.0.0.1:9");
        seed_payment(&store, "pay_123").await;

        let (status, body) = post_webhook(app, succeeded_payload("pay_123"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&body), Some(1101));
        assert_eq!(store.balance_of(42).await, Decimal::ZERO);
    }

    fn test_key() -> &'static RsaPrivateKey {
        static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
        KEY.get_or_init(|| match RsaPrivateKey::new(&mut rand::thread_rng(), 2048) {
            Ok(key) => key,
            Err(e) => panic!("test key generation failed: {e}"),
        })
    }

    #[tokio::test]
    async fn strict_mode_accepts_signed_webhooks() {
        let server = MockServer::start().await;
        let pem = match test_key().to_public_key().to_public_key_pem(LineEnding::LF) {
            Ok(pem) => pem,
            Err(e) => panic!("pem encoding failed: {e}"),
        };
        Mock::given(method("GET"))
            .and(path("/key-1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(pem))
            .mount(&server)
            .await;

        let (app, store) = make_app(SignatureMode::Strict, &server.uri());
        seed_payment(&store, "pay_123").await;

        let payload = succeeded_payload("pay_123");
        let signing_key = SigningKey::<Sha256>::new(test_key().clone());
        let signature: rsa::pkcs1v15::Signature = signing_key.sign(&payload);
        let header = format!("v1 key-1 rsa-sha256 {}", BASE64.encode(signature.to_bytes()));

        let (status, body) = post_webhook(app, payload, Some(&header)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
        assert_eq!(store.balance_of(42).await, dec!(250.00));
    }

    #[tokio::test]
    async fn status_endpoint_reports_config_without_credentials() {
        let (app, _) = make_app(SignatureMode::Strict, "http://127.0.0.1:9");
        let (status, value) = get_json(app, "/webhook/yookassa/status").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            value.get("service").and_then(|v| v.as_str()),
            Some("yookassa_webhook")
        );
        let config = value.get("config").cloned().unwrap_or_default();
        assert_eq!(config.get("enabled").and_then(|v| v.as_bool()), Some(true));
        assert_eq!(
            config.get("shop_id_set").and_then(|v| v.as_bool()),
            Some(true)
        );
        assert_eq!(
            config.get("signature_mode").and_then(|v| v.as_str()),
            Some("strict")
        );
        assert!(config.get("shop_id").is_none());
        assert!(config.get("secret_key").is_none());
    }

    #[tokio::test]
    async fn health_endpoint_reports_running() {
        let (app, _) = make_app(SignatureMode::Lenient, "http://127.0.0.1:9");
        let (status, value) = get_json(app, "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            value.get("status").and_then(|v| v.as_str()),
            Some("healthy")
        );
        assert_eq!(
            value.get("service").and_then(|v| v.as_str()),
            Some("yookassa_webhook")
        );
        assert_eq!(value.get("running").and_then(|v| v.as_bool()), Some(true));
    }
}
