//! HTTP client for the payment gateway REST API.
//!
//! Wraps reqwest with basic-auth shop credentials and the idempotence
//! header the gateway requires on mutating calls.

use std::time::Duration;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::gateway::models::{
    AmountDto, ConfirmationRequest, CreatePaymentRequest, PaymentObject, PaymentStatusView,
};

/// Client for the payment gateway's `/payments` endpoints.
///
/// Cheap to clone; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct PaymentGatewayClient {
    http: reqwest::Client,
    base_url: String,
    shop_id: String,
    secret_key: String,
}

impl PaymentGatewayClient {
    /// Creates a client for the gateway at `base_url` using shop
    /// credentials for basic auth.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::GatewayTransport`] if the HTTP client
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        shop_id: &str,
        secret_key: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            shop_id: shop_id.to_string(),
            secret_key: secret_key.to_string(),
        })
    }

    /// Creates a payment with immediate capture and a redirect
    /// confirmation flow.
    ///
    /// The returned object carries the gateway payment id and the
    /// confirmation URL to send the user to.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] for non-positive amounts,
    /// [`GatewayError::GatewayApi`] when the gateway rejects the request,
    /// and [`GatewayError::GatewayResponse`] when the response body does
    /// not match the payment schema.
    pub async fn create_payment(
        &self,
        amount: Decimal,
        currency: &str,
        description: &str,
        metadata: serde_json::Value,
        return_url: &str,
    ) -> Result<PaymentObject, GatewayError> {
        if amount <= Decimal::ZERO {
            return Err(GatewayError::InvalidRequest(format!(
                "payment amount must be positive, got {amount}"
            )));
        }

        let request = CreatePaymentRequest {
            amount: AmountDto {
                value: format!("{amount:.2}"),
                currency: currency.to_string(),
            },
            description: description.to_string(),
            confirmation: ConfirmationRequest {
                kind: "redirect".to_string(),
                return_url: return_url.to_string(),
            },
            capture: true,
            metadata,
        };

        let response = self
            .http
            .post(format!("{}/payments", self.base_url))
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .header("Idempotence-Key", Uuid::new_v4().to_string())
            .json(&request)
            .send()
            .await?;
        let object = Self::decode(response).await?;
        tracing::info!(
            gateway_payment_id = %object.id,
            %amount,
            currency,
            "payment created"
        );
        Ok(object)
    }

    /// Fetches the current state of a payment.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::GatewayApi`] when the gateway rejects the
    /// request and [`GatewayError::GatewayResponse`] when the response
    /// body does not match the payment schema.
    pub async fn get_payment_status(
        &self,
        gateway_payment_id: &str,
    ) -> Result<PaymentStatusView, GatewayError> {
        let response = self
            .http
            .get(format!("{}/payments/{gateway_payment_id}", self.base_url))
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .send()
            .await?;
        let object = Self::decode(response).await?;
        PaymentStatusView::try_from(object)
    }

    /// Cancels an authorized payment, reporting success as a flag.
    ///
    /// Cancellation is best-effort: failures are logged and reported as
    /// `false` rather than propagated.
    pub async fn cancel_payment(&self, gateway_payment_id: &str) -> bool {
        match self.try_cancel(gateway_payment_id).await {
            Ok(()) => {
                tracing::info!(gateway_payment_id, "payment cancelled");
                true
            }
            Err(error) => {
                tracing::warn!(gateway_payment_id, %error, "payment cancellation failed");
                false
            }
        }
    }

    async fn try_cancel(&self, gateway_payment_id: &str) -> Result<(), GatewayError> {
        let response = self
            .http
            .post(format!(
                "{}/payments/{gateway_payment_id}/cancel",
                self.base_url
            ))
            .basic_auth(&self.shop_id, Some(&self.secret_key))
            .header("Idempotence-Key", Uuid::new_v4().to_string())
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::decode(response).await?;
        Ok(())
    }

    async fn decode(response: reqwest::Response) -> Result<PaymentObject, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::GatewayApi {
                status: status.as_u16(),
                message,
            });
        }
        response
            .json::<PaymentObject>()
            .await
            .map_err(|e| GatewayError::GatewayResponse(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use rust_decimal_macros::dec;
    use wiremock::matchers::{body_partial_json, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::domain::PaymentStatus;

    fn make_client(base_url: &str) -> PaymentGatewayClient {
        let Ok(client) =
            PaymentGatewayClient::new(base_url, "shop-1", "sk-test", Duration::from_secs(2))
        else {
            panic!("client should build");
        };
        client
    }

    #[tokio::test]
    async fn create_payment_sends_capture_and_decodes_object() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payments"))
            .and(header_exists("authorization"))
            .and(header_exists("idempotence-key"))
            .and(body_partial_json(serde_json::json!({
                "capture": true,
                "amount": {"value": "250.00", "currency": "RUB"},
                "confirmation": {"type": "redirect"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pay_123",
                "status": "pending",
                "amount": {"value": "250.00", "currency": "RUB"},
                "confirmation": {
                    "type": "redirect",
                    "confirmation_url": "https://gateway.example/confirm/pay_123"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        let Ok(object) = client
            .create_payment(
                dec!(250.00),
                "RUB",
                "Balance top-up",
                serde_json::json!({"user_id": "42"}),
                "https://t.me/example_bot",
            )
            .await
        else {
            panic!("create_payment should succeed");
        };
        assert_eq!(object.id, "pay_123");
        assert_eq!(object.status, PaymentStatus::Pending);
        assert_eq!(
            object.confirmation_url(),
            Some("https://gateway.example/confirm/pay_123")
        );
    }

    #[tokio::test]
    async fn create_payment_rejects_non_positive_amount() {
        let client = make_client("http://127.0.0.1:9");
        let result = client
            .create_payment(
                Decimal::ZERO,
                "RUB",
                "Balance top-up",
                serde_json::json!({}),
                "https://t.me/example_bot",
            )
            .await;
        assert!(matches!(result, Err(GatewayError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn gateway_rejection_maps_to_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payments/pay_404"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        let result = client.get_payment_status("pay_404").await;
        assert!(matches!(
            result,
            Err(GatewayError::GatewayApi { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn malformed_body_maps_to_response_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payments/pay_123"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        let result = client.get_payment_status("pay_123").await;
        assert!(matches!(result, Err(GatewayError::GatewayResponse(_))));
    }

    #[tokio::test]
    async fn get_payment_status_flattens_view() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/payments/pay_123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pay_123",
                "status": "succeeded",
                "amount": {"value": "250.00", "currency": "RUB"},
                "amount_paid": {"value": "250.00", "currency": "RUB"},
                "paid": true,
                "captured_at": "2024-05-01T10:30:00Z",
                "metadata": {"user_id": "42"}
            })))
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        let Ok(view) = client.get_payment_status("pay_123").await else {
            panic!("status query should succeed");
        };
        assert_eq!(view.status, PaymentStatus::Succeeded);
        assert_eq!(view.amount, Some(dec!(250.00)));
        assert!(view.paid);
        assert_eq!(
            view.metadata.get("user_id").and_then(|v| v.as_str()),
            Some("42")
        );
    }

    #[tokio::test]
    async fn cancel_payment_reports_outcome_as_flag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payments/pay_123/cancel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "pay_123",
                "status": "canceled"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/payments/pay_500/cancel"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = make_client(&server.uri());
        assert!(client.cancel_payment("pay_123").await);
        assert!(!client.cancel_payment("pay_500").await);
    }
}
