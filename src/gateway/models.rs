//! Wire schema for the payment API.
//!
//! One explicit [`PaymentObject`] schema covers every place the gateway
//! hands us a payment: create-payment responses, status queries, and the
//! `object` field of inbound webhooks. Decoding failures surface as typed
//! errors instead of defaulted fields.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::PaymentStatus;
use crate::error::GatewayError;

/// Monetary amount as the gateway transmits it: decimal string plus ISO
/// currency code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountDto {
    /// Decimal amount with two fractional digits, e.g. `"100.00"`.
    pub value: String,
    /// ISO currency code, e.g. `"RUB"`.
    pub currency: String,
}

impl AmountDto {
    /// Parses the decimal string value.
    ///
    /// # Errors
    ///
    /// Returns the underlying decimal parse error for malformed values.
    pub fn parse_value(&self) -> Result<Decimal, rust_decimal::Error> {
        self.value.trim().parse()
    }
}

/// Confirmation block of a create-payment request.
#[derive(Debug, Clone, Serialize)]
pub struct ConfirmationRequest {
    /// Confirmation flow discriminator; this gateway uses `"redirect"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// URL the user returns to after completing the payment.
    pub return_url: String,
}

/// Confirmation block of a payment object response.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfirmationDto {
    /// Confirmation flow discriminator.
    #[serde(rename = "type")]
    pub kind: String,
    /// URL the user completes the payment at.
    #[serde(default)]
    pub confirmation_url: Option<String>,
}

/// Request body for `POST /payments`.
#[derive(Debug, Clone, Serialize)]
pub struct CreatePaymentRequest {
    /// Amount to charge.
    pub amount: AmountDto,
    /// Human-readable purpose shown to the user.
    pub description: String,
    /// Redirect confirmation parameters.
    pub confirmation: ConfirmationRequest,
    /// Capture immediately instead of a two-step authorize/capture flow.
    pub capture: bool,
    /// Opaque correlation map echoed back in webhooks.
    pub metadata: serde_json::Value,
}

/// A payment object as the gateway reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentObject {
    /// Gateway-issued payment id.
    pub id: String,
    /// Lifecycle status.
    pub status: PaymentStatus,
    /// Requested amount; present on every payment-scoped response.
    #[serde(default)]
    pub amount: Option<AmountDto>,
    /// Amount actually captured, when the gateway reports it.
    #[serde(default)]
    pub amount_paid: Option<AmountDto>,
    /// Whether the payment has been paid.
    #[serde(default)]
    pub paid: bool,
    /// Redirect confirmation details (create-payment responses only).
    #[serde(default)]
    pub confirmation: Option<ConfirmationDto>,
    /// Human-readable purpose.
    #[serde(default)]
    pub description: Option<String>,
    /// Opaque correlation map.
    #[serde(default = "empty_metadata")]
    pub metadata: serde_json::Value,
    /// Creation timestamp reported by the gateway.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    /// Capture timestamp as an unparsed wire string; see
    /// [`parse_timestamp`].
    #[serde(default)]
    pub captured_at: Option<String>,
}

impl PaymentObject {
    /// Returns the confirmation URL when the gateway provided one.
    #[must_use]
    pub fn confirmation_url(&self) -> Option<&str> {
        self.confirmation
            .as_ref()
            .and_then(|c| c.confirmation_url.as_deref())
    }
}

/// Flattened status-query result handed to status-polling callers.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusView {
    /// Gateway-issued payment id.
    pub gateway_payment_id: String,
    /// Lifecycle status.
    pub status: PaymentStatus,
    /// Requested amount.
    pub amount: Option<Decimal>,
    /// ISO currency code of `amount`.
    pub currency: Option<String>,
    /// Amount actually captured.
    pub amount_paid: Option<Decimal>,
    /// Whether the payment has been paid.
    pub paid: bool,
    /// Capture timestamp, when reported and well-formed.
    pub captured_at: Option<DateTime<Utc>>,
    /// Human-readable purpose.
    pub description: Option<String>,
    /// Opaque correlation map.
    pub metadata: serde_json::Value,
}

impl TryFrom<PaymentObject> for PaymentStatusView {
    type Error = GatewayError;

    fn try_from(object: PaymentObject) -> Result<Self, Self::Error> {
        let amount = object
            .amount
            .as_ref()
            .map(AmountDto::parse_value)
            .transpose()
            .map_err(|e| GatewayError::GatewayResponse(format!("malformed amount: {e}")))?;
        let amount_paid = object
            .amount_paid
            .as_ref()
            .map(AmountDto::parse_value)
            .transpose()
            .map_err(|e| GatewayError::GatewayResponse(format!("malformed amount_paid: {e}")))?;
        let captured_at = object.captured_at.as_deref().and_then(parse_timestamp);
        Ok(Self {
            gateway_payment_id: object.id,
            status: object.status,
            amount,
            currency: object.amount.map(|a| a.currency),
            amount_paid,
            paid: object.paid,
            captured_at,
            description: object.description,
            metadata: object.metadata,
        })
    }
}

/// Parses an RFC 3339 timestamp leniently: malformed input yields `None`
/// rather than an error, since the gateway's capture timestamps are
/// informational only.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn empty_metadata() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}
