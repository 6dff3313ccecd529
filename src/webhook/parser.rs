//! Inbound webhook payload parsing.
//!
//! Parsing happens in two stages. The envelope is decoded first so the
//! event kind is known before any payment fields are touched; unhandled
//! event kinds short-circuit to [`ParsedWebhook::Ignored`] without ever
//! decoding the payment object. Handled kinds then decode `object`
//! through the same [`PaymentObject`] schema the REST client uses.

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::domain::{EventKind, PaymentEvent};
use crate::error::GatewayError;
use crate::gateway::models::{AmountDto, PaymentObject, parse_timestamp};

/// Result of parsing one webhook body.
#[derive(Debug, Clone)]
pub enum ParsedWebhook {
    /// A payment event this gateway reconciles.
    Event(PaymentEvent),
    /// A well-formed notification whose event type is not handled; it is
    /// acknowledged and dropped.
    Ignored {
        /// Wire event type as received.
        event_type: String,
    },
}

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(default)]
    event: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    object: Option<serde_json::Value>,
}

/// Parses a raw webhook body into a canonical event.
///
/// The event kind is taken from the `event` field, falling back to
/// `type`. Succeeded and waiting-for-capture events must carry a
/// well-formed amount; cancellations may omit it. A malformed capture
/// timestamp is dropped rather than rejected.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidPayload`] when the body is not JSON,
/// the `object` field is missing, or a handled event's payment object
/// fails to decode.
pub fn parse_event(body: &[u8]) -> Result<ParsedWebhook, GatewayError> {
    let envelope: WebhookEnvelope = serde_json::from_slice(body)
        .map_err(|e| GatewayError::InvalidPayload(format!("invalid JSON: {e}")))?;

    let Some(object) = envelope.object else {
        return Err(GatewayError::InvalidPayload(
            "missing object field".to_string(),
        ));
    };

    let event_type = envelope
        .event
        .or(envelope.kind)
        .unwrap_or_else(|| "unknown".to_string());
    let kind = EventKind::from_wire(&event_type);
    if kind == EventKind::Unknown {
        tracing::info!(event_type, "ignoring unhandled webhook event type");
        return Ok(ParsedWebhook::Ignored { event_type });
    }

    let object: PaymentObject = serde_json::from_value(object)
        .map_err(|e| GatewayError::InvalidPayload(format!("malformed payment object: {e}")))?;

    let amount = parse_amount(kind, object.amount.as_ref())?;
    let currency = object.amount.map(|a| a.currency);
    let captured_at = object.captured_at.as_deref().and_then(parse_timestamp);

    Ok(ParsedWebhook::Event(PaymentEvent {
        kind,
        gateway_payment_id: object.id,
        amount,
        currency,
        metadata: object.metadata,
        captured_at,
    }))
}

fn parse_amount(
    kind: EventKind,
    amount: Option<&AmountDto>,
) -> Result<Option<Decimal>, GatewayError> {
    match amount {
        Some(dto) => {
            let value = dto.parse_value().map_err(|e| {
                GatewayError::InvalidPayload(format!(
                    "malformed amount value {:?}: {e}",
                    dto.value
                ))
            })?;
            Ok(Some(value))
        }
        None if kind.requires_amount() => Err(GatewayError::InvalidPayload(format!(
            "missing amount for {} event",
            kind.as_str()
        ))),
        None => Ok(None),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn parse_json(body: serde_json::Value) -> Result<ParsedWebhook, GatewayError> {
        let Ok(raw) = serde_json::to_vec(&body) else {
            panic!("test body should serialize");
        };
        parse_event(&raw)
    }

    fn expect_event(body: serde_json::Value) -> PaymentEvent {
        match parse_json(body) {
            Ok(ParsedWebhook::Event(event)) => event,
            other => panic!("expected a payment event, got {other:?}"),
        }
    }

    #[test]
    fn succeeded_webhook_parses_to_canonical_event() {
        let event = expect_event(serde_json::json!({
            "event": "payment.succeeded",
            "object": {
                "id": "pay_123",
                "status": "succeeded",
                "amount": {"value": "250.00", "currency": "RUB"},
                "paid": true,
                "captured_at": "2024-05-01T10:30:00Z",
                "metadata": {"user_id": "42"}
            }
        }));
        assert_eq!(event.kind, EventKind::Succeeded);
        assert_eq!(event.gateway_payment_id, "pay_123");
        assert_eq!(event.amount, Some(dec!(250.00)));
        assert_eq!(event.currency.as_deref(), Some("RUB"));
        assert!(event.captured_at.is_some());
        assert_eq!(
            event.metadata.get("user_id").and_then(|v| v.as_str()),
            Some("42")
        );
    }

    #[test]
    fn kind_falls_back_to_type_field() {
        let event = expect_event(serde_json::json!({
            "type": "payment.canceled",
            "object": {"id": "pay_123", "status": "canceled"}
        }));
        assert_eq!(event.kind, EventKind::Canceled);
        assert_eq!(event.amount, None);
    }

    #[test]
    fn unknown_event_is_ignored_without_decoding_object() {
        let result = parse_json(serde_json::json!({
            "event": "refund.succeeded",
            "object": {"nothing": "a payment object would need"}
        }));
        match result {
            Ok(ParsedWebhook::Ignored { event_type }) => {
                assert_eq!(event_type, "refund.succeeded");
            }
            other => panic!("expected ignored webhook, got {other:?}"),
        }
    }

    #[test]
    fn invalid_json_is_rejected() {
        let result = parse_event(b"{not json");
        assert!(matches!(result, Err(GatewayError::InvalidPayload(_))));
    }

    #[test]
    fn missing_object_is_rejected() {
        let result = parse_json(serde_json::json!({"event": "payment.succeeded"}));
        assert!(matches!(result, Err(GatewayError::InvalidPayload(_))));
    }

    #[test]
    fn missing_object_is_rejected_even_for_unknown_events() {
        let result = parse_json(serde_json::json!({"event": "refund.succeeded"}));
        assert!(matches!(result, Err(GatewayError::InvalidPayload(_))));
    }

    #[test]
    fn succeeded_without_amount_is_rejected() {
        let result = parse_json(serde_json::json!({
            "event": "payment.succeeded",
            "object": {"id": "pay_123", "status": "succeeded"}
        }));
        assert!(matches!(result, Err(GatewayError::InvalidPayload(_))));
    }

    #[test]
    fn waiting_for_capture_without_amount_is_rejected() {
        let result = parse_json(serde_json::json!({
            "event": "payment.waiting_for_capture",
            "object": {"id": "pay_123", "status": "waiting_for_capture"}
        }));
        assert!(matches!(result, Err(GatewayError::InvalidPayload(_))));
    }

    #[test]
    fn malformed_amount_is_rejected() {
        let result = parse_json(serde_json::json!({
            "event": "payment.succeeded",
            "object": {
                "id": "pay_123",
                "status": "succeeded",
                "amount": {"value": "250,00", "currency": "RUB"}
            }
        }));
        assert!(matches!(result, Err(GatewayError::InvalidPayload(_))));
    }

    #[test]
    fn missing_payment_id_is_rejected() {
        let result = parse_json(serde_json::json!({
            "event": "payment.succeeded",
            "object": {
                "status": "succeeded",
                "amount": {"value": "250.00", "currency": "RUB"}
            }
        }));
        assert!(matches!(result, Err(GatewayError::InvalidPayload(_))));
    }

    #[test]
    fn malformed_capture_timestamp_is_dropped() {
        let event = expect_event(serde_json::json!({
            "event": "payment.succeeded",
            "object": {
                "id": "pay_123",
                "status": "succeeded",
                "amount": {"value": "100.00", "currency": "RUB"},
                "captured_at": "not a timestamp"
            }
        }));
        assert_eq!(event.captured_at, None);
    }

    #[test]
    fn empty_metadata_defaults_to_object() {
        let event = expect_event(serde_json::json!({
            "event": "payment.canceled",
            "object": {"id": "pay_123", "status": "canceled"}
        }));
        assert!(event.metadata.is_object());
    }
}
