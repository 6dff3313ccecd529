//! Canonical webhook event, decoupled from the gateway wire format.
//!
//! A [`PaymentEvent`] is produced once per inbound webhook by the parser
//! and consumed once by the reconciliation engine. It is never persisted
//! as-is; only its effect on the payment record survives.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Normalized event kind.
///
/// `Unknown` covers every wire event type this gateway does not act on
/// (refunds, deals, payouts); such notifications are acknowledged and
/// dropped before reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Funds captured; triggers the balance credit.
    Succeeded,
    /// Payment canceled; no balance mutation.
    Canceled,
    /// Funds authorized, awaiting capture.
    WaitingForCapture,
    /// Any other wire event type.
    Unknown,
}

impl EventKind {
    /// Maps a gateway wire event type onto a canonical kind.
    #[must_use]
    pub fn from_wire(event_type: &str) -> Self {
        match event_type {
            "payment.succeeded" => Self::Succeeded,
            "payment.canceled" => Self::Canceled,
            "payment.waiting_for_capture" => Self::WaitingForCapture,
            _ => Self::Unknown,
        }
    }

    /// Returns the kind as a static string slice for logging.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
            Self::WaitingForCapture => "waiting_for_capture",
            Self::Unknown => "unknown",
        }
    }

    /// Whether an event of this kind must carry an amount to be
    /// reconcilable. Cancellations may omit it.
    #[must_use]
    pub const fn requires_amount(&self) -> bool {
        matches!(self, Self::Succeeded | Self::WaitingForCapture)
    }
}

/// Canonical, ephemeral representation of one webhook delivery.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentEvent {
    /// Normalized event kind.
    pub kind: EventKind,

    /// Opaque gateway-issued payment id this event refers to.
    pub gateway_payment_id: String,

    /// Amount reported by the gateway; absent on cancellations.
    pub amount: Option<Decimal>,

    /// ISO currency code accompanying `amount`.
    pub currency: Option<String>,

    /// Opaque correlation map passed through verbatim.
    pub metadata: serde_json::Value,

    /// Capture timestamp reported by the gateway, when present and
    /// well-formed.
    pub captured_at: Option<DateTime<Utc>>,
}
