//! Payment record entity and its status state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PaymentId;

/// Lifecycle status of a payment, mirroring the gateway's status strings.
///
/// Transitions are monotonic and one-directional:
///
/// ```text
/// pending ──► waiting_for_capture ──► succeeded
///    │                │
///    └──► canceled ◄──┘
/// ```
///
/// `failed` is reported by the gateway's query API but is never produced
/// by a webhook event, so no transition leads to it here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Payment created, awaiting user action.
    Pending,
    /// Funds authorized, awaiting capture.
    WaitingForCapture,
    /// Funds captured; the balance credit has been applied.
    Succeeded,
    /// Payment canceled by the user or the gateway.
    Canceled,
    /// Payment failed on the gateway side.
    Failed,
}

impl PaymentStatus {
    /// Returns the status as the gateway's lowercase wire string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::WaitingForCapture => "waiting_for_capture",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
        }
    }

    /// Returns `true` for statuses that no webhook event may leave.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Canceled | Self::Failed)
    }

    /// Returns `true` when the state machine permits moving to `next`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (
                Self::Pending,
                Self::WaitingForCapture | Self::Succeeded | Self::Canceled
            ) | (Self::WaitingForCapture, Self::Succeeded | Self::Canceled)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "waiting_for_capture" => Ok(Self::WaitingForCapture),
            "succeeded" => Ok(Self::Succeeded),
            "canceled" => Ok(Self::Canceled),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown payment status: {other}")),
        }
    }
}

/// The ledger entity for one gateway-initiated payment.
///
/// Created by the top-up flow when a payment is registered with the
/// gateway, mutated only by the reconciliation engine in response to
/// verified webhook events, and never deleted (retained as an audit
/// trail).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Internal identifier (immutable after creation).
    pub id: PaymentId,

    /// Opaque gateway-issued payment id; unique across all records.
    pub gateway_payment_id: String,

    /// Owner of the balance this payment credits.
    pub user_id: i64,

    /// Payment amount in gateway currency units.
    pub amount: Decimal,

    /// ISO currency code (e.g. `"RUB"`).
    pub currency: String,

    /// Current lifecycle status.
    pub status: PaymentStatus,

    /// Human-readable purpose, echoed to the gateway at creation.
    pub description: Option<String>,

    /// Redirect URL the user completes the payment at; set at creation.
    pub confirmation_url: Option<String>,

    /// Opaque map echoed from the creation request; correlates user and
    /// payment purpose.
    pub metadata: serde_json::Value,

    /// Creation timestamp (immutable after creation).
    pub created_at: DateTime<Utc>,

    /// Set when the payment reaches `succeeded`.
    pub completed_at: Option<DateTime<Utc>>,

    /// Set when the payment reaches `canceled`.
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Input for inserting a fresh payment record.
#[derive(Debug, Clone)]
pub struct NewPayment {
    /// Gateway-issued payment id from the create-payment response.
    pub gateway_payment_id: String,
    /// Owner of the balance this payment will credit.
    pub user_id: i64,
    /// Payment amount in gateway currency units.
    pub amount: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Human-readable purpose.
    pub description: Option<String>,
    /// Redirect URL from the create-payment response.
    pub confirmation_url: Option<String>,
    /// Opaque correlation map.
    pub metadata: serde_json::Value,
}

impl PaymentRecord {
    /// Creates a new `pending` record from creation-flow input.
    #[must_use]
    pub fn new(new: NewPayment) -> Self {
        Self {
            id: PaymentId::new(),
            gateway_payment_id: new.gateway_payment_id,
            user_id: new.user_id,
            amount: new.amount,
            currency: new.currency,
            status: PaymentStatus::Pending,
            description: new.description,
            confirmation_url: new.confirmation_url,
            metadata: new.metadata,
            created_at: Utc::now(),
            completed_at: None,
            cancelled_at: None,
        }
    }
}
