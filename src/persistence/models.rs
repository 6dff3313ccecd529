//! Database row models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::{PaymentId, PaymentRecord, PaymentStatus};
use crate::error::GatewayError;

/// A payment row from the `payments` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PaymentRow {
    /// Internal payment id.
    pub id: Uuid,
    /// Gateway-issued payment id.
    pub gateway_payment_id: String,
    /// Owning user (Telegram id in the upstream deployment).
    pub user_id: i64,
    /// Amount to credit on success.
    pub amount: Decimal,
    /// ISO currency code.
    pub currency: String,
    /// Lifecycle status as stored.
    pub status: String,
    /// Human-readable purpose.
    pub description: Option<String>,
    /// Confirmation URL handed to the user at creation.
    pub confirmation_url: Option<String>,
    /// Opaque correlation map.
    pub metadata: serde_json::Value,
    /// Row creation timestamp.
    pub created_at: DateTime<Utc>,
    /// When the payment succeeded.
    pub completed_at: Option<DateTime<Utc>>,
    /// When the payment was canceled.
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = GatewayError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let status: PaymentStatus = row
            .status
            .parse()
            .map_err(GatewayError::PersistenceError)?;
        Ok(Self {
            id: PaymentId::from_uuid(row.id),
            gateway_payment_id: row.gateway_payment_id,
            user_id: row.user_id,
            amount: row.amount,
            currency: row.currency,
            status,
            description: row.description,
            confirmation_url: row.confirmation_url,
            metadata: row.metadata,
            created_at: row.created_at,
            completed_at: row.completed_at,
            cancelled_at: row.cancelled_at,
        })
    }
}

/// One credit applied to a user balance.
///
/// Written exactly once per successful payment, in the same storage
/// operation that advances the payment to `succeeded`.
#[derive(Debug, Clone)]
pub struct LedgerEntry {
    /// Internal id of the payment that produced this credit.
    pub payment_id: PaymentId,
    /// Credited user.
    pub user_id: i64,
    /// Credited amount.
    pub amount: Decimal,
    /// Entry discriminator, e.g. `"topup_credit"`.
    pub entry_type: String,
    /// When the credit was applied.
    pub created_at: DateTime<Utc>,
}
