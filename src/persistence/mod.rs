//! Persistence layer: payment records, user balances, and the credit
//! ledger.
//!
//! [`PaymentStore`] is the seam between the reconciliation engine and
//! storage. The conditional transition methods return whether the row
//! actually moved, so callers can distinguish a fresh transition from a
//! replayed webhook without a read-modify-write race. The concrete
//! implementations are [`postgres::PostgresStore`] for production and
//! [`memory::MemoryStore`] for tests and local development.

use chrono::{DateTime, Utc};

use crate::domain::{NewPayment, PaymentRecord};
use crate::error::GatewayError;

pub mod memory;
pub mod models;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Storage operations the reconciliation engine and top-up flow need.
///
/// All state transitions are conditional: they succeed only when the
/// record is currently in a status the transition is allowed from, and
/// report the outcome as a boolean. That makes every webhook replay a
/// no-op at the storage layer regardless of delivery interleaving.
#[async_trait::async_trait]
pub trait PaymentStore: Send + Sync + std::fmt::Debug {
    /// Inserts a freshly registered payment in `pending` status.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure,
    /// including duplicate gateway payment ids.
    async fn insert_payment(&self, new: NewPayment) -> Result<PaymentRecord, GatewayError>;

    /// Looks up a payment by the gateway-issued payment id.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn find_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<PaymentRecord>, GatewayError>;

    /// Atomically marks the payment succeeded and credits its amount to
    /// the owning user, recording a ledger entry.
    ///
    /// Returns `true` only when this call performed the transition; a
    /// payment already succeeded (or missing) yields `false` and no
    /// balance change.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn complete_and_credit(
        &self,
        gateway_payment_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, GatewayError>;

    /// Marks the payment canceled when it is still in a cancellable
    /// status. Returns whether the row moved.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn mark_canceled(
        &self,
        gateway_payment_id: &str,
        cancelled_at: DateTime<Utc>,
    ) -> Result<bool, GatewayError>;

    /// Marks the payment as waiting for capture when it is still
    /// pending. Returns whether the row moved.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PersistenceError`] on storage failure.
    async fn mark_waiting_for_capture(
        &self,
        gateway_payment_id: &str,
    ) -> Result<bool, GatewayError>;
}
