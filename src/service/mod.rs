//! Service layer: reconciliation and top-up orchestration.
//!
//! [`ReconciliationService`] applies verified webhook events to payment
//! records; [`TopupService`] registers new payments with the gateway.
//! Side effects that follow a successful credit go through the
//! [`Notifier`] and [`ReferralProcessor`] seams so the embedding
//! application can plug in its own delivery (the upstream deployment
//! sends Telegram messages); the gateway itself ships no-op
//! implementations.

use rust_decimal::Decimal;

use crate::error::GatewayError;

pub mod reconciliation;
pub mod topup;

pub use reconciliation::{ApplyOutcome, ReconciliationService};
pub use topup::{TopupPayment, TopupService};

/// Delivers a human-readable message to a user after reconciliation.
///
/// Failures are logged and swallowed by the caller; a lost notification
/// must never undo a committed credit.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync + std::fmt::Debug {
    /// Sends `text` to the user.
    ///
    /// # Errors
    ///
    /// Implementations return an error when delivery fails; callers
    /// treat that as non-fatal.
    async fn notify(&self, user_id: i64, text: &str) -> Result<(), GatewayError>;
}

/// Applies referral rewards after a successful top-up.
#[async_trait::async_trait]
pub trait ReferralProcessor: Send + Sync + std::fmt::Debug {
    /// Processes the reward earned by whoever referred `user_id`.
    ///
    /// # Errors
    ///
    /// Implementations return an error when reward processing fails;
    /// callers treat that as non-fatal.
    async fn process(
        &self,
        user_id: i64,
        amount: Decimal,
        gateway_payment_id: &str,
    ) -> Result<(), GatewayError>;
}

/// [`Notifier`] that drops every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

#[async_trait::async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, user_id: i64, text: &str) -> Result<(), GatewayError> {
        tracing::debug!(user_id, text, "notification dropped (noop notifier)");
        Ok(())
    }
}

/// [`ReferralProcessor`] that awards nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopReferralProcessor;

#[async_trait::async_trait]
impl ReferralProcessor for NoopReferralProcessor {
    async fn process(
        &self,
        user_id: i64,
        amount: Decimal,
        gateway_payment_id: &str,
    ) -> Result<(), GatewayError> {
        tracing::debug!(
            user_id,
            %amount,
            gateway_payment_id,
            "referral processing skipped (noop processor)"
        );
        Ok(())
    }
}
