//! Reconciliation engine: applies verified webhook events to payment
//! records.
//!
//! Correctness rests on two layers. A per-payment async mutex serializes
//! concurrent deliveries for the same gateway payment id inside this
//! process, and every storage transition is conditional on the current
//! status, so replays and races resolve to no-ops rather than double
//! credits. Post-credit side effects (user notification, referral
//! reward) are best-effort: once the credit has committed, their
//! failures are logged and never unwound.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{EventKind, PaymentEvent, PaymentRecord, PaymentStatus};
use crate::error::GatewayError;
use crate::persistence::PaymentStore;
use crate::service::{Notifier, ReferralProcessor};

/// What applying one webhook event did to the payment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The record transitioned to the given status.
    Applied {
        /// Status after the transition.
        status: PaymentStatus,
    },
    /// The event was acknowledged without changing anything, e.g. a
    /// replayed delivery.
    NoOp,
}

/// Applies payment events to records, exactly once per transition.
#[derive(Debug)]
pub struct ReconciliationService {
    store: Arc<dyn PaymentStore>,
    notifier: Arc<dyn Notifier>,
    referrals: Arc<dyn ReferralProcessor>,
    in_flight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ReconciliationService {
    /// Creates an engine over the given store and side-effect
    /// collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn PaymentStore>,
        notifier: Arc<dyn Notifier>,
        referrals: Arc<dyn ReferralProcessor>,
    ) -> Self {
        Self {
            store,
            notifier,
            referrals,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Applies one verified event to its payment record.
    ///
    /// Deliveries for the same gateway payment id are serialized;
    /// everything a replayed or out-of-order delivery would redo
    /// resolves to [`ApplyOutcome::NoOp`].
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::PaymentNotFound`] when no record exists
    /// for the event's gateway payment id, and
    /// [`GatewayError::PersistenceError`] on storage failure.
    pub async fn apply(&self, event: &PaymentEvent) -> Result<ApplyOutcome, GatewayError> {
        let guard = self.acquire_payment_lock(&event.gateway_payment_id).await;
        let outcome = self.apply_locked(event).await;
        self.release_payment_lock(&event.gateway_payment_id, guard)
            .await;
        outcome
    }

    async fn apply_locked(&self, event: &PaymentEvent) -> Result<ApplyOutcome, GatewayError> {
        let Some(record) = self
            .store
            .find_by_gateway_id(&event.gateway_payment_id)
            .await?
        else {
            tracing::warn!(
                gateway_payment_id = %event.gateway_payment_id,
                kind = event.kind.as_str(),
                "webhook for unknown payment"
            );
            return Err(GatewayError::PaymentNotFound(
                event.gateway_payment_id.clone(),
            ));
        };

        match event.kind {
            EventKind::Succeeded => self.apply_succeeded(event, &record).await,
            EventKind::Canceled => self.apply_canceled(&record).await,
            EventKind::WaitingForCapture => self.apply_waiting_for_capture(&record).await,
            EventKind::Unknown => {
                tracing::warn!(
                    gateway_payment_id = %record.gateway_payment_id,
                    "unknown event kind reached reconciliation"
                );
                Ok(ApplyOutcome::NoOp)
            }
        }
    }

    async fn apply_succeeded(
        &self,
        event: &PaymentEvent,
        record: &PaymentRecord,
    ) -> Result<ApplyOutcome, GatewayError> {
        if record.status == PaymentStatus::Succeeded {
            tracing::info!(
                gateway_payment_id = %record.gateway_payment_id,
                "payment already reconciled, skipping"
            );
            return Ok(ApplyOutcome::NoOp);
        }

        // The recorded amount is authoritative for the credit; the
        // webhook amount is only cross-checked.
        if let Some(webhook_amount) = event.amount {
            if webhook_amount != record.amount {
                tracing::warn!(
                    gateway_payment_id = %record.gateway_payment_id,
                    recorded = %record.amount,
                    reported = %webhook_amount,
                    "webhook amount differs from recorded amount"
                );
            }
        }

        let completed_at = event.captured_at.unwrap_or_else(Utc::now);
        let credited = self
            .store
            .complete_and_credit(&record.gateway_payment_id, completed_at)
            .await?;
        if !credited {
            tracing::info!(
                gateway_payment_id = %record.gateway_payment_id,
                status = record.status.as_str(),
                "payment no longer creditable, skipping"
            );
            return Ok(ApplyOutcome::NoOp);
        }

        tracing::info!(
            gateway_payment_id = %record.gateway_payment_id,
            user_id = record.user_id,
            amount = %record.amount,
            currency = %record.currency,
            "payment succeeded, balance credited"
        );

        if let Err(error) = self
            .referrals
            .process(record.user_id, record.amount, &record.gateway_payment_id)
            .await
        {
            tracing::warn!(
                user_id = record.user_id,
                %error,
                "referral processing failed"
            );
        }

        let message = format!(
            "Payment received: balance credited {} {}",
            record.amount, record.currency
        );
        if let Err(error) = self.notifier.notify(record.user_id, &message).await {
            tracing::warn!(user_id = record.user_id, %error, "user notification failed");
        }

        Ok(ApplyOutcome::Applied {
            status: PaymentStatus::Succeeded,
        })
    }

    async fn apply_canceled(&self, record: &PaymentRecord) -> Result<ApplyOutcome, GatewayError> {
        if record.status == PaymentStatus::Canceled {
            tracing::info!(
                gateway_payment_id = %record.gateway_payment_id,
                "payment already canceled, skipping"
            );
            return Ok(ApplyOutcome::NoOp);
        }

        let moved = self
            .store
            .mark_canceled(&record.gateway_payment_id, Utc::now())
            .await?;
        if !moved {
            tracing::info!(
                gateway_payment_id = %record.gateway_payment_id,
                status = record.status.as_str(),
                "payment not cancellable, skipping"
            );
            return Ok(ApplyOutcome::NoOp);
        }

        tracing::info!(
            gateway_payment_id = %record.gateway_payment_id,
            user_id = record.user_id,
            "payment canceled"
        );
        Ok(ApplyOutcome::Applied {
            status: PaymentStatus::Canceled,
        })
    }

    async fn apply_waiting_for_capture(
        &self,
        record: &PaymentRecord,
    ) -> Result<ApplyOutcome, GatewayError> {
        let moved = self
            .store
            .mark_waiting_for_capture(&record.gateway_payment_id)
            .await?;
        if !moved {
            tracing::info!(
                gateway_payment_id = %record.gateway_payment_id,
                status = record.status.as_str(),
                "payment not pending, capture notice skipped"
            );
            return Ok(ApplyOutcome::NoOp);
        }

        tracing::info!(
            gateway_payment_id = %record.gateway_payment_id,
            user_id = record.user_id,
            "payment waiting for capture"
        );
        Ok(ApplyOutcome::Applied {
            status: PaymentStatus::WaitingForCapture,
        })
    }

    async fn acquire_payment_lock(&self, gateway_payment_id: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut map = self.in_flight.lock().await;
            Arc::clone(map.entry(gateway_payment_id.to_string()).or_default())
        };
        entry.lock_owned().await
    }

    async fn release_payment_lock(&self, gateway_payment_id: &str, guard: OwnedMutexGuard<()>) {
        drop(guard);
        let mut map = self.in_flight.lock().await;
        // A strong count of 1 means no other delivery holds or awaits
        // this entry; the map reference is the last one.
        if let Some(entry) = map.get(gateway_payment_id) {
            if Arc::strong_count(entry) == 1 {
                map.remove(gateway_payment_id);
            }
        }
    }
}
