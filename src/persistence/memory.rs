//! In-memory payment store for tests and local development.
//!
//! Mirrors the conditional-transition semantics of the PostgreSQL store
//! under a single mutex, including the balance credit and ledger entry
//! on the success path.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::PaymentStore;
use super::models::LedgerEntry;
use crate::domain::{NewPayment, PaymentRecord, PaymentStatus};
use crate::error::GatewayError;

#[derive(Debug, Default)]
struct Inner {
    payments: HashMap<String, PaymentRecord>,
    balances: HashMap<i64, Decimal>,
    ledger: Vec<LedgerEntry>,
}

/// Payment store backed by process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current balance of `user_id`, zero when unknown.
    pub async fn balance_of(&self, user_id: i64) -> Decimal {
        let inner = self.inner.lock().await;
        inner
            .balances
            .get(&user_id)
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Returns a copy of all ledger entries in application order.
    pub async fn ledger_entries(&self) -> Vec<LedgerEntry> {
        let inner = self.inner.lock().await;
        inner.ledger.clone()
    }
}

#[async_trait::async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_payment(&self, new: NewPayment) -> Result<PaymentRecord, GatewayError> {
        let record = PaymentRecord::new(new);
        let mut inner = self.inner.lock().await;
        if inner.payments.contains_key(&record.gateway_payment_id) {
            return Err(GatewayError::PersistenceError(format!(
                "duplicate gateway payment id: {}",
                record.gateway_payment_id
            )));
        }
        inner
            .payments
            .insert(record.gateway_payment_id.clone(), record.clone());
        Ok(record)
    }

    async fn find_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<PaymentRecord>, GatewayError> {
        let inner = self.inner.lock().await;
        Ok(inner.payments.get(gateway_payment_id).cloned())
    }

    async fn complete_and_credit(
        &self,
        gateway_payment_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, GatewayError> {
        let mut inner = self.inner.lock().await;
        let (payment_id, user_id, amount) = {
            let Some(record) = inner.payments.get_mut(gateway_payment_id) else {
                return Ok(false);
            };
            if !record.status.can_transition_to(PaymentStatus::Succeeded) {
                return Ok(false);
            }
            record.status = PaymentStatus::Succeeded;
            record.completed_at = Some(completed_at);
            (record.id, record.user_id, record.amount)
        };
        *inner.balances.entry(user_id).or_insert(Decimal::ZERO) += amount;
        inner.ledger.push(LedgerEntry {
            payment_id,
            user_id,
            amount,
            entry_type: "topup_credit".to_string(),
            created_at: completed_at,
        });
        Ok(true)
    }

    async fn mark_canceled(
        &self,
        gateway_payment_id: &str,
        cancelled_at: DateTime<Utc>,
    ) -> Result<bool, GatewayError> {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner.payments.get_mut(gateway_payment_id) else {
            return Ok(false);
        };
        if !record.status.can_transition_to(PaymentStatus::Canceled) {
            return Ok(false);
        }
        record.status = PaymentStatus::Canceled;
        record.cancelled_at = Some(cancelled_at);
        Ok(true)
    }

    async fn mark_waiting_for_capture(
        &self,
        gateway_payment_id: &str,
    ) -> Result<bool, GatewayError> {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner.payments.get_mut(gateway_payment_id) else {
            return Ok(false);
        };
        if !record
            .status
            .can_transition_to(PaymentStatus::WaitingForCapture)
        {
            return Ok(false);
        }
        record.status = PaymentStatus::WaitingForCapture;
        Ok(true)
    }
}
