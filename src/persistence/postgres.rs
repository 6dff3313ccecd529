//! PostgreSQL implementation of the payment store.
//!
//! Every status transition is a conditional `UPDATE` guarded on the
//! current status, so concurrent webhook deliveries race safely: the
//! database decides which delivery performs the transition and which
//! observe `rows_affected = 0`. The success path runs as a single
//! statement so the status change, the balance credit, and the ledger
//! entry commit together.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::PaymentStore;
use super::models::PaymentRow;
use crate::domain::{NewPayment, PaymentRecord};
use crate::error::GatewayError;

/// PostgreSQL-backed payment store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl PaymentStore for PostgresStore {
    async fn insert_payment(&self, new: NewPayment) -> Result<PaymentRecord, GatewayError> {
        let record = PaymentRecord::new(new);
        sqlx::query(
            "INSERT INTO payments \
             (id, gateway_payment_id, user_id, amount, currency, status, description, \
              confirmation_url, metadata, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(Uuid::from(record.id))
        .bind(&record.gateway_payment_id)
        .bind(record.user_id)
        .bind(record.amount)
        .bind(&record.currency)
        .bind(record.status.as_str())
        .bind(&record.description)
        .bind(&record.confirmation_url)
        .bind(&record.metadata)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(record)
    }

    async fn find_by_gateway_id(
        &self,
        gateway_payment_id: &str,
    ) -> Result<Option<PaymentRecord>, GatewayError> {
        let row = sqlx::query_as::<_, PaymentRow>(
            "SELECT id, gateway_payment_id, user_id, amount, currency, status, description, \
                    confirmation_url, metadata, created_at, completed_at, cancelled_at \
             FROM payments WHERE gateway_payment_id = $1",
        )
        .bind(gateway_payment_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        row.map(PaymentRecord::try_from).transpose()
    }

    async fn complete_and_credit(
        &self,
        gateway_payment_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<bool, GatewayError> {
        let credited = sqlx::query_scalar::<_, i64>(
            "WITH advanced AS ( \
                 UPDATE payments \
                    SET status = 'succeeded', completed_at = $2 \
                  WHERE gateway_payment_id = $1 \
                    AND status IN ('pending', 'waiting_for_capture') \
              RETURNING id, user_id, amount \
             ), credited AS ( \
                 INSERT INTO users AS u (telegram_id, balance) \
                 SELECT user_id, amount FROM advanced \
                 ON CONFLICT (telegram_id) \
                 DO UPDATE SET balance = u.balance + EXCLUDED.balance \
              RETURNING u.telegram_id \
             ) \
             INSERT INTO ledger_entries (payment_id, user_id, amount, entry_type) \
             SELECT a.id, c.telegram_id, a.amount, 'topup_credit' \
               FROM advanced a JOIN credited c ON c.telegram_id = a.user_id \
             RETURNING id",
        )
        .bind(gateway_payment_id)
        .bind(completed_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(credited.is_some())
    }

    async fn mark_canceled(
        &self,
        gateway_payment_id: &str,
        cancelled_at: DateTime<Utc>,
    ) -> Result<bool, GatewayError> {
        let result = sqlx::query(
            "UPDATE payments SET status = 'canceled', cancelled_at = $2 \
             WHERE gateway_payment_id = $1 \
               AND status IN ('pending', 'waiting_for_capture')",
        )
        .bind(gateway_payment_id)
        .bind(cancelled_at)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_waiting_for_capture(
        &self,
        gateway_payment_id: &str,
    ) -> Result<bool, GatewayError> {
        let result = sqlx::query(
            "UPDATE payments SET status = 'waiting_for_capture' \
             WHERE gateway_payment_id = $1 AND status = 'pending'",
        )
        .bind(gateway_payment_id)
        .execute(&self.pool)
        .await
        .map_err(|e| GatewayError::PersistenceError(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }
}
