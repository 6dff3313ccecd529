//! Balance top-up flow: registers payments with the gateway and the
//! local store.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::{NewPayment, PaymentRecord};
use crate::error::GatewayError;
use crate::gateway::PaymentGatewayClient;
use crate::gateway::models::PaymentStatusView;
use crate::persistence::PaymentStore;

const TOPUP_CURRENCY: &str = "RUB";
const DEFAULT_DESCRIPTION: &str = "Balance top-up";

/// A freshly registered top-up payment.
#[derive(Debug, Clone)]
pub struct TopupPayment {
    /// The local payment record, in `pending` status.
    pub record: PaymentRecord,
    /// URL the user completes the payment at, when the gateway issued
    /// one.
    pub confirmation_url: Option<String>,
}

/// Creates, inspects, and cancels balance top-up payments.
#[derive(Debug)]
pub struct TopupService {
    client: PaymentGatewayClient,
    store: Arc<dyn PaymentStore>,
    min_amount: Decimal,
    max_amount: Decimal,
}

impl TopupService {
    /// Creates a top-up service accepting amounts in
    /// `min_amount..=max_amount`.
    #[must_use]
    pub fn new(
        client: PaymentGatewayClient,
        store: Arc<dyn PaymentStore>,
        min_amount: Decimal,
        max_amount: Decimal,
    ) -> Self {
        Self {
            client,
            store,
            min_amount,
            max_amount,
        }
    }

    /// Registers a top-up with the gateway and records it locally in
    /// `pending` status.
    ///
    /// The correlation metadata sent to the gateway always carries the
    /// user id and a `payment_type` marker, so webhooks and manual
    /// reconciliation can attribute the payment without a local lookup.
    /// No record is written when the gateway call fails.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidRequest`] when `amount` is outside
    /// the accepted range, any gateway error from payment creation, and
    /// [`GatewayError::PersistenceError`] when the record cannot be
    /// stored.
    pub async fn create_topup(
        &self,
        user_id: i64,
        amount: Decimal,
        description: Option<&str>,
        return_url: &str,
    ) -> Result<TopupPayment, GatewayError> {
        if amount < self.min_amount || amount > self.max_amount {
            return Err(GatewayError::InvalidRequest(format!(
                "top-up amount {amount} is outside {}..={}",
                self.min_amount, self.max_amount
            )));
        }

        let description = description.unwrap_or(DEFAULT_DESCRIPTION);
        let metadata = serde_json::json!({
            "user_id": user_id.to_string(),
            "payment_type": "balance_topup",
        });

        let object = self
            .client
            .create_payment(
                amount,
                TOPUP_CURRENCY,
                description,
                metadata.clone(),
                return_url,
            )
            .await?;

        let confirmation_url = object.confirmation_url().map(str::to_string);
        let record = self
            .store
            .insert_payment(NewPayment {
                gateway_payment_id: object.id,
                user_id,
                amount,
                currency: TOPUP_CURRENCY.to_string(),
                description: Some(description.to_string()),
                confirmation_url: confirmation_url.clone(),
                metadata,
            })
            .await?;

        tracing::info!(
            gateway_payment_id = %record.gateway_payment_id,
            user_id,
            %amount,
            "top-up registered"
        );
        Ok(TopupPayment {
            record,
            confirmation_url,
        })
    }

    /// Queries the gateway for the live state of a payment.
    ///
    /// # Errors
    ///
    /// Propagates gateway errors from the status call.
    pub async fn check_status(
        &self,
        gateway_payment_id: &str,
    ) -> Result<PaymentStatusView, GatewayError> {
        self.client.get_payment_status(gateway_payment_id).await
    }

    /// Cancels a top-up at the gateway and, when that succeeds, marks
    /// the local record canceled.
    ///
    /// Returns whether the gateway accepted the cancellation. The local
    /// update is best-effort; the authoritative cancellation webhook
    /// converges the record either way.
    pub async fn cancel_topup(&self, gateway_payment_id: &str) -> bool {
        if !self.client.cancel_payment(gateway_payment_id).await {
            return false;
        }
        match self
            .store
            .mark_canceled(gateway_payment_id, chrono::Utc::now())
            .await
        {
            Ok(_) => true,
            Err(error) => {
                tracing::warn!(
                    gateway_payment_id,
                    %error,
                    "local record not updated after gateway cancel"
                );
                true
            }
        }
    }
}
