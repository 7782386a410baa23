use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::ledger_repository::{LedgerRepository, ReleaseKind, SettleResult};
use crate::services::smtp_mailer::Mailer;
use crate::services::stripe::GatewayEvent;

pub const EVENT_CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const EVENT_CHECKOUT_EXPIRED: &str = "checkout.session.expired";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementOutcome {
    Applied,
    AlreadySettled,
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum CancellationError {
    #[error("transaction not found")]
    NotFound,
    #[error("transaction belongs to another user")]
    Forbidden,
    #[error("transaction is no longer unpaid")]
    AlreadySettled,
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

/// Applies terminal outcomes to unpaid transactions. Every path funnels
/// through the ledger's guarded transitions, so redelivered webhooks, the
/// sweep, and user cancellations can all race without double effects.
pub struct SettlementProcessor {
    ledger: Arc<dyn LedgerRepository>,
    mailer: Arc<dyn Mailer>,
}

impl SettlementProcessor {
    pub fn new(ledger: Arc<dyn LedgerRepository>, mailer: Arc<dyn Mailer>) -> Self {
        Self { ledger, mailer }
    }

    /// Marks a transaction paid. The confirmation email goes out only on the
    /// transition itself, so redeliveries never notify twice; a mail failure
    /// is logged and swallowed because payment state must not depend on it.
    pub async fn settle_paid(
        &self,
        transaction_id: Uuid,
    ) -> Result<SettlementOutcome, sqlx::Error> {
        match self.ledger.settle_paid(transaction_id).await? {
            SettleResult::Applied => {
                info!(%transaction_id, "transaction settled as paid");
                self.notify_paid(transaction_id).await;
                Ok(SettlementOutcome::Applied)
            }
            SettleResult::AlreadySettled => {
                debug!(%transaction_id, "payment event for already settled transaction");
                Ok(SettlementOutcome::AlreadySettled)
            }
            SettleResult::NotFound => {
                warn!(%transaction_id, "payment event for unknown transaction");
                Ok(SettlementOutcome::Unknown)
            }
        }
    }

    /// Expires a transaction and hands its seats back.
    pub async fn settle_expired(
        &self,
        transaction_id: Uuid,
    ) -> Result<SettlementOutcome, sqlx::Error> {
        match self
            .ledger
            .settle_released(transaction_id, ReleaseKind::Expired)
            .await?
        {
            SettleResult::Applied => {
                info!(%transaction_id, "transaction expired, seats restored");
                Ok(SettlementOutcome::Applied)
            }
            SettleResult::AlreadySettled => Ok(SettlementOutcome::AlreadySettled),
            SettleResult::NotFound => {
                warn!(%transaction_id, "expiry event for unknown transaction");
                Ok(SettlementOutcome::Unknown)
            }
        }
    }

    /// Buyer-initiated cancellation. Only the owner may cancel, and only
    /// while the transaction is still unpaid.
    pub async fn cancel(
        &self,
        transaction_id: Uuid,
        requesting_user_id: Uuid,
    ) -> Result<(), CancellationError> {
        let transaction = self
            .ledger
            .find_transaction(transaction_id)
            .await?
            .ok_or(CancellationError::NotFound)?;
        if transaction.user_id != requesting_user_id {
            return Err(CancellationError::Forbidden);
        }

        match self
            .ledger
            .settle_released(transaction_id, ReleaseKind::Cancelled)
            .await?
        {
            SettleResult::Applied => {
                info!(%transaction_id, "transaction cancelled by owner, seats restored");
                Ok(())
            }
            // Covers a webhook winning the race between our ownership check
            // and the guarded update.
            SettleResult::AlreadySettled => Err(CancellationError::AlreadySettled),
            SettleResult::NotFound => Err(CancellationError::NotFound),
        }
    }

    /// Expires every unpaid transaction created before `cutoff`, up to
    /// `limit`. Returns how many transitions were actually applied.
    pub async fn expire_overdue(
        &self,
        cutoff: OffsetDateTime,
        limit: i64,
    ) -> Result<u64, sqlx::Error> {
        let stale = self.ledger.find_stale_unpaid(cutoff, limit).await?;
        let mut expired = 0u64;
        for transaction_id in stale {
            if self.settle_expired(transaction_id).await? == SettlementOutcome::Applied {
                expired += 1;
            }
        }
        Ok(expired)
    }

    /// Routes a verified gateway event to the matching settlement path.
    /// Unrelated event types are acknowledged and dropped.
    pub async fn handle_gateway_event(&self, event: &GatewayEvent) -> Result<(), sqlx::Error> {
        match event.r#type.as_str() {
            EVENT_CHECKOUT_COMPLETED => {
                let Some(transaction_id) = event.transaction_id() else {
                    warn!(event_id = %event.id, "completed event without transaction metadata");
                    return Ok(());
                };
                self.settle_paid(transaction_id).await?;
            }
            EVENT_CHECKOUT_EXPIRED => {
                let Some(transaction_id) = event.transaction_id() else {
                    warn!(event_id = %event.id, "expired event without transaction metadata");
                    return Ok(());
                };
                self.settle_expired(transaction_id).await?;
            }
            other => {
                debug!(event_type = other, event_id = %event.id, "ignoring gateway event");
            }
        }
        Ok(())
    }

    async fn notify_paid(&self, transaction_id: Uuid) {
        let email = match self.ledger.contact_email_for_transaction(transaction_id).await {
            Ok(Some(email)) => email,
            Ok(None) => {
                warn!(%transaction_id, "no contact email for paid transaction");
                return;
            }
            Err(err) => {
                warn!(%transaction_id, error = %err, "contact email lookup failed");
                return;
            }
        };
        let transaction = match self.ledger.find_transaction(transaction_id).await {
            Ok(Some(transaction)) => transaction,
            _ => return,
        };
        if let Err(err) = self
            .mailer
            .send_booking_confirmation(&email, &transaction.reference, transaction.amount_cents)
            .await
        {
            warn!(%transaction_id, error = %err, "confirmation email failed");
        }
    }
}
