use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::booking::{Booking, BookingView};
use crate::models::transaction::Transaction;

/// Input line for a new booking; the amount has already been computed from
/// the authoritative seat category price.
#[derive(Debug, Clone)]
pub struct NewBookingLine {
    pub event_id: Uuid,
    pub seat_category_id: Uuid,
    pub event_date_id: Uuid,
    pub quantity: i32,
    pub amount_cents: i64,
}

/// Terminal state applied by a seat-releasing settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseKind {
    Expired,
    Cancelled,
}

/// Outcome of a guarded transition. `AlreadySettled` is a no-op, not an
/// error: webhooks may be redelivered any number of times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleResult {
    Applied,
    AlreadySettled,
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum LedgerInsertError {
    /// The generated transaction reference collided with an existing one;
    /// the caller retries with a fresh code.
    #[error("transaction reference already taken")]
    ReferenceTaken,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// Persisted transactions and their bookings.
///
/// Both settlement methods perform the status check and every dependent
/// write as one atomic unit, so a late "completed" webhook racing an expiry
/// sweep always resolves to exactly one winner.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Creates one unpaid transaction and its reserved bookings together.
    async fn create_transaction_with_bookings(
        &self,
        user_id: Uuid,
        reference: &str,
        amount_cents: i64,
        lines: &[NewBookingLine],
    ) -> Result<Transaction, LedgerInsertError>;

    async fn find_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, sqlx::Error>;

    /// unpaid -> paid, bookings included. No-op unless currently unpaid.
    async fn settle_paid(&self, transaction_id: Uuid) -> Result<SettleResult, sqlx::Error>;

    /// unpaid -> expired/cancelled, bookings included, and every booked
    /// quantity handed back to the inventory. No-op unless currently unpaid.
    async fn settle_released(
        &self,
        transaction_id: Uuid,
        kind: ReleaseKind,
    ) -> Result<SettleResult, sqlx::Error>;

    async fn bookings_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Vec<Booking>, sqlx::Error>;

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<BookingView>, sqlx::Error>;

    /// Email of the user who owns the transaction, for the confirmation
    /// notification.
    async fn contact_email_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<String>, sqlx::Error>;

    /// Unpaid transactions created before `cutoff`, oldest first, for the
    /// expiry sweep.
    async fn find_stale_unpaid(
        &self,
        cutoff: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<Uuid>, sqlx::Error>;
}
