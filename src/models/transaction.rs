use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// `unpaid` is the only non-terminal state; every other state is final and
/// may only be reached through a guarded transition from `unpaid`.
#[derive(sqlx::Type, Debug, Deserialize, Serialize, PartialEq, Eq, Copy, Clone)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Unpaid,
    Paid,
    Cancelled,
    Expired,
}

impl TransactionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Unpaid)
    }
}

/// One checkout attempt. Owns a set of bookings whose amounts sum to
/// `amount_cents`.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct Transaction {
    pub id: Uuid,
    /// Short human-facing code (`TKT-XXXXXXXX`), unique across transactions.
    pub reference: String,
    pub user_id: Uuid,
    pub amount_cents: i64,
    pub status: TransactionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub paid_at: Option<OffsetDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unpaid_is_non_terminal() {
        assert!(!TransactionStatus::Unpaid.is_terminal());
        assert!(TransactionStatus::Paid.is_terminal());
        assert!(TransactionStatus::Cancelled.is_terminal());
        assert!(TransactionStatus::Expired.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Unpaid).unwrap(),
            "\"unpaid\""
        );
        assert_eq!(
            serde_json::to_string(&TransactionStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }
}
