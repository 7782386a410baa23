use async_trait::async_trait;
use uuid::Uuid;

/// Per (event date, seat category) seat counts.
///
/// `reserve` must be one conditional operation, never a read followed by a
/// write: concurrent requests for the same key are expected and must not
/// both succeed on the last unit.
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Decrements the available count if at least `quantity` seats remain.
    /// Returns `false` when the key is unknown or not enough seats are left.
    async fn reserve(
        &self,
        event_date_id: Uuid,
        seat_category_id: Uuid,
        quantity: i32,
    ) -> Result<bool, sqlx::Error>;

    /// Hands seats back, capped at the key's capacity. Callers are
    /// responsible for releasing at most once per reservation; the
    /// exactly-once guarantee lives in the ledger's status guard.
    async fn release(
        &self,
        event_date_id: Uuid,
        seat_category_id: Uuid,
        quantity: i32,
    ) -> Result<(), sqlx::Error>;

    async fn available(
        &self,
        event_date_id: Uuid,
        seat_category_id: Uuid,
    ) -> Result<Option<i32>, sqlx::Error>;
}
