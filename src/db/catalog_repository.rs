use async_trait::async_trait;
use uuid::Uuid;

use crate::models::event::{EventDate, SeatCategory};

/// Read-only reference data: event dates and the authoritative seat prices.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn find_seat_category(
        &self,
        seat_category_id: Uuid,
    ) -> Result<Option<SeatCategory>, sqlx::Error>;

    async fn find_event_date(
        &self,
        event_date_id: Uuid,
    ) -> Result<Option<EventDate>, sqlx::Error>;
}
