use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::catalog_repository::CatalogRepository;
use crate::models::event::{EventDate, SeatCategory};

pub struct PostgresCatalogRepository {
    pub pool: PgPool,
}

#[async_trait]
impl CatalogRepository for PostgresCatalogRepository {
    async fn find_seat_category(
        &self,
        seat_category_id: Uuid,
    ) -> Result<Option<SeatCategory>, sqlx::Error> {
        let result = sqlx::query_as::<_, SeatCategory>(
            r#"
            SELECT id, event_id, name, price_cents
            FROM seat_categories
            WHERE id = $1
            "#,
        )
        .bind(seat_category_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn find_event_date(
        &self,
        event_date_id: Uuid,
    ) -> Result<Option<EventDate>, sqlx::Error> {
        let result = sqlx::query_as::<_, EventDate>(
            r#"
            SELECT id, event_id, event_date, start_time, end_time
            FROM event_dates
            WHERE id = $1
            "#,
        )
        .bind(event_date_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }
}
