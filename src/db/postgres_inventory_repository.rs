use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::inventory_repository::InventoryRepository;

pub struct PostgresInventoryRepository {
    pub pool: PgPool,
}

#[async_trait]
impl InventoryRepository for PostgresInventoryRepository {
    async fn reserve(
        &self,
        event_date_id: Uuid,
        seat_category_id: Uuid,
        quantity: i32,
    ) -> Result<bool, sqlx::Error> {
        // One conditional write. Two racing requests for the last seats
        // serialize on the row lock and the loser matches zero rows.
        let result = sqlx::query(
            r#"
            UPDATE available_seats
            SET available = available - $1
            WHERE event_date_id = $2
              AND seat_category_id = $3
              AND available >= $1
            "#,
        )
        .bind(quantity)
        .bind(event_date_id)
        .bind(seat_category_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn release(
        &self,
        event_date_id: Uuid,
        seat_category_id: Uuid,
        quantity: i32,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            UPDATE available_seats
            SET available = LEAST(capacity, available + $1)
            WHERE event_date_id = $2
              AND seat_category_id = $3
            "#,
        )
        .bind(quantity)
        .bind(event_date_id)
        .bind(seat_category_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn available(
        &self,
        event_date_id: Uuid,
        seat_category_id: Uuid,
    ) -> Result<Option<i32>, sqlx::Error> {
        let count = sqlx::query_scalar::<_, i32>(
            r#"
            SELECT available
            FROM available_seats
            WHERE event_date_id = $1
              AND seat_category_id = $2
            "#,
        )
        .bind(event_date_id)
        .bind(seat_category_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(count)
    }
}
