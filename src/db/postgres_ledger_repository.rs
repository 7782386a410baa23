use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::ledger_repository::{
    LedgerInsertError, LedgerRepository, NewBookingLine, ReleaseKind, SettleResult,
};
use crate::models::booking::{Booking, BookingStatus, BookingView};
use crate::models::transaction::{Transaction, TransactionStatus};

pub struct PostgresLedgerRepository {
    pub pool: PgPool,
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

impl ReleaseKind {
    fn transaction_status(self) -> TransactionStatus {
        match self {
            ReleaseKind::Expired => TransactionStatus::Expired,
            ReleaseKind::Cancelled => TransactionStatus::Cancelled,
        }
    }

    fn booking_status(self) -> BookingStatus {
        match self {
            ReleaseKind::Expired => BookingStatus::Expired,
            ReleaseKind::Cancelled => BookingStatus::Cancelled,
        }
    }
}

#[async_trait]
impl LedgerRepository for PostgresLedgerRepository {
    async fn create_transaction_with_bookings(
        &self,
        user_id: Uuid,
        reference: &str,
        amount_cents: i64,
        lines: &[NewBookingLine],
    ) -> Result<Transaction, LedgerInsertError> {
        let mut tx = self.pool.begin().await.map_err(LedgerInsertError::Db)?;

        let transaction = sqlx::query_as::<_, Transaction>(
            r#"
            INSERT INTO transactions (id, reference, user_id, amount_cents, status, created_at)
            VALUES ($1, $2, $3, $4, 'unpaid', now())
            RETURNING id, reference, user_id, amount_cents, status, created_at, paid_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(reference)
        .bind(user_id)
        .bind(amount_cents)
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| {
            if is_unique_violation(&err) {
                LedgerInsertError::ReferenceTaken
            } else {
                LedgerInsertError::Db(err)
            }
        })?;

        for line in lines {
            sqlx::query(
                r#"
                INSERT INTO bookings
                    (id, transaction_id, user_id, event_id, seat_category_id, event_date_id,
                     quantity, amount_cents, status, redeemed, booked_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'reserved', false, now())
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(transaction.id)
            .bind(user_id)
            .bind(line.event_id)
            .bind(line.seat_category_id)
            .bind(line.event_date_id)
            .bind(line.quantity)
            .bind(line.amount_cents)
            .execute(&mut *tx)
            .await
            .map_err(LedgerInsertError::Db)?;
        }

        tx.commit().await.map_err(LedgerInsertError::Db)?;

        Ok(transaction)
    }

    async fn find_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        let result = sqlx::query_as::<_, Transaction>(
            r#"
            SELECT id, reference, user_id, amount_cents, status, created_at, paid_at
            FROM transactions
            WHERE id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(result)
    }

    async fn settle_paid(&self, transaction_id: Uuid) -> Result<SettleResult, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE transactions
            SET status = 'paid', paid_at = now()
            WHERE id = $1 AND status = 'unpaid'
            "#,
        )
        .bind(transaction_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return self.classify_guard_miss(transaction_id).await;
        }

        sqlx::query(
            r#"
            UPDATE bookings
            SET status = 'paid'
            WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SettleResult::Applied)
    }

    async fn settle_released(
        &self,
        transaction_id: Uuid,
        kind: ReleaseKind,
    ) -> Result<SettleResult, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE transactions
            SET status = $2
            WHERE id = $1 AND status = 'unpaid'
            "#,
        )
        .bind(transaction_id)
        .bind(kind.transaction_status())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return self.classify_guard_miss(transaction_id).await;
        }

        // Seat restoration rides the same transaction as the status flip,
        // so a crash can never leave a terminal transaction with its seats
        // still held, or seats restored twice.
        sqlx::query(
            r#"
            UPDATE available_seats a
            SET available = LEAST(a.capacity, a.available + b.quantity)
            FROM (
                SELECT seat_category_id, event_date_id, SUM(quantity) AS quantity
                FROM bookings
                WHERE transaction_id = $1
                GROUP BY seat_category_id, event_date_id
            ) b
            WHERE a.seat_category_id = b.seat_category_id
              AND a.event_date_id = b.event_date_id
            "#,
        )
        .bind(transaction_id)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2
            WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id)
        .bind(kind.booking_status())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(SettleResult::Applied)
    }

    async fn bookings_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Vec<Booking>, sqlx::Error> {
        let results = sqlx::query_as::<_, Booking>(
            r#"
            SELECT id, transaction_id, user_id, event_id, seat_category_id, event_date_id,
                   quantity, amount_cents, status, redeemed, booked_at
            FROM bookings
            WHERE transaction_id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<BookingView>, sqlx::Error> {
        let results = sqlx::query_as::<_, BookingView>(
            r#"
            SELECT b.id AS booking_id,
                   b.transaction_id,
                   b.quantity,
                   b.amount_cents,
                   b.status,
                   b.redeemed,
                   b.booked_at,
                   e.title AS event_title,
                   sc.name AS seat_category,
                   ed.event_date,
                   ed.start_time,
                   ed.end_time
            FROM bookings b
            JOIN events e ON e.id = b.event_id
            JOIN seat_categories sc ON sc.id = b.seat_category_id
            JOIN event_dates ed ON ed.id = b.event_date_id
            WHERE b.user_id = $1
            ORDER BY b.booked_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(results)
    }

    async fn contact_email_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<String>, sqlx::Error> {
        let email = sqlx::query_scalar::<_, String>(
            r#"
            SELECT u.email
            FROM transactions t
            JOIN users u ON u.id = t.user_id
            WHERE t.id = $1
            "#,
        )
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(email)
    }

    async fn find_stale_unpaid(
        &self,
        cutoff: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM transactions
            WHERE status = 'unpaid' AND created_at < $1
            ORDER BY created_at
            LIMIT $2
            "#,
        )
        .bind(cutoff)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

impl PostgresLedgerRepository {
    /// A guard that matched zero rows means either a redelivered event for a
    /// settled transaction or an unknown id; tell the two apart for logging.
    async fn classify_guard_miss(
        &self,
        transaction_id: Uuid,
    ) -> Result<SettleResult, sqlx::Error> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (SELECT 1 FROM transactions WHERE id = $1)
            "#,
        )
        .bind(transaction_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(if exists {
            SettleResult::AlreadySettled
        } else {
            SettleResult::NotFound
        })
    }
}
