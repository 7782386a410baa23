use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Mirrors [`super::transaction::TransactionStatus`], with `reserved` as the
/// pending state instead of `unpaid`.
#[derive(sqlx::Type, Debug, Deserialize, Serialize, PartialEq, Eq, Copy, Clone)]
#[sqlx(type_name = "booking_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Reserved,
    Paid,
    Cancelled,
    Expired,
}

/// One line item of a transaction: `quantity` seats of one category on one
/// event date, priced at reservation time from the seat category.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct Booking {
    pub id: Uuid,
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub event_id: Uuid,
    pub seat_category_id: Uuid,
    pub event_date_id: Uuid,
    pub quantity: i32,
    pub amount_cents: i64,
    pub status: BookingStatus,
    pub redeemed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub booked_at: OffsetDateTime,
}

/// Booking joined with its event metadata, as returned by the listing
/// endpoint.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct BookingView {
    pub booking_id: Uuid,
    pub transaction_id: Uuid,
    pub quantity: i32,
    pub amount_cents: i64,
    pub status: BookingStatus,
    pub redeemed: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub booked_at: OffsetDateTime,
    pub event_title: String,
    pub seat_category: String,
    pub event_date: time::Date,
    pub start_time: time::Time,
    pub end_time: time::Time,
}
