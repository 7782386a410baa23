use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One scheduled occurrence of an event. Seat availability is tracked per
/// (event date, seat category) pair, not per event.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct EventDate {
    pub id: Uuid,
    pub event_id: Uuid,
    pub event_date: time::Date,
    pub start_time: time::Time,
    pub end_time: time::Time,
}

/// Seat category reference data. `price_cents` is the server-authoritative
/// unit price; client-claimed prices are only ever compared against it.
#[derive(Debug, FromRow, Serialize, Deserialize, Clone)]
pub struct SeatCategory {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub price_cents: i64,
}
