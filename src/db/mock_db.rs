#![allow(dead_code)]
//! In-memory repository implementations backing the unit tests. The
//! conditional-update semantics match the Postgres implementations: reserve
//! is check-and-decrement under one lock, settlement guards on the current
//! status before any dependent effect.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::db::catalog_repository::CatalogRepository;
use crate::db::inventory_repository::InventoryRepository;
use crate::db::ledger_repository::{
    LedgerInsertError, LedgerRepository, NewBookingLine, ReleaseKind, SettleResult,
};
use crate::models::booking::{Booking, BookingStatus, BookingView};
use crate::models::event::{EventDate, SeatCategory};
use crate::models::transaction::{Transaction, TransactionStatus};

#[derive(Clone, Default)]
pub struct InMemoryCatalog {
    pub categories: Arc<Mutex<HashMap<Uuid, SeatCategory>>>,
    pub dates: Arc<Mutex<HashMap<Uuid, EventDate>>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_category(&self, category: SeatCategory) {
        self.categories
            .lock()
            .unwrap()
            .insert(category.id, category);
    }

    pub fn insert_date(&self, date: EventDate) {
        self.dates.lock().unwrap().insert(date.id, date);
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn find_seat_category(
        &self,
        seat_category_id: Uuid,
    ) -> Result<Option<SeatCategory>, sqlx::Error> {
        Ok(self
            .categories
            .lock()
            .unwrap()
            .get(&seat_category_id)
            .cloned())
    }

    async fn find_event_date(
        &self,
        event_date_id: Uuid,
    ) -> Result<Option<EventDate>, sqlx::Error> {
        Ok(self.dates.lock().unwrap().get(&event_date_id).cloned())
    }
}

#[derive(Debug, Clone, Copy)]
struct SeatCount {
    available: i32,
    capacity: i32,
}

#[derive(Clone, Default)]
pub struct InMemoryInventory {
    seats: Arc<Mutex<HashMap<(Uuid, Uuid), SeatCount>>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_capacity(&self, event_date_id: Uuid, seat_category_id: Uuid, capacity: i32) {
        self.seats.lock().unwrap().insert(
            (event_date_id, seat_category_id),
            SeatCount {
                available: capacity,
                capacity,
            },
        );
    }
}

#[async_trait]
impl InventoryRepository for InMemoryInventory {
    async fn reserve(
        &self,
        event_date_id: Uuid,
        seat_category_id: Uuid,
        quantity: i32,
    ) -> Result<bool, sqlx::Error> {
        let mut seats = self.seats.lock().unwrap();
        match seats.get_mut(&(event_date_id, seat_category_id)) {
            Some(count) if count.available >= quantity => {
                count.available -= quantity;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release(
        &self,
        event_date_id: Uuid,
        seat_category_id: Uuid,
        quantity: i32,
    ) -> Result<(), sqlx::Error> {
        let mut seats = self.seats.lock().unwrap();
        if let Some(count) = seats.get_mut(&(event_date_id, seat_category_id)) {
            count.available = (count.available + quantity).min(count.capacity);
        }
        Ok(())
    }

    async fn available(
        &self,
        event_date_id: Uuid,
        seat_category_id: Uuid,
    ) -> Result<Option<i32>, sqlx::Error> {
        Ok(self
            .seats
            .lock()
            .unwrap()
            .get(&(event_date_id, seat_category_id))
            .map(|c| c.available))
    }
}

/// In-memory ledger. Holds a handle to the inventory so seat restoration can
/// follow a won expiry/cancellation guard, mirroring the single-transaction
/// behaviour of the Postgres implementation.
#[derive(Clone)]
pub struct InMemoryLedger {
    pub transactions: Arc<Mutex<HashMap<Uuid, Transaction>>>,
    pub bookings: Arc<Mutex<Vec<Booking>>>,
    pub emails: Arc<Mutex<HashMap<Uuid, String>>>,
    /// Number of upcoming creates to reject with `ReferenceTaken`.
    pub reject_references: Arc<Mutex<usize>>,
    /// When set, the next create fails with a storage error.
    pub fail_next_create: Arc<Mutex<bool>>,
    references: Arc<Mutex<HashSet<String>>>,
    inventory: InMemoryInventory,
}

impl InMemoryLedger {
    pub fn new(inventory: InMemoryInventory) -> Self {
        Self {
            transactions: Arc::new(Mutex::new(HashMap::new())),
            bookings: Arc::new(Mutex::new(Vec::new())),
            emails: Arc::new(Mutex::new(HashMap::new())),
            reject_references: Arc::new(Mutex::new(0)),
            fail_next_create: Arc::new(Mutex::new(false)),
            references: Arc::new(Mutex::new(HashSet::new())),
            inventory,
        }
    }

    pub fn set_contact_email(&self, user_id: Uuid, email: &str) {
        self.emails.lock().unwrap().insert(user_id, email.into());
    }

    pub fn transaction_status(&self, transaction_id: Uuid) -> Option<TransactionStatus> {
        self.transactions
            .lock()
            .unwrap()
            .get(&transaction_id)
            .map(|t| t.status)
    }

    /// Marks a guard winner and flips bookings, returning the released lines
    /// when `release` is set. Locks are dropped before the caller touches
    /// the inventory.
    fn apply_guarded(
        &self,
        transaction_id: Uuid,
        status: TransactionStatus,
        booking_status: BookingStatus,
        release: bool,
    ) -> (SettleResult, Vec<(Uuid, Uuid, i32)>) {
        let mut transactions = self.transactions.lock().unwrap();
        let Some(transaction) = transactions.get_mut(&transaction_id) else {
            return (SettleResult::NotFound, Vec::new());
        };
        if transaction.status != TransactionStatus::Unpaid {
            return (SettleResult::AlreadySettled, Vec::new());
        }
        transaction.status = status;
        if status == TransactionStatus::Paid {
            transaction.paid_at = Some(OffsetDateTime::now_utc());
        }

        let mut released = Vec::new();
        let mut bookings = self.bookings.lock().unwrap();
        for booking in bookings
            .iter_mut()
            .filter(|b| b.transaction_id == transaction_id)
        {
            booking.status = booking_status;
            if release {
                released.push((
                    booking.event_date_id,
                    booking.seat_category_id,
                    booking.quantity,
                ));
            }
        }
        (SettleResult::Applied, released)
    }
}

#[async_trait]
impl LedgerRepository for InMemoryLedger {
    async fn create_transaction_with_bookings(
        &self,
        user_id: Uuid,
        reference: &str,
        amount_cents: i64,
        lines: &[NewBookingLine],
    ) -> Result<Transaction, LedgerInsertError> {
        {
            let mut rejects = self.reject_references.lock().unwrap();
            if *rejects > 0 {
                *rejects -= 1;
                return Err(LedgerInsertError::ReferenceTaken);
            }
        }
        {
            let mut fail = self.fail_next_create.lock().unwrap();
            if *fail {
                *fail = false;
                return Err(LedgerInsertError::Db(sqlx::Error::PoolClosed));
            }
        }

        if !self.references.lock().unwrap().insert(reference.to_string()) {
            return Err(LedgerInsertError::ReferenceTaken);
        }

        let transaction = Transaction {
            id: Uuid::new_v4(),
            reference: reference.to_string(),
            user_id,
            amount_cents,
            status: TransactionStatus::Unpaid,
            created_at: OffsetDateTime::now_utc(),
            paid_at: None,
        };
        self.transactions
            .lock()
            .unwrap()
            .insert(transaction.id, transaction.clone());

        let mut bookings = self.bookings.lock().unwrap();
        for line in lines {
            bookings.push(Booking {
                id: Uuid::new_v4(),
                transaction_id: transaction.id,
                user_id,
                event_id: line.event_id,
                seat_category_id: line.seat_category_id,
                event_date_id: line.event_date_id,
                quantity: line.quantity,
                amount_cents: line.amount_cents,
                status: BookingStatus::Reserved,
                redeemed: false,
                booked_at: OffsetDateTime::now_utc(),
            });
        }

        Ok(transaction)
    }

    async fn find_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<Transaction>, sqlx::Error> {
        Ok(self
            .transactions
            .lock()
            .unwrap()
            .get(&transaction_id)
            .cloned())
    }

    async fn settle_paid(&self, transaction_id: Uuid) -> Result<SettleResult, sqlx::Error> {
        let (result, _) = self.apply_guarded(
            transaction_id,
            TransactionStatus::Paid,
            BookingStatus::Paid,
            false,
        );
        Ok(result)
    }

    async fn settle_released(
        &self,
        transaction_id: Uuid,
        kind: ReleaseKind,
    ) -> Result<SettleResult, sqlx::Error> {
        let (status, booking_status) = match kind {
            ReleaseKind::Expired => (TransactionStatus::Expired, BookingStatus::Expired),
            ReleaseKind::Cancelled => (TransactionStatus::Cancelled, BookingStatus::Cancelled),
        };
        let (result, released) = self.apply_guarded(transaction_id, status, booking_status, true);
        for (event_date_id, seat_category_id, quantity) in released {
            self.inventory
                .release(event_date_id, seat_category_id, quantity)
                .await?;
        }
        Ok(result)
    }

    async fn bookings_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Vec<Booking>, sqlx::Error> {
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.transaction_id == transaction_id)
            .cloned()
            .collect())
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<BookingView>, sqlx::Error> {
        let mut views: Vec<BookingView> = self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.user_id == user_id)
            .map(|b| BookingView {
                booking_id: b.id,
                transaction_id: b.transaction_id,
                quantity: b.quantity,
                amount_cents: b.amount_cents,
                status: b.status,
                redeemed: b.redeemed,
                booked_at: b.booked_at,
                event_title: "Test Event".into(),
                seat_category: "Test Category".into(),
                event_date: b.booked_at.date(),
                start_time: time::Time::MIDNIGHT,
                end_time: time::Time::MIDNIGHT,
            })
            .collect();
        views.sort_by(|a, b| b.booked_at.cmp(&a.booked_at));
        Ok(views)
    }

    async fn contact_email_for_transaction(
        &self,
        transaction_id: Uuid,
    ) -> Result<Option<String>, sqlx::Error> {
        let user_id = match self.transactions.lock().unwrap().get(&transaction_id) {
            Some(t) => t.user_id,
            None => return Ok(None),
        };
        Ok(self.emails.lock().unwrap().get(&user_id).cloned())
    }

    async fn find_stale_unpaid(
        &self,
        cutoff: OffsetDateTime,
        limit: i64,
    ) -> Result<Vec<Uuid>, sqlx::Error> {
        let transactions = self.transactions.lock().unwrap();
        let mut stale: Vec<&Transaction> = transactions
            .values()
            .filter(|t| t.status == TransactionStatus::Unpaid && t.created_at < cutoff)
            .collect();
        stale.sort_by_key(|t| t.created_at);
        Ok(stale
            .into_iter()
            .take(limit as usize)
            .map(|t| t.id)
            .collect())
    }
}
