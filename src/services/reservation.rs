use std::sync::Arc;

use rand::Rng;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::catalog_repository::CatalogRepository;
use crate::db::inventory_repository::InventoryRepository;
use crate::db::ledger_repository::{
    LedgerInsertError, LedgerRepository, NewBookingLine,
};
use crate::models::transaction::Transaction;
use crate::services::stripe::{
    CreateSessionRequest, GatewayError, PaymentGateway, SessionLineItem,
};

const REFERENCE_PREFIX: &str = "TKT-";
const REFERENCE_LEN: usize = 8;
const REFERENCE_ATTEMPTS: usize = 5;
// No 0/O/1/I/L: references are read over the phone at the box office.
const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

#[derive(Debug, thiserror::Error)]
pub enum ReservationError {
    #[error("invalid reservation request: {0}")]
    Validation(String),
    #[error("quoted price does not match the current price for seat category {seat_category_id}")]
    PriceMismatch { seat_category_id: Uuid },
    #[error("not enough seats left in category {seat_category_id}")]
    InsufficientSeats { seat_category_id: Uuid },
    #[error("could not allocate a unique booking reference")]
    ReferenceExhausted,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

/// One requested line. `quoted_price_cents` is the unit price the buyer saw;
/// the catalog price is authoritative and a mismatch rejects the whole
/// request before anything is reserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationLine {
    pub seat_category_id: Uuid,
    pub quantity: i32,
    pub quoted_price_cents: i64,
}

/// A whole-checkout request: one event date, one line per seat category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequest {
    pub event_date_id: Uuid,
    pub lines: Vec<ReservationLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationOutcome {
    pub transaction: Transaction,
    pub checkout_url: Option<String>,
    pub checkout_session_id: String,
}

/// Orchestrates a reservation: validate prices, hold seats, write the unpaid
/// transaction, open a checkout session. Seat holds taken before a later step
/// fails are handed back before the error is returned; a hold that made it
/// into a persisted transaction is only ever released by settlement.
pub struct ReservationCoordinator {
    catalog: Arc<dyn CatalogRepository>,
    inventory: Arc<dyn InventoryRepository>,
    ledger: Arc<dyn LedgerRepository>,
    gateway: Arc<dyn PaymentGateway>,
    frontend_origin: String,
    checkout_expiry_minutes: i64,
}

struct PricedLine {
    event_id: Uuid,
    event_date_id: Uuid,
    seat_category_id: Uuid,
    category_name: String,
    quantity: i32,
    unit_price_cents: i64,
}

impl ReservationCoordinator {
    pub fn new(
        catalog: Arc<dyn CatalogRepository>,
        inventory: Arc<dyn InventoryRepository>,
        ledger: Arc<dyn LedgerRepository>,
        gateway: Arc<dyn PaymentGateway>,
        frontend_origin: String,
        checkout_expiry_minutes: i64,
    ) -> Self {
        Self {
            catalog,
            inventory,
            ledger,
            gateway,
            frontend_origin,
            checkout_expiry_minutes,
        }
    }

    pub async fn create(
        &self,
        user_id: Uuid,
        request: ReservationRequest,
    ) -> Result<ReservationOutcome, ReservationError> {
        let priced = self.validate(&request).await?;

        self.hold_seats(&priced).await?;

        let lines: Vec<NewBookingLine> = priced
            .iter()
            .map(|p| NewBookingLine {
                event_id: p.event_id,
                seat_category_id: p.seat_category_id,
                event_date_id: p.event_date_id,
                quantity: p.quantity,
                amount_cents: p.unit_price_cents * p.quantity as i64,
            })
            .collect();
        let amount_cents: i64 = lines.iter().map(|l| l.amount_cents).sum();

        let transaction = match self.persist(user_id, amount_cents, &lines).await {
            Ok(transaction) => transaction,
            Err(err) => {
                self.release_held(&priced).await;
                return Err(err);
            }
        };

        info!(
            transaction_id = %transaction.id,
            reference = %transaction.reference,
            amount_cents,
            "reservation created"
        );

        // A checkout failure past this point is not compensated here: the
        // transaction is already persisted as unpaid and the expiry sweep
        // reclaims its seats on schedule.
        let expires_at = (OffsetDateTime::now_utc()
            + time::Duration::minutes(self.checkout_expiry_minutes))
        .unix_timestamp();
        let session = self
            .gateway
            .create_checkout_session(CreateSessionRequest {
                transaction_id: transaction.id,
                reference: transaction.reference.clone(),
                user_id,
                line_items: priced
                    .iter()
                    .map(|p| SessionLineItem {
                        name: p.category_name.clone(),
                        unit_amount_cents: p.unit_price_cents,
                        quantity: p.quantity as u64,
                    })
                    .collect(),
                success_url: format!("{}/bookings?status=success", self.frontend_origin),
                cancel_url: format!("{}/bookings?status=cancelled", self.frontend_origin),
                expires_at,
            })
            .await
            .map_err(|err| {
                warn!(
                    transaction_id = %transaction.id,
                    error = %err,
                    "checkout session creation failed; transaction left unpaid for the sweep"
                );
                err
            })?;

        Ok(ReservationOutcome {
            transaction,
            checkout_url: session.url,
            checkout_session_id: session.id,
        })
    }

    async fn validate(
        &self,
        request: &ReservationRequest,
    ) -> Result<Vec<PricedLine>, ReservationError> {
        if request.lines.is_empty() {
            return Err(ReservationError::Validation(
                "a reservation needs at least one line".into(),
            ));
        }

        let date = self
            .catalog
            .find_event_date(request.event_date_id)
            .await?
            .ok_or_else(|| {
                ReservationError::Validation(format!(
                    "unknown event date {}",
                    request.event_date_id
                ))
            })?;

        let mut priced = Vec::with_capacity(request.lines.len());
        for line in &request.lines {
            if line.quantity < 1 {
                return Err(ReservationError::Validation(format!(
                    "quantity must be at least 1, got {}",
                    line.quantity
                )));
            }

            let category = self
                .catalog
                .find_seat_category(line.seat_category_id)
                .await?
                .ok_or_else(|| {
                    ReservationError::Validation(format!(
                        "unknown seat category {}",
                        line.seat_category_id
                    ))
                })?;
            if date.event_id != category.event_id {
                return Err(ReservationError::Validation(format!(
                    "event date {} does not belong to the event of category {}",
                    request.event_date_id, line.seat_category_id
                )));
            }
            if line.quoted_price_cents != category.price_cents {
                return Err(ReservationError::PriceMismatch {
                    seat_category_id: line.seat_category_id,
                });
            }

            priced.push(PricedLine {
                event_id: category.event_id,
                event_date_id: request.event_date_id,
                seat_category_id: line.seat_category_id,
                category_name: category.name,
                quantity: line.quantity,
                unit_price_cents: category.price_cents,
            });
        }

        Ok(priced)
    }

    /// Reserves every line, releasing the lines already taken when one runs
    /// out of seats.
    async fn hold_seats(&self, priced: &[PricedLine]) -> Result<(), ReservationError> {
        for (index, line) in priced.iter().enumerate() {
            let granted = match self
                .inventory
                .reserve(line.event_date_id, line.seat_category_id, line.quantity)
                .await
            {
                Ok(granted) => granted,
                Err(err) => {
                    self.release_held(&priced[..index]).await;
                    return Err(err.into());
                }
            };
            if !granted {
                self.release_held(&priced[..index]).await;
                return Err(ReservationError::InsufficientSeats {
                    seat_category_id: line.seat_category_id,
                });
            }
        }
        Ok(())
    }

    async fn release_held(&self, held: &[PricedLine]) {
        for line in held {
            if let Err(err) = self
                .inventory
                .release(line.event_date_id, line.seat_category_id, line.quantity)
                .await
            {
                // Left-over holds are reclaimed by no one; this is the one
                // place worth shouting about.
                error!(
                    seat_category_id = %line.seat_category_id,
                    event_date_id = %line.event_date_id,
                    quantity = line.quantity,
                    error = %err,
                    "failed to release held seats during compensation"
                );
            }
        }
    }

    async fn persist(
        &self,
        user_id: Uuid,
        amount_cents: i64,
        lines: &[NewBookingLine],
    ) -> Result<Transaction, ReservationError> {
        for _ in 0..REFERENCE_ATTEMPTS {
            let reference = generate_reference();
            match self
                .ledger
                .create_transaction_with_bookings(user_id, &reference, amount_cents, lines)
                .await
            {
                Ok(transaction) => return Ok(transaction),
                Err(LedgerInsertError::ReferenceTaken) => {
                    warn!(reference, "booking reference collision, retrying");
                    continue;
                }
                Err(LedgerInsertError::Db(err)) => return Err(err.into()),
            }
        }
        Err(ReservationError::ReferenceExhausted)
    }
}

fn generate_reference() -> String {
    let mut rng = rand::rng();
    let code: String = (0..REFERENCE_LEN)
        .map(|_| REFERENCE_ALPHABET[rng.random_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect();
    format!("{}{}", REFERENCE_PREFIX, code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::mock_db::{InMemoryCatalog, InMemoryInventory, InMemoryLedger};
    use crate::models::event::{EventDate, SeatCategory};
    use crate::models::transaction::TransactionStatus;
    use crate::services::stripe::MockGateway;

    struct Fixture {
        catalog: InMemoryCatalog,
        inventory: InMemoryInventory,
        ledger: InMemoryLedger,
        gateway: MockGateway,
        event_date_id: Uuid,
        seat_category_id: Uuid,
    }

    fn fixture(capacity: i32, price_cents: i64) -> Fixture {
        let catalog = InMemoryCatalog::new();
        let inventory = InMemoryInventory::new();
        let ledger = InMemoryLedger::new(inventory.clone());
        let gateway = MockGateway::new();

        let event_id = Uuid::new_v4();
        let seat_category_id = Uuid::new_v4();
        let event_date_id = Uuid::new_v4();

        catalog.insert_category(SeatCategory {
            id: seat_category_id,
            event_id,
            name: "Balcony".into(),
            price_cents,
        });
        catalog.insert_date(EventDate {
            id: event_date_id,
            event_id,
            event_date: OffsetDateTime::now_utc().date(),
            start_time: time::Time::MIDNIGHT,
            end_time: time::Time::MIDNIGHT,
        });
        inventory.set_capacity(event_date_id, seat_category_id, capacity);

        Fixture {
            catalog,
            inventory,
            ledger,
            gateway,
            event_date_id,
            seat_category_id,
        }
    }

    fn coordinator(f: &Fixture) -> ReservationCoordinator {
        ReservationCoordinator::new(
            Arc::new(f.catalog.clone()),
            Arc::new(f.inventory.clone()),
            Arc::new(f.ledger.clone()),
            Arc::new(f.gateway.clone()),
            "https://tickets.example.test".into(),
            30,
        )
    }

    fn one_line(f: &Fixture, quantity: i32, quoted_price_cents: i64) -> ReservationRequest {
        ReservationRequest {
            event_date_id: f.event_date_id,
            lines: vec![ReservationLine {
                seat_category_id: f.seat_category_id,
                quantity,
                quoted_price_cents,
            }],
        }
    }

    async fn available(f: &Fixture) -> i32 {
        f.inventory
            .available(f.event_date_id, f.seat_category_id)
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn successful_reservation_holds_seats_and_opens_checkout() {
        let f = fixture(10, 4500);
        let user_id = Uuid::new_v4();

        let outcome = coordinator(&f)
            .create(user_id, one_line(&f, 2, 4500))
            .await
            .unwrap();

        assert_eq!(outcome.transaction.status, TransactionStatus::Unpaid);
        assert_eq!(outcome.transaction.amount_cents, 9000);
        assert!(outcome.transaction.reference.starts_with("TKT-"));
        assert_eq!(outcome.transaction.reference.len(), 12);
        assert!(outcome.checkout_url.is_some());
        assert_eq!(available(&f).await, 8);

        let requests = f.gateway.create_requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].transaction_id, outcome.transaction.id);
        assert_eq!(requests[0].line_items[0].unit_amount_cents, 4500);
    }

    #[tokio::test]
    async fn price_mismatch_rejects_without_side_effects() {
        let f = fixture(10, 4500);

        let err = coordinator(&f)
            .create(Uuid::new_v4(), one_line(&f, 2, 3000))
            .await
            .unwrap_err();

        assert!(matches!(err, ReservationError::PriceMismatch { .. }));
        assert_eq!(available(&f).await, 10);
        assert!(f.ledger.transactions.lock().unwrap().is_empty());
        assert!(f.gateway.create_requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn zero_quantity_is_rejected() {
        let f = fixture(10, 4500);

        let err = coordinator(&f)
            .create(Uuid::new_v4(), one_line(&f, 0, 4500))
            .await
            .unwrap_err();

        assert!(matches!(err, ReservationError::Validation(_)));
        assert_eq!(available(&f).await, 10);
    }

    #[tokio::test]
    async fn insufficient_seats_releases_earlier_lines() {
        let f = fixture(10, 4500);
        let other_category = Uuid::new_v4();
        let event_id = f
            .catalog
            .categories
            .lock()
            .unwrap()
            .get(&f.seat_category_id)
            .unwrap()
            .event_id;
        f.catalog.insert_category(SeatCategory {
            id: other_category,
            event_id,
            name: "Floor".into(),
            price_cents: 9000,
        });
        f.inventory.set_capacity(f.event_date_id, other_category, 1);

        let request = ReservationRequest {
            event_date_id: f.event_date_id,
            lines: vec![
                ReservationLine {
                    seat_category_id: f.seat_category_id,
                    quantity: 3,
                    quoted_price_cents: 4500,
                },
                ReservationLine {
                    seat_category_id: other_category,
                    quantity: 2,
                    quoted_price_cents: 9000,
                },
            ],
        };

        let err = coordinator(&f)
            .create(Uuid::new_v4(), request)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ReservationError::InsufficientSeats { seat_category_id } if seat_category_id == other_category
        ));
        assert_eq!(available(&f).await, 10);
        assert_eq!(
            f.inventory
                .available(f.event_date_id, other_category)
                .await
                .unwrap(),
            Some(1)
        );
        assert!(f.ledger.transactions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn last_seat_goes_to_exactly_one_of_two_racing_buyers() {
        let f = fixture(1, 4500);
        let coordinator = Arc::new(coordinator(&f));

        let mut handles = Vec::new();
        for _ in 0..2 {
            let coordinator = coordinator.clone();
            let request = one_line(&f, 1, 4500);
            handles.push(tokio::spawn(async move {
                coordinator.create(Uuid::new_v4(), request).await
            }));
        }

        let mut won = 0;
        let mut lost = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => won += 1,
                Err(ReservationError::InsufficientSeats { .. }) => lost += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!((won, lost), (1, 1));
        assert_eq!(available(&f).await, 0);
        assert_eq!(f.ledger.transactions.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn storage_failure_releases_held_seats() {
        let f = fixture(10, 4500);
        *f.ledger.fail_next_create.lock().unwrap() = true;

        let err = coordinator(&f)
            .create(Uuid::new_v4(), one_line(&f, 4, 4500))
            .await
            .unwrap_err();

        assert!(matches!(err, ReservationError::Storage(_)));
        assert_eq!(available(&f).await, 10);
    }

    #[tokio::test]
    async fn reference_collisions_are_retried() {
        let f = fixture(10, 4500);
        *f.ledger.reject_references.lock().unwrap() = 2;

        let outcome = coordinator(&f)
            .create(Uuid::new_v4(), one_line(&f, 1, 4500))
            .await
            .unwrap();

        assert!(outcome.transaction.reference.starts_with("TKT-"));
    }

    #[tokio::test]
    async fn reference_retries_are_bounded() {
        let f = fixture(10, 4500);
        *f.ledger.reject_references.lock().unwrap() = REFERENCE_ATTEMPTS;

        let err = coordinator(&f)
            .create(Uuid::new_v4(), one_line(&f, 1, 4500))
            .await
            .unwrap_err();

        assert!(matches!(err, ReservationError::ReferenceExhausted));
        // Held seats were compensated on the way out.
        assert_eq!(available(&f).await, 10);
    }

    #[tokio::test]
    async fn gateway_failure_leaves_transaction_unpaid_with_seats_held() {
        let f = fixture(10, 4500);
        *f.gateway.fail_next_session.lock().unwrap() = true;

        let err = coordinator(&f)
            .create(Uuid::new_v4(), one_line(&f, 2, 4500))
            .await
            .unwrap_err();

        assert!(matches!(err, ReservationError::Gateway(_)));
        // The transaction exists and its seats stay held until the sweep
        // expires it.
        let transactions = f.ledger.transactions.lock().unwrap();
        assert_eq!(transactions.len(), 1);
        assert!(transactions
            .values()
            .all(|t| t.status == TransactionStatus::Unpaid));
        drop(transactions);
        assert_eq!(available(&f).await, 8);
    }

    #[test]
    fn generated_references_use_the_restricted_alphabet() {
        for _ in 0..64 {
            let reference = generate_reference();
            let code = reference.strip_prefix("TKT-").unwrap();
            assert_eq!(code.len(), REFERENCE_LEN);
            assert!(code
                .bytes()
                .all(|b| REFERENCE_ALPHABET.contains(&b)));
        }
    }
}
