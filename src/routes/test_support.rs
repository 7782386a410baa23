use std::sync::Arc;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::config::{Config, StripeSettings};
use crate::db::mock_db::{InMemoryCatalog, InMemoryInventory, InMemoryLedger};
use crate::models::event::{EventDate, SeatCategory};
use crate::routes::auth::claims::{Claims, Role};
use crate::services::reservation::ReservationCoordinator;
use crate::services::settlement::SettlementProcessor;
use crate::services::smtp_mailer::MockMailer;
use crate::services::stripe::MockGateway;
use crate::utils::jwt::{create_jwt, JwtKeys};
use crate::AppState;

pub const TEST_JWT_SECRET: &str = "0123456789abcdef0123456789abcdef";
pub const TEST_PRICE_CENTS: i64 = 4500;

#[allow(dead_code)]
pub struct TestContext {
    pub state: AppState,
    pub catalog: InMemoryCatalog,
    pub inventory: InMemoryInventory,
    pub ledger: InMemoryLedger,
    pub gateway: MockGateway,
    pub mailer: Arc<MockMailer>,
    pub event_id: Uuid,
    pub event_date_id: Uuid,
    pub seat_category_id: Uuid,
}

fn test_config() -> Config {
    Config {
        database_url: "postgres://unused".into(),
        frontend_origin: "https://tickets.example.test".into(),
        stripe: StripeSettings {
            secret_key: "sk_test_dummy".into(),
            webhook_secret: "whsec_test".into(),
            currency: "usd".into(),
        },
        checkout_expiry_minutes: 30,
        sweep_interval_seconds: 60,
        jwt_issuer: "test-issuer".into(),
        jwt_audience: "test-audience".into(),
    }
}

/// App state wired entirely to in-memory fakes, seeded with one event that
/// has a single date and a 10-seat category.
pub fn context() -> TestContext {
    let catalog = InMemoryCatalog::new();
    let inventory = InMemoryInventory::new();
    let ledger = InMemoryLedger::new(inventory.clone());
    let gateway = MockGateway::new();
    let mailer = Arc::new(MockMailer::default());

    let event_id = Uuid::new_v4();
    let event_date_id = Uuid::new_v4();
    let seat_category_id = Uuid::new_v4();

    catalog.insert_category(SeatCategory {
        id: seat_category_id,
        event_id,
        name: "Balcony".into(),
        price_cents: TEST_PRICE_CENTS,
    });
    catalog.insert_date(EventDate {
        id: event_date_id,
        event_id,
        event_date: OffsetDateTime::now_utc().date(),
        start_time: time::Time::MIDNIGHT,
        end_time: time::Time::MIDNIGHT,
    });
    inventory.set_capacity(event_date_id, seat_category_id, 10);

    let config = Arc::new(test_config());
    let reservations = Arc::new(ReservationCoordinator::new(
        Arc::new(catalog.clone()),
        Arc::new(inventory.clone()),
        Arc::new(ledger.clone()),
        Arc::new(gateway.clone()),
        config.frontend_origin.clone(),
        config.checkout_expiry_minutes,
    ));
    let settlement = Arc::new(SettlementProcessor::new(
        Arc::new(ledger.clone()),
        mailer.clone(),
    ));

    let state = AppState {
        reservations,
        settlement,
        ledger: Arc::new(ledger.clone()),
        gateway: Arc::new(gateway.clone()),
        config,
        jwt_keys: Arc::new(JwtKeys::from_secret(TEST_JWT_SECRET).unwrap()),
    };

    TestContext {
        state,
        catalog,
        inventory,
        ledger,
        gateway,
        mailer,
        event_id,
        event_date_id,
        seat_category_id,
    }
}

pub fn bearer_for(state: &AppState, user_id: Uuid, role: Role) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        email: "buyer@example.test".into(),
        role,
        exp: (OffsetDateTime::now_utc().unix_timestamp() + 300) as usize,
        iss: String::new(),
        aud: String::new(),
    };
    create_jwt(
        claims,
        &state.jwt_keys,
        &state.config.jwt_issuer,
        &state.config.jwt_audience,
    )
    .unwrap()
}
