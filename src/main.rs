use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderValue;
use axum::http::Method;
use axum::{
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use boxoffice_backend::config::Config;
use boxoffice_backend::db::catalog_repository::CatalogRepository;
use boxoffice_backend::db::inventory_repository::InventoryRepository;
use boxoffice_backend::db::ledger_repository::LedgerRepository;
use boxoffice_backend::db::postgres_catalog_repository::PostgresCatalogRepository;
use boxoffice_backend::db::postgres_inventory_repository::PostgresInventoryRepository;
use boxoffice_backend::db::postgres_ledger_repository::PostgresLedgerRepository;
use boxoffice_backend::responses::JsonResponse;
use boxoffice_backend::routes::{bookings, reservations, stripe as stripe_routes};
use boxoffice_backend::services::reservation::ReservationCoordinator;
use boxoffice_backend::services::settlement::SettlementProcessor;
use boxoffice_backend::services::smtp_mailer::SmtpMailer;
use boxoffice_backend::services::stripe::{LiveStripeGateway, PaymentGateway};
use boxoffice_backend::utils::jwt::JwtKeys;
use boxoffice_backend::{worker, AppState};

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).unwrap();

    let rate_limit_ms: u64 = std::env::var("RATE_LIMITER_MILLISECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        // Default: 200ms/token (~5 req/sec)
        .unwrap_or(200);
    let rate_limit_burst: u32 = std::env::var("RATE_LIMITER_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(20);
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(rate_limit_ms)
            .burst_size(rate_limit_burst)
            .use_headers()
            .error_handler(|_err| {
                JsonResponse::too_many_requests(
                    "Too many requests. Please wait a moment and try again.",
                )
                .into_response()
            })
            .finish()
            .unwrap(),
    );

    // Background task to cleanup old IPs
    let governor_limiter = governor_conf.limiter().clone();
    std::thread::spawn(move || {
        let interval = std::time::Duration::from_secs(60);
        loop {
            std::thread::sleep(interval);
            governor_limiter.retain_recent();
        }
    });

    let config = Arc::new(Config::from_env());

    let pg_pool = establish_connection(&config.database_url).await;
    let catalog = Arc::new(PostgresCatalogRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn CatalogRepository>;
    let inventory = Arc::new(PostgresInventoryRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn InventoryRepository>;
    let ledger = Arc::new(PostgresLedgerRepository {
        pool: pg_pool.clone(),
    }) as Arc<dyn LedgerRepository>;

    let gateway =
        Arc::new(LiveStripeGateway::from_settings(&config.stripe)) as Arc<dyn PaymentGateway>;
    let mailer = Arc::new(SmtpMailer::new().expect("Failed to initialize mailer"));
    let jwt_keys = Arc::new(JwtKeys::from_env().expect("Invalid JWT secret"));

    let reservations = Arc::new(ReservationCoordinator::new(
        catalog,
        inventory,
        ledger.clone(),
        gateway.clone(),
        config.frontend_origin.clone(),
        config.checkout_expiry_minutes,
    ));
    let settlement = Arc::new(SettlementProcessor::new(ledger.clone(), mailer));

    let state = AppState {
        reservations,
        settlement,
        ledger,
        gateway,
        config: config.clone(),
        jwt_keys,
    };
    let state_for_worker = state.clone();

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_origin.parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE])
        .allow_credentials(true);

    let booking_routes = Router::new()
        .route("/", get(bookings::list))
        .route("/cancel", post(bookings::cancel));

    let app = Router::new()
        .route("/", get(root))
        .route("/api/reservations", post(reservations::create))
        // No auth and no CSRF: Stripe authenticates with its signature.
        .route("/api/stripe/webhook", post(stripe_routes::webhook))
        .nest("/api/bookings", booking_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: governor_conf.clone(),
        })
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let addr = SocketAddr::from(([127, 0, 0, 1], 3000));

    worker::start_background_workers(state_for_worker).await;

    let listener = TcpListener::bind(addr).await.unwrap();
    println!("Running at http://{}", addr);
    axum::serve(listener, make_service).await.unwrap();
}

/// A simple root route.
async fn root() -> Response {
    JsonResponse::success("Box office is open").into_response()
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> PgPool {
    let pool = PgPool::connect(database_url)
        .await
        .expect("Failed to connect to the database");

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .expect("Failed to verify database connection");

    info!("✅ Successfully connected to the database");
    pool
}
