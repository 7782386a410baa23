use std::env;

pub struct StripeSettings {
    pub secret_key: String,
    pub webhook_secret: String,
    pub currency: String,
}

pub struct Config {
    pub database_url: String,
    pub frontend_origin: String,
    pub stripe: StripeSettings,
    /// Minutes an unpaid transaction keeps its seats before the sweep
    /// reclaims them. Matches the checkout session expiry.
    pub checkout_expiry_minutes: i64,
    pub sweep_interval_seconds: u64,
    pub jwt_issuer: String,
    pub jwt_audience: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok(); // Load .env file

        let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let frontend_origin = env::var("FRONTEND_ORIGIN").expect("FRONTEND_ORIGIN must be set");

        let stripe = StripeSettings {
            secret_key: env::var("STRIPE_SECRET_KEY").expect("STRIPE_SECRET_KEY must be set"),
            webhook_secret: env::var("STRIPE_WEBHOOK_SECRET")
                .expect("STRIPE_WEBHOOK_SECRET must be set"),
            currency: env::var("STRIPE_CURRENCY").unwrap_or_else(|_| "usd".to_string()),
        };

        let checkout_expiry_minutes = env::var("CHECKOUT_EXPIRY_MINUTES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(30);

        let sweep_interval_seconds = env::var("SWEEP_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(60);

        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "boxoffice".to_string());
        let jwt_audience = env::var("JWT_AUDIENCE").unwrap_or_else(|_| "boxoffice-web".to_string());

        Config {
            database_url,
            frontend_origin,
            stripe,
            checkout_expiry_minutes,
            sweep_interval_seconds,
            jwt_issuer,
            jwt_audience,
        }
    }
}
