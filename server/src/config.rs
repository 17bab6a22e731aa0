//! Server configuration

use rust_decimal::Decimal;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Fixed-rate shipping price table, read once at startup and injected into
/// the checkout path (no process-wide mutable settings).
#[derive(Debug, Clone)]
pub struct ShippingRates {
    /// Price for standard shipping
    pub standard: Decimal,
    /// Price for express shipping
    pub express: Decimal,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP port
    pub http_port: u16,
    /// Environment: development | staging | production
    pub environment: String,
    /// JWT secret shared with the identity provider
    pub jwt_secret: String,
    /// Payment provider identifier recorded on payment rows
    pub payment_provider: String,
    /// Payment webhook signing secret
    pub payment_webhook_secret: String,
    /// ISO currency code all offers and payments are denominated in
    pub currency: String,
    /// Guest capability link validity in milliseconds
    pub magic_link_ttl_millis: i64,
    /// Shop-wide shipping price table
    pub shipping: ShippingRates,
}

impl Config {
    /// Require a secret env var: must be set and non-empty in non-development environments.
    fn require_secret(name: &str, environment: &str) -> Result<String, BoxError> {
        let val = match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if environment != "development" {
                    return Err(format!("{name} must be set in {environment} environment").into());
                }
                format!("dev-{name}-not-for-production")
            }
        };
        if val.is_empty() && environment != "development" {
            return Err(format!("{name} must not be empty in {environment} environment").into());
        }
        Ok(val)
    }

    fn decimal_env(name: &str, default: &str) -> Result<Decimal, BoxError> {
        let raw = std::env::var(name).unwrap_or_else(|_| default.into());
        raw.parse::<Decimal>()
            .map_err(|e| format!("{name} is not a valid decimal: {e}").into())
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        Ok(Self {
            database_url: std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL must be set")?,
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            environment: environment.clone(),
            jwt_secret: Self::require_secret("JWT_SECRET", &environment)?,
            payment_provider: std::env::var("PAYMENT_PROVIDER")
                .unwrap_or_else(|_| "stripe".into()),
            payment_webhook_secret: Self::require_secret(
                "PAYMENT_WEBHOOK_SECRET",
                &environment,
            )?,
            currency: std::env::var("CURRENCY").unwrap_or_else(|_| "EUR".into()),
            magic_link_ttl_millis: std::env::var("MAGIC_LINK_TTL_HOURS")
                .ok()
                .and_then(|h| h.parse::<i64>().ok())
                .unwrap_or(14 * 24)
                * 60
                * 60
                * 1000,
            shipping: ShippingRates {
                standard: Self::decimal_env("SHIPPING_STANDARD_PRICE", "4.90")?,
                express: Self::decimal_env("SHIPPING_EXPRESS_PRICE", "9.90")?,
            },
        })
    }
}
