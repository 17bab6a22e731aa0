//! parts-server — vehicle parts request service
//!
//! Long-running service that:
//! - Receives buyer part requests (authenticated or guest via magic link)
//! - Lets staff attach priced offers and drive the order lifecycle
//! - Accepts buyer checkout submissions and payment-provider webhooks
//! - Emits notification and audit records for every state change

mod api;
mod auth;
mod config;
mod db;
mod error;
mod orders;
mod state;
mod util;

use config::Config;
use state::AppState;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parts_server=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting parts-server (env: {})", config.environment);

    // Initialize application state (pool + migrations)
    let state = AppState::new(&config).await?;

    let app = api::create_router(state);

    let addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("parts-server HTTP listening on {addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
