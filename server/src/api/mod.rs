//! API routes for parts-server

pub mod checkout;
pub mod health;
pub mod offers;
pub mod requests;
pub mod webhook;

use axum::routing::{get, post, put};
use axum::{Router, middleware};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::middleware::{auth_middleware, optional_auth_middleware};
use crate::state::AppState;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Buyer-facing routes: anonymous allowed, per-order access resolved
    // against ownership or the capability token
    let buyer = Router::new()
        .route("/api/requests", post(requests::create_request))
        .route("/api/requests/{id}", get(requests::fetch_request))
        .route(
            "/api/requests/{id}/checkout",
            post(checkout::submit_checkout),
        )
        .route("/api/requests/{id}/pay", post(checkout::initiate_payment))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            optional_auth_middleware,
        ));

    // Authenticated routes (staff checks happen per handler)
    let authed = Router::new()
        .route("/api/requests", get(requests::list_requests))
        .route("/api/requests/{id}/status", post(requests::set_status))
        .route("/api/requests/{id}/audit", get(requests::audit_trail))
        .route("/api/items/{id}/offers", post(offers::create_offer))
        .route(
            "/api/offers/{id}",
            put(offers::update_offer).delete(offers::delete_offer),
        )
        .route("/api/auth/link", post(requests::link_guest_orders))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware));

    // Payment webhook (signature-verified, raw body)
    let webhook = Router::new().route("/api/payments/webhook", post(webhook::handle_webhook));

    Router::new()
        .route("/health", get(health::health_check))
        .merge(buyer)
        .merge(authed)
        .merge(webhook)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
