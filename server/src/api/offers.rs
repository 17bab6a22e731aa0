//! Offer ledger endpoints (back office)

use axum::Json;
use axum::extract::{Extension, Path, State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::Principal;
use crate::auth::access;
use crate::db;
use crate::error::{AppResponse, AppResult, ok};
use crate::orders::offers as ledger;
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateOfferPayload {
    #[validate(length(min = 1, max = 128))]
    pub manufacturer: String,
    pub unit_price: Decimal,
    pub quantity_available: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateOfferPayload {
    #[validate(length(min = 1, max = 128))]
    pub manufacturer: Option<String>,
    pub unit_price: Option<Decimal>,
    pub quantity_available: Option<i32>,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct OfferResponse {
    pub offer: db::offers::Offer,
    pub order: db::orders::OrderRequest,
}

/// POST /api/items/{id}/offers — attach a priced offer to an item
pub async fn create_offer(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(item_id): Path<String>,
    Json(payload): Json<CreateOfferPayload>,
) -> AppResult<Json<AppResponse<OfferResponse>>> {
    let ctx = access::require_staff(&principal)?;
    payload.validate()?;

    let result = ledger::create_offer(
        &state.pool,
        &item_id,
        ledger::NewOffer {
            manufacturer: payload.manufacturer,
            unit_price: payload.unit_price,
            quantity_available: payload.quantity_available,
            notes: payload.notes,
        },
        &ctx.actor(),
    )
    .await?;

    Ok(ok(OfferResponse {
        offer: result.offer,
        order: result.order,
    }))
}

/// PUT /api/offers/{id} — update offer fields, no lifecycle side effects
pub async fn update_offer(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(offer_id): Path<String>,
    Json(payload): Json<UpdateOfferPayload>,
) -> AppResult<Json<AppResponse<db::offers::Offer>>> {
    let ctx = access::require_staff(&principal)?;
    payload.validate()?;

    let offer = ledger::update_offer(
        &state.pool,
        &offer_id,
        ledger::OfferUpdate {
            manufacturer: payload.manufacturer,
            unit_price: payload.unit_price,
            quantity_available: payload.quantity_available,
            notes: payload.notes,
        },
        &ctx.actor(),
    )
    .await?;

    Ok(ok(offer))
}

#[derive(Debug, Serialize)]
pub struct RemovalResponse {
    pub order: db::orders::OrderRequest,
    pub item_reset: bool,
}

/// DELETE /api/offers/{id} — remove an offer, reversing the promotion when
/// it was the item's last one
pub async fn delete_offer(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(offer_id): Path<String>,
) -> AppResult<Json<AppResponse<RemovalResponse>>> {
    let ctx = access::require_staff(&principal)?;

    let result = ledger::delete_offer(&state.pool, &offer_id, &ctx.actor()).await?;

    Ok(ok(RemovalResponse {
        order: result.order,
        item_reset: result.item_reset,
    }))
}
