//! Checkout and payment-initiation endpoints (buyer side)

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use serde::Deserialize;
use validator::Validate;

use crate::auth::Principal;
use crate::db;
use crate::error::{AppError, AppResponse, AppResult, ok};
use crate::orders;
use crate::orders::checkout::{
    AddressFields, CheckoutSubmission, InvoiceFields, OfferSelection, ShippingMethod,
};
use crate::state::AppState;

use super::requests::{AccessQuery, OrderAggregate, load_aggregate, resolve_participant};

#[derive(Debug, Deserialize, Validate)]
pub struct AddressPayload {
    #[validate(length(min = 1, max = 128))]
    pub recipient: String,
    #[validate(length(min = 1, max = 256))]
    pub street: String,
    #[validate(length(min = 1, max = 128))]
    pub city: String,
    #[validate(length(min = 1, max = 32))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 64))]
    pub country: String,
    pub phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct InvoicePayload {
    #[validate(length(min = 1, max = 128))]
    pub company: String,
    pub vat_id: Option<String>,
    #[validate(length(min = 1, max = 256))]
    pub street: String,
    #[validate(length(min = 1, max = 128))]
    pub city: String,
    #[validate(length(min = 1, max = 32))]
    pub postal_code: String,
    #[validate(length(min = 2, max = 64))]
    pub country: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectionPayload {
    pub order_item_id: String,
    pub offer_id: String,
    #[serde(default = "default_include")]
    pub include: bool,
}

fn default_include() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutPayload {
    #[validate(nested)]
    pub address: AddressPayload,
    #[validate(nested)]
    pub invoice: Option<InvoicePayload>,
    pub shipping_method: String,
    pub selected_offers: Vec<SelectionPayload>,
}

/// POST /api/requests/{id}/checkout — submit the checkout selection
pub async fn submit_checkout(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AccessQuery>,
    Extension(principal): Extension<Option<Principal>>,
    Json(payload): Json<CheckoutPayload>,
) -> AppResult<Json<AppResponse<OrderAggregate>>> {
    payload.validate()?;

    let (_order, ctx) =
        resolve_participant(&state, &id, principal.as_ref(), query.token.as_deref()).await?;

    let method = ShippingMethod::from_db(&payload.shipping_method.to_uppercase())
        .ok_or_else(|| {
            AppError::Validation(format!(
                "unknown shipping method '{}'",
                payload.shipping_method
            ))
        })?;

    let submission = CheckoutSubmission {
        address: AddressFields {
            recipient: payload.address.recipient,
            street: payload.address.street,
            city: payload.address.city,
            postal_code: payload.address.postal_code,
            country: payload.address.country,
            phone: payload.address.phone,
        },
        invoice: payload.invoice.map(|inv| InvoiceFields {
            company: inv.company,
            vat_id: inv.vat_id,
            street: inv.street,
            city: inv.city,
            postal_code: inv.postal_code,
            country: inv.country,
        }),
        shipping_method: method,
        selected_offers: payload
            .selected_offers
            .into_iter()
            .map(|s| OfferSelection {
                order_item_id: s.order_item_id,
                offer_id: s.offer_id,
                include: s.include,
            })
            .collect(),
    };

    let order = orders::checkout::checkout(
        &state.pool,
        &state.config.shipping,
        &id,
        submission,
        &ctx.actor(),
    )
    .await?;

    Ok(ok(load_aggregate(&state, order).await?))
}

/// POST /api/requests/{id}/pay — open a payment attempt for the order
pub async fn initiate_payment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AccessQuery>,
    Extension(principal): Extension<Option<Principal>>,
) -> AppResult<Json<AppResponse<db::payments::Payment>>> {
    let (_order, ctx) =
        resolve_participant(&state, &id, principal.as_ref(), query.token.as_deref()).await?;

    let payment = orders::billing::initiate_payment(
        &state.pool,
        &state.config.payment_provider,
        &state.config.currency,
        &id,
        &ctx.actor(),
    )
    .await?;

    Ok(ok(payment))
}
