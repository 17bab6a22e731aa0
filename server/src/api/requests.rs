//! Order request endpoints
//!
//! Buyer side: intake and aggregate fetch (owner, live guest link, or
//! staff). Back office: status-filtered listing and explicit transitions.

use axum::Json;
use axum::extract::{Extension, Path, Query, State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::access::{self, AccessContext};
use crate::auth::Principal;
use crate::db;
use crate::error::{AppError, AppResponse, AppResult, ok};
use crate::orders;
use crate::orders::status::OrderStatus;
use crate::state::AppState;
use crate::util::now_millis;

#[derive(Debug, Deserialize)]
pub struct ItemPayload {
    pub category: String,
    pub quantity: i32,
    pub note: Option<String>,
    pub photo_ref: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRequestPayload {
    pub vehicle_vin: String,
    #[validate(email)]
    pub guest_email: Option<String>,
    pub items: Vec<ItemPayload>,
}

#[derive(Debug, Serialize)]
pub struct CreateRequestResponse {
    pub order: db::orders::OrderRequest,
    pub items: Vec<db::orders::OrderItem>,
    /// Capability link token, present once for guest submissions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magic_link_token: Option<String>,
}

/// POST /api/requests — submit a parts request
pub async fn create_request(
    State(state): State<AppState>,
    Extension(principal): Extension<Option<Principal>>,
    Json(payload): Json<CreateRequestPayload>,
) -> AppResult<Json<AppResponse<CreateRequestResponse>>> {
    payload.validate()?;

    let actor = match &principal {
        Some(p) => format!("owner:{}", p.user_id),
        None => "guest".to_string(),
    };

    let input = orders::intake::IntakeRequest {
        vehicle_vin: payload.vehicle_vin,
        guest_email: payload.guest_email,
        items: payload
            .items
            .into_iter()
            .map(|i| orders::intake::IntakeItem {
                category: i.category,
                quantity: i.quantity,
                note: i.note,
                photo_ref: i.photo_ref,
            })
            .collect(),
    };

    let result = orders::intake::create_request(
        &state.pool,
        principal.as_ref(),
        input,
        state.config.magic_link_ttl_millis,
        &actor,
    )
    .await?;

    Ok(ok(CreateRequestResponse {
        order: result.order,
        items: result.items,
        magic_link_token: result.magic_link_token,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    /// Guest capability token
    pub token: Option<String>,
}

/// Full order aggregate returned to participants
#[derive(Debug, Serialize)]
pub struct OrderAggregate {
    pub order: db::orders::OrderRequest,
    pub items: Vec<db::orders::OrderItem>,
    pub offers: Vec<db::offers::Offer>,
    pub chosen_offers: Vec<db::offers::ChosenOffer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipping_address: Option<db::checkout::ShippingAddress>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<db::checkout::Invoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shipment: Option<db::checkout::Shipment>,
    pub payments: Vec<db::payments::Payment>,
}

pub(crate) async fn load_aggregate(
    state: &AppState,
    order: db::orders::OrderRequest,
) -> AppResult<OrderAggregate> {
    let pool = &state.pool;
    Ok(OrderAggregate {
        items: db::orders::list_items(pool, &order.id).await?,
        offers: db::offers::list_for_order(pool, &order.id).await?,
        chosen_offers: db::offers::list_chosen_for_order(pool, &order.id).await?,
        shipping_address: db::checkout::find_address(pool, &order.id).await?,
        invoice: db::checkout::find_invoice(pool, &order.id).await?,
        shipment: db::checkout::find_shipment(pool, &order.id).await?,
        payments: db::payments::list_for_order(pool, &order.id).await?,
        order,
    })
}

/// Resolve the caller's context for one order, or fail with the
/// anonymous/authenticated denial split.
pub(crate) async fn resolve_participant(
    state: &AppState,
    order_id: &str,
    principal: Option<&Principal>,
    token: Option<&str>,
) -> AppResult<(db::orders::OrderRequest, AccessContext)> {
    let order = db::orders::find_by_id(&state.pool, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;

    let ctx = access::resolve(principal, token, &order, now_millis());
    if !ctx.is_participant() {
        return Err(access::denied(principal));
    }
    Ok((order, ctx))
}

/// GET /api/requests/{id} — fetch the full order aggregate
pub async fn fetch_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<AccessQuery>,
    Extension(principal): Extension<Option<Principal>>,
) -> AppResult<Json<AppResponse<OrderAggregate>>> {
    let (order, _ctx) =
        resolve_participant(&state, &id, principal.as_ref(), query.token.as_deref()).await?;

    Ok(ok(load_aggregate(&state, order).await?))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// GET /api/requests — staff listing, filterable by status
pub async fn list_requests(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<AppResponse<Vec<db::orders::OrderRequest>>>> {
    access::require_staff(&principal)?;

    let status = match query.status.as_deref() {
        Some(raw) => Some(
            OrderStatus::from_db(raw)
                .ok_or_else(|| AppError::Validation(format!("unknown status '{raw}'")))?,
        ),
        None => None,
    };

    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);

    let rows = db::orders::list_by_status(
        &state.pool,
        status.map(|s| s.as_db()),
        limit,
        offset,
    )
    .await?;

    Ok(ok(rows))
}

#[derive(Debug, Deserialize)]
pub struct SetStatusPayload {
    pub status: String,
}

/// POST /api/requests/{id}/status — explicit staff transition
pub async fn set_status(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Json(payload): Json<SetStatusPayload>,
) -> AppResult<Json<AppResponse<db::orders::OrderRequest>>> {
    let ctx = access::require_staff(&principal)?;

    let target = OrderStatus::from_db(&payload.status)
        .ok_or_else(|| AppError::Validation(format!("unknown status '{}'", payload.status)))?;

    let updated = orders::state_machine::transition(&state.pool, &id, target, &ctx.actor()).await?;
    Ok(ok(updated))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// GET /api/requests/{id}/audit — staff view of the order's audit trail
pub async fn audit_trail(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    Query(page): Query<PageQuery>,
) -> AppResult<Json<AppResponse<Vec<db::audit::AuditEntry>>>> {
    access::require_staff(&principal)?;

    db::orders::find_by_id(&state.pool, &id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {id} not found")))?;

    let limit = page.limit.unwrap_or(50).clamp(1, 200);
    let offset = page.offset.unwrap_or(0).max(0);

    let entries = db::audit::query(&state.pool, &id, limit, offset)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(ok(entries))
}

#[derive(Debug, Serialize)]
pub struct LinkResponse {
    pub claimed: u64,
}

/// POST /api/auth/link — adopt guest orders matching the caller's email
pub async fn link_guest_orders(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> AppResult<Json<AppResponse<LinkResponse>>> {
    let claimed = db::orders::claim_guest_orders(
        &state.pool,
        &principal.email,
        &principal.user_id,
        now_millis(),
    )
    .await?;

    if claimed > 0 {
        tracing::info!(
            user_id = %principal.user_id,
            claimed = claimed,
            "Guest orders linked to account"
        );
    }

    Ok(ok(LinkResponse { claimed }))
}
