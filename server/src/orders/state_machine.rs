//! Canonical order status transitions
//!
//! Owns the `transition` operation and the transactional helpers shared with
//! the settlement path. Every mutation locks the order row first so all
//! writers on one order serialize; two independent orders never contend.

use sqlx::{PgPool, Postgres, Transaction};

use crate::db::orders::OrderRequest;
use crate::error::{AppError, AppResult};
use crate::orders::notify;
use crate::orders::status::{ItemOutcomeInput, ItemState, OrderStatus, plan_paid_outcomes};
use crate::util::now_millis;

/// Lock the order row for the duration of the transaction.
pub(crate) async fn lock_order(
    tx: &mut Transaction<'_, Postgres>,
    order_id: &str,
) -> Result<Option<OrderRequest>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_requests WHERE id = $1 FOR UPDATE")
        .bind(order_id)
        .fetch_optional(&mut **tx)
        .await
}

pub(crate) async fn set_status(
    tx: &mut Transaction<'_, Postgres>,
    order_id: &str,
    status: OrderStatus,
    now: i64,
) -> Result<OrderRequest, sqlx::Error> {
    sqlx::query_as(
        "UPDATE order_requests SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *",
    )
    .bind(status.as_db())
    .bind(now)
    .bind(order_id)
    .fetch_one(&mut **tx)
    .await
}

/// Bulk item-state update accompanying the PAID transition: items with a
/// chosen offer are purchased, valuated items without one are declined.
/// Runs inside the caller's transaction so the status write and the item
/// writes commit or roll back together.
pub(crate) async fn finalize_item_outcomes(
    tx: &mut Transaction<'_, Postgres>,
    order_id: &str,
    now: i64,
) -> AppResult<()> {
    let rows: Vec<(String, String, bool)> = sqlx::query_as(
        "SELECT i.id, i.state,
                EXISTS (SELECT 1 FROM chosen_offers c WHERE c.order_item_id = i.id)
         FROM order_items i WHERE i.order_id = $1",
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?;

    let inputs = rows
        .into_iter()
        .map(|(item_id, state, has_chosen_offer)| {
            ItemState::from_db(&state)
                .map(|state| ItemOutcomeInput {
                    item_id,
                    state,
                    has_chosen_offer,
                })
                .ok_or_else(|| {
                    AppError::Internal(format!("order item holds unknown state '{state}'"))
                })
        })
        .collect::<AppResult<Vec<_>>>()?;

    for (item_id, outcome) in plan_paid_outcomes(&inputs) {
        sqlx::query("UPDATE order_items SET state = $1, updated_at = $2 WHERE id = $3")
            .bind(outcome.as_db())
            .bind(now)
            .bind(&item_id)
            .execute(&mut **tx)
            .await?;
    }

    Ok(())
}

fn parse_status(order: &OrderRequest) -> AppResult<OrderStatus> {
    OrderStatus::from_db(&order.status).ok_or_else(|| {
        AppError::Internal(format!(
            "order {} holds unknown status '{}'",
            order.id, order.status
        ))
    })
}

/// Execute an explicit status transition (staff override path).
///
/// Validates the requested edge against the transition table, applies the
/// status write and — for `PAID` — the bulk item finalization in one
/// transaction, then emits notification and audit records.
pub async fn transition(
    pool: &PgPool,
    order_id: &str,
    target: OrderStatus,
    actor: &str,
) -> AppResult<OrderRequest> {
    let now = now_millis();

    let mut tx = pool.begin().await?;

    let order = lock_order(&mut tx, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;

    let current = parse_status(&order)?;
    if !current.can_transition_to(target) {
        return Err(AppError::InvalidTransition {
            from: current.as_db().to_string(),
            to: target.as_db().to_string(),
        });
    }

    if target == OrderStatus::Paid {
        finalize_item_outcomes(&mut tx, order_id, now).await?;
    }

    let updated = set_status(&mut tx, order_id, target, now).await?;

    tx.commit().await?;

    let detail = serde_json::json!({ "from": current.as_db(), "to": target.as_db() });
    notify::emit(
        pool,
        &updated,
        "ORDER_STATUS_CHANGED",
        "status_transition",
        actor,
        Some(&detail),
    )
    .await;

    tracing::info!(
        order_id = %order_id,
        from = current.as_db(),
        to = target.as_db(),
        actor = actor,
        "Order status transition"
    );

    Ok(updated)
}
