//! Offer ledger
//!
//! Staff-priced fulfillment options per requested part line. Creating the
//! first offer promotes item and order; deleting the last one reverses that
//! promotion. Both sides run as one transaction with the state writes so a
//! concurrent reader never observes a half-applied pair.

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::db;
use crate::db::offers::Offer;
use crate::db::orders::OrderRequest;
use crate::error::{AppError, AppResult};
use crate::orders::notify;
use crate::orders::state_machine::{lock_order, set_status};
use crate::orders::status::{ItemState, OrderStatus};
use crate::util::{new_id, now_millis};

/// Fields accepted for a new offer
#[derive(Debug, Clone)]
pub struct NewOffer {
    pub manufacturer: String,
    pub unit_price: Decimal,
    pub quantity_available: i32,
    pub notes: Option<String>,
}

/// Optional fields for a pure offer update (no state-machine side effects)
#[derive(Debug, Clone, Default)]
pub struct OfferUpdate {
    pub manufacturer: Option<String>,
    pub unit_price: Option<Decimal>,
    pub quantity_available: Option<i32>,
    pub notes: Option<String>,
}

/// Result of a ledger mutation: the offer plus the order it (possibly)
/// re-staged, so callers can report the new item/order status.
#[derive(Debug)]
pub struct OfferMutation {
    pub offer: Offer,
    pub order: OrderRequest,
}

/// Result of an offer deletion
#[derive(Debug)]
pub struct OfferRemoval {
    pub order: OrderRequest,
    /// true when the deleted offer was the item's last and the promotion
    /// was reversed (item REQUESTED, order PENDING)
    pub item_reset: bool,
}

/// States applied when an item loses its last offer. The order target is
/// `PENDING` regardless of what sibling items hold; the whole order goes
/// back to review.
fn demotion_after_delete(remaining_offers: i64) -> Option<(ItemState, OrderStatus)> {
    (remaining_offers == 0).then_some((ItemState::Requested, OrderStatus::Pending))
}

/// An offer the buyer chose at checkout is referenced by a `chosen_offers`
/// row and must not be deleted; the buyer has to re-checkout first.
fn ensure_not_chosen(is_chosen: bool, offer_id: &str) -> AppResult<()> {
    if is_chosen {
        return Err(AppError::Validation(format!(
            "offer {offer_id} was chosen at checkout and cannot be deleted"
        )));
    }
    Ok(())
}

fn validate_new_offer(input: &NewOffer) -> AppResult<()> {
    if input.manufacturer.trim().is_empty() {
        return Err(AppError::Validation("manufacturer must not be empty".into()));
    }
    if input.unit_price <= Decimal::ZERO {
        return Err(AppError::Validation("unit_price must be positive".into()));
    }
    if input.quantity_available <= 0 {
        return Err(AppError::Validation(
            "quantity_available must be positive".into(),
        ));
    }
    Ok(())
}

/// Create an offer for an order item.
///
/// Atomic unit: insert the offer, set the item to `VALUATED`, and promote a
/// `PENDING` parent order to `VALUATED`. The promotion is the state
/// machine's `PENDING -> VALUATED` edge and emits accordingly.
pub async fn create_offer(
    pool: &PgPool,
    order_item_id: &str,
    input: NewOffer,
    actor: &str,
) -> AppResult<OfferMutation> {
    validate_new_offer(&input)?;

    let now = now_millis();
    let mut tx = pool.begin().await?;

    let item = db::orders::find_item(pool, order_item_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order item {order_item_id} not found")))?;

    let order = lock_order(&mut tx, &item.order_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("order {} missing for item", item.order_id)))?;

    let offer: Offer = sqlx::query_as(
        "INSERT INTO offers (id, order_item_id, manufacturer, unit_price, quantity_available, notes, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
         RETURNING *",
    )
    .bind(new_id())
    .bind(order_item_id)
    .bind(&input.manufacturer)
    .bind(input.unit_price)
    .bind(input.quantity_available)
    .bind(&input.notes)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query("UPDATE order_items SET state = $1, updated_at = $2 WHERE id = $3")
        .bind(ItemState::Valuated.as_db())
        .bind(now)
        .bind(order_item_id)
        .execute(&mut *tx)
        .await?;

    let promoted = order.status == OrderStatus::Pending.as_db();
    let order = if promoted {
        set_status(&mut tx, &order.id, OrderStatus::Valuated, now).await?
    } else {
        order
    };

    tx.commit().await?;

    let detail = serde_json::json!({
        "offer_id": offer.id,
        "order_item_id": order_item_id,
        "unit_price": offer.unit_price,
    });
    if let Err(e) = db::audit::log(pool, &order.id, "offer_created", actor, Some(&detail), now).await
    {
        tracing::warn!(order_id = %order.id, error = %e, "Failed to append audit entry");
    }

    if promoted {
        let detail = serde_json::json!({ "from": "PENDING", "to": "VALUATED" });
        notify::emit(
            pool,
            &order,
            "ORDER_STATUS_CHANGED",
            "status_transition",
            actor,
            Some(&detail),
        )
        .await;
    }

    tracing::info!(
        order_id = %order.id,
        order_item_id = order_item_id,
        offer_id = %offer.id,
        promoted = promoted,
        "Offer created"
    );

    Ok(OfferMutation { offer, order })
}

/// Pure field update; touches neither item nor order state.
pub async fn update_offer(
    pool: &PgPool,
    offer_id: &str,
    update: OfferUpdate,
    actor: &str,
) -> AppResult<Offer> {
    if let Some(price) = update.unit_price {
        if price <= Decimal::ZERO {
            return Err(AppError::Validation("unit_price must be positive".into()));
        }
    }
    if let Some(qty) = update.quantity_available {
        if qty <= 0 {
            return Err(AppError::Validation(
                "quantity_available must be positive".into(),
            ));
        }
    }

    let now = now_millis();
    let offer: Offer = sqlx::query_as(
        "UPDATE offers SET
            manufacturer = COALESCE($1, manufacturer),
            unit_price = COALESCE($2, unit_price),
            quantity_available = COALESCE($3, quantity_available),
            notes = COALESCE($4, notes),
            updated_at = $5
         WHERE id = $6
         RETURNING *",
    )
    .bind(update.manufacturer)
    .bind(update.unit_price)
    .bind(update.quantity_available)
    .bind(update.notes)
    .bind(now)
    .bind(offer_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Offer {offer_id} not found")))?;

    if let Some(item) = db::orders::find_item(pool, &offer.order_item_id).await? {
        let detail = serde_json::json!({ "offer_id": offer.id });
        if let Err(e) =
            db::audit::log(pool, &item.order_id, "offer_updated", actor, Some(&detail), now).await
        {
            tracing::warn!(offer_id = %offer.id, error = %e, "Failed to append audit entry");
        }
    }

    Ok(offer)
}

/// Delete an offer.
///
/// When the item's last offer goes away the promotion is reversed: the item
/// returns to `REQUESTED` and the whole order to `PENDING` — unconditionally,
/// even while sibling items still carry offers (re-review-everything
/// semantics). The downgrade is idempotent, so two staff racing on the last
/// offers of two items apply it safely; it still rides the same transaction
/// as the item write.
pub async fn delete_offer(pool: &PgPool, offer_id: &str, actor: &str) -> AppResult<OfferRemoval> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    let ids: Option<(String, String)> = sqlx::query_as(
        "SELECT o.order_item_id, i.order_id
         FROM offers o JOIN order_items i ON i.id = o.order_item_id
         WHERE o.id = $1",
    )
    .bind(offer_id)
    .fetch_optional(&mut *tx)
    .await?;

    let (order_item_id, order_id) =
        ids.ok_or_else(|| AppError::NotFound(format!("Offer {offer_id} not found")))?;

    let order = lock_order(&mut tx, &order_id)
        .await?
        .ok_or_else(|| AppError::Internal(format!("order {order_id} missing for offer")))?;

    let (is_chosen,): (bool,) =
        sqlx::query_as("SELECT EXISTS (SELECT 1 FROM chosen_offers WHERE offer_id = $1)")
            .bind(offer_id)
            .fetch_one(&mut *tx)
            .await?;
    ensure_not_chosen(is_chosen, offer_id)?;

    // Re-check under the lock: a concurrent delete may have won.
    let deleted = sqlx::query("DELETE FROM offers WHERE id = $1")
        .bind(offer_id)
        .execute(&mut *tx)
        .await?;
    if deleted.rows_affected() == 0 {
        return Err(AppError::NotFound(format!("Offer {offer_id} not found")));
    }

    let (remaining,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM offers WHERE order_item_id = $1")
            .bind(&order_item_id)
            .fetch_one(&mut *tx)
            .await?;

    let demotion = demotion_after_delete(remaining);
    let item_reset = demotion.is_some();
    let prior_status = order.status.clone();
    let order = match demotion {
        Some((item_state, order_status)) => {
            sqlx::query("UPDATE order_items SET state = $1, updated_at = $2 WHERE id = $3")
                .bind(item_state.as_db())
                .bind(now)
                .bind(&order_item_id)
                .execute(&mut *tx)
                .await?;

            set_status(&mut tx, &order_id, order_status, now).await?
        }
        None => order,
    };

    tx.commit().await?;

    let detail = serde_json::json!({
        "offer_id": offer_id,
        "order_item_id": order_item_id,
        "item_reset": item_reset,
    });
    if let Err(e) = db::audit::log(pool, &order_id, "offer_deleted", actor, Some(&detail), now).await
    {
        tracing::warn!(order_id = %order_id, error = %e, "Failed to append audit entry");
    }

    if item_reset && prior_status != OrderStatus::Pending.as_db() {
        let detail = serde_json::json!({ "from": prior_status, "to": "PENDING" });
        notify::emit(
            pool,
            &order,
            "ORDER_STATUS_CHANGED",
            "status_transition",
            actor,
            Some(&detail),
        )
        .await;
    }

    tracing::info!(
        order_id = %order_id,
        offer_id = offer_id,
        item_reset = item_reset,
        "Offer deleted"
    );

    Ok(OfferRemoval { order, item_reset })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_offer(price: &str, qty: i32) -> NewOffer {
        NewOffer {
            manufacturer: "Bosch".to_string(),
            unit_price: price.parse().unwrap(),
            quantity_available: qty,
            notes: None,
        }
    }

    #[test]
    fn rejects_non_positive_price_and_quantity() {
        assert!(matches!(
            validate_new_offer(&new_offer("0", 1)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_new_offer(&new_offer("-10.00", 1)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_new_offer(&new_offer("10.00", 0)),
            Err(AppError::Validation(_))
        ));
        assert!(validate_new_offer(&new_offer("10.00", 1)).is_ok());
    }

    #[test]
    fn chosen_offer_cannot_be_deleted() {
        assert!(matches!(
            ensure_not_chosen(true, "offer-1"),
            Err(AppError::Validation(_))
        ));
        assert!(ensure_not_chosen(false, "offer-1").is_ok());
    }

    #[test]
    fn deleting_last_offer_downgrades_item_and_whole_order() {
        // sibling items' states are deliberately not an input here: losing
        // the last offer on any item sends the whole order back to PENDING
        assert_eq!(
            demotion_after_delete(0),
            Some((ItemState::Requested, OrderStatus::Pending))
        );
        assert_eq!(demotion_after_delete(1), None);
        assert_eq!(demotion_after_delete(3), None);
    }

    #[test]
    fn rejects_blank_manufacturer() {
        let mut offer = new_offer("10.00", 1);
        offer.manufacturer = "  ".to_string();
        assert!(matches!(
            validate_new_offer(&offer),
            Err(AppError::Validation(_))
        ));
    }
}
