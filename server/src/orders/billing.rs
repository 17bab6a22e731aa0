//! Payment initiation
//!
//! Opens a provider checkout session for an order that finished checkout.
//! The binding total is derived server-side from the chosen offers and the
//! shipment; the webhook later verifies the provider confirmation against
//! the amount stored here.

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::db;
use crate::db::payments::Payment;
use crate::error::{AppError, AppResult};
use crate::orders::state_machine::lock_order;
use crate::orders::status::OrderStatus;
use crate::util::{generate_token, new_id, now_millis};

/// One priced line of the order total: chosen offer unit price times the
/// requested quantity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PricedLine {
    pub unit_price: Decimal,
    pub quantity: i32,
}

/// Sum the chosen lines and add the shipment price.
pub fn compute_total(lines: &[PricedLine], shipping_price: Decimal) -> Decimal {
    lines
        .iter()
        .map(|l| l.unit_price * Decimal::from(l.quantity))
        .sum::<Decimal>()
        + shipping_price
}

/// Open a payment attempt for an order in `CHECKOUT`.
///
/// Several attempts may coexist (abandoned sessions stay `INIT`); the
/// settlement path consumes at most one of them. Requires at least one
/// chosen offer, otherwise there is nothing to pay for.
pub async fn initiate_payment(
    pool: &PgPool,
    provider: &str,
    currency: &str,
    order_id: &str,
    actor: &str,
) -> AppResult<Payment> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    let order = lock_order(&mut tx, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;

    if order.status != OrderStatus::Checkout.as_db() {
        return Err(AppError::InvalidTransition {
            from: order.status.clone(),
            to: OrderStatus::Paid.as_db().to_string(),
        });
    }

    let lines: Vec<PricedLine> = sqlx::query_as(
        "SELECT o.unit_price, i.quantity
         FROM chosen_offers c
         JOIN offers o ON o.id = c.offer_id
         JOIN order_items i ON i.id = c.order_item_id
         WHERE i.order_id = $1",
    )
    .bind(order_id)
    .fetch_all(&mut *tx)
    .await?;

    if lines.is_empty() {
        return Err(AppError::Validation(
            "order has no chosen offers to pay for".into(),
        ));
    }

    let shipment: Option<(Decimal,)> =
        sqlx::query_as("SELECT price FROM shipments WHERE order_id = $1")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?;
    let shipping_price = shipment.map(|(p,)| p).unwrap_or(Decimal::ZERO);

    let total = compute_total(&lines, shipping_price);
    let session_id = format!("ps_{}", generate_token());

    let payment: Payment = sqlx::query_as(
        "INSERT INTO payments (id, order_id, provider, session_id, amount, currency, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, 'INIT', $7, $7)
         RETURNING *",
    )
    .bind(new_id())
    .bind(order_id)
    .bind(provider)
    .bind(&session_id)
    .bind(total)
    .bind(currency)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    let detail = serde_json::json!({
        "payment_id": payment.id,
        "amount": payment.amount,
        "currency": payment.currency,
    });
    if let Err(e) =
        db::audit::log(pool, order_id, "payment_initiated", actor, Some(&detail), now).await
    {
        tracing::warn!(order_id = %order_id, error = %e, "Failed to append audit entry");
    }

    tracing::info!(
        order_id = %order_id,
        payment_id = %payment.id,
        amount = %payment.amount,
        "Payment attempt opened"
    );

    Ok(payment)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(price: &str, qty: i32) -> PricedLine {
        PricedLine {
            unit_price: price.parse().unwrap(),
            quantity: qty,
        }
    }

    #[test]
    fn total_sums_lines_times_quantity_plus_shipping() {
        let lines = vec![line("19.90", 2), line("120.00", 1)];
        let total = compute_total(&lines, "4.90".parse().unwrap());
        assert_eq!(total, "164.70".parse::<Decimal>().unwrap());
    }

    #[test]
    fn total_of_no_lines_is_just_shipping() {
        assert_eq!(
            compute_total(&[], "9.90".parse().unwrap()),
            "9.90".parse::<Decimal>().unwrap()
        );
    }
}
