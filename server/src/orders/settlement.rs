//! Settlement reconciler
//!
//! Consumes a verified payment-provider confirmation and advances the order
//! to its paid terminal sub-state exactly once. Every precondition fails
//! closed: a violated step leaves all rows untouched, so arbitrary webhook
//! redelivery is safe. The INIT-row lookup doubles as the idempotency check —
//! a redelivered confirmation finds no INIT payment and stops at step one.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sqlx::PgPool;

use crate::db::orders::OrderRequest;
use crate::db::payments::Payment;
use crate::error::{AppError, AppResult};
use crate::orders::notify;
use crate::orders::state_machine::{finalize_item_outcomes, lock_order, set_status};
use crate::orders::status::OrderStatus;
use crate::util::now_millis;

/// Validated provider confirmation, produced by the webhook boundary
#[derive(Debug, Clone)]
pub struct SettlementEvent {
    pub session_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub payload: serde_json::Value,
}

/// Convert a major-unit amount to minor units, requiring exactness.
/// `100.00` becomes `10000`; anything with sub-cent precision is rejected.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    let scaled = amount * Decimal::ONE_HUNDRED;
    if !scaled.fract().is_zero() {
        return None;
    }
    scaled.to_i64()
}

/// A removed order is never resurrected by a late confirmation; the
/// provider sees the same answer as for an unknown session.
fn ensure_settleable(order: &OrderRequest) -> AppResult<()> {
    if order.status == OrderStatus::Removed.as_db() {
        return Err(AppError::PaymentNotFound);
    }
    Ok(())
}

/// Compare the provider confirmation against the stored payment: the minor
/// unit amounts must be equal exactly and the currencies must match
/// (case-insensitive). Returns the expected minor amount on success.
fn verify_confirmation(payment: &Payment, event: &SettlementEvent) -> AppResult<i64> {
    let expected_minor = to_minor_units(payment.amount).ok_or_else(|| {
        AppError::Internal(format!(
            "payment {} amount {} is not representable in minor units",
            payment.id, payment.amount
        ))
    })?;
    if event.amount_minor != expected_minor
        || !event.currency.eq_ignore_ascii_case(&payment.currency)
    {
        return Err(AppError::AmountMismatch);
    }
    Ok(expected_minor)
}

/// Reconcile a provider confirmation against its pending payment.
pub async fn settle(
    pool: &PgPool,
    provider: &str,
    event: SettlementEvent,
) -> AppResult<OrderRequest> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    // Step 1: exactly one INIT payment for this session. A second delivery
    // of the same confirmation finds none and stops here.
    let payment: Payment = sqlx::query_as(
        "SELECT * FROM payments
         WHERE session_id = $1 AND provider = $2 AND status = 'INIT'
         FOR UPDATE",
    )
    .bind(&event.session_id)
    .bind(provider)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(AppError::PaymentNotFound)?;

    let order = lock_order(&mut tx, &payment.order_id)
        .await?
        .ok_or_else(|| {
            AppError::Internal(format!("order {} missing for payment", payment.order_id))
        })?;

    if let Err(e) = ensure_settleable(&order) {
        tracing::warn!(
            order_id = %order.id,
            session_id = %event.session_id,
            "Confirmation for a removed order, refusing settlement"
        );
        return Err(e);
    }

    // Step 2: the confirmed amount must equal the stored amount exactly.
    let expected_minor = verify_confirmation(&payment, &event)?;

    // Step 3: settle payment, order, and item outcomes atomically.
    sqlx::query(
        "UPDATE payments SET status = 'SUCCEEDED', raw_payload = $1, updated_at = $2 WHERE id = $3",
    )
    .bind(&event.payload)
    .bind(now)
    .bind(&payment.id)
    .execute(&mut *tx)
    .await?;

    finalize_item_outcomes(&mut tx, &payment.order_id, now).await?;

    let from = order.status.clone();
    let updated = set_status(&mut tx, &payment.order_id, OrderStatus::Paid, now).await?;

    tx.commit().await?;

    // Step 4: notification + audit referencing order and amount.
    let detail = serde_json::json!({
        "from": from,
        "to": OrderStatus::Paid.as_db(),
        "payment_id": payment.id,
        "amount_minor": expected_minor,
        "currency": payment.currency,
    });
    notify::emit(
        pool,
        &updated,
        "PAYMENT_SUCCEEDED",
        "PAYMENT_CONFIRMED",
        &format!("provider:{provider}"),
        Some(&detail),
    )
    .await;

    tracing::info!(
        order_id = %updated.id,
        payment_id = %payment.id,
        amount_minor = expected_minor,
        "Payment settled"
    );

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(amount: &str, currency: &str) -> Payment {
        Payment {
            id: "pay-1".to_string(),
            order_id: "order-1".to_string(),
            provider: "stripe".to_string(),
            session_id: "ps_1".to_string(),
            amount: amount.parse().unwrap(),
            currency: currency.to_string(),
            status: "INIT".to_string(),
            raw_payload: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn event(amount_minor: i64, currency: &str) -> SettlementEvent {
        SettlementEvent {
            session_id: "ps_1".to_string(),
            amount_minor,
            currency: currency.to_string(),
            payload: serde_json::Value::Null,
        }
    }

    fn order(status: &str) -> OrderRequest {
        OrderRequest {
            id: "order-1".to_string(),
            public_code: "PR-TEST01".to_string(),
            owner_user_id: Some("user-1".to_string()),
            guest_email: None,
            vehicle_vin: "WVWZZZ1JZXW000001".to_string(),
            status: status.to_string(),
            magic_link_hash: None,
            magic_link_expires_at: None,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn confirmation_requires_exact_amount() {
        let payment = payment("150.00", "EUR");
        assert_eq!(verify_confirmation(&payment, &event(15_000, "EUR")).unwrap(), 15_000);
        assert!(matches!(
            verify_confirmation(&payment, &event(14_999, "EUR")),
            Err(AppError::AmountMismatch)
        ));
        assert!(matches!(
            verify_confirmation(&payment, &event(15_001, "EUR")),
            Err(AppError::AmountMismatch)
        ));
    }

    #[test]
    fn confirmation_requires_matching_currency() {
        let payment = payment("49.90", "EUR");
        assert!(matches!(
            verify_confirmation(&payment, &event(4_990, "USD")),
            Err(AppError::AmountMismatch)
        ));
        // provider currency codes arrive lowercase
        assert!(verify_confirmation(&payment, &event(4_990, "eur")).is_ok());
    }

    #[test]
    fn removed_order_refuses_settlement() {
        assert!(matches!(
            ensure_settleable(&order("REMOVED")),
            Err(AppError::PaymentNotFound)
        ));
        for status in ["PENDING", "VALUATED", "CHECKOUT", "PAID"] {
            assert!(ensure_settleable(&order(status)).is_ok());
        }
    }

    #[test]
    fn minor_units_exact_conversion() {
        assert_eq!(to_minor_units("100.00".parse().unwrap()), Some(10_000));
        assert_eq!(to_minor_units("150.00".parse().unwrap()), Some(15_000));
        assert_eq!(to_minor_units("0.01".parse().unwrap()), Some(1));
        assert_eq!(to_minor_units("49.9".parse().unwrap()), Some(4_990));
        assert_eq!(to_minor_units(Decimal::ZERO), Some(0));
    }

    #[test]
    fn minor_units_reject_sub_cent_precision() {
        assert_eq!(to_minor_units("49.999".parse().unwrap()), None);
        assert_eq!(to_minor_units("0.001".parse().unwrap()), None);
    }
}
