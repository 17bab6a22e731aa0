//! Checkout assembler
//!
//! Validates a buyer's checkout submission against the current order state
//! and persists the shipping/invoice/shipment aggregates plus the binding
//! offer selections in one transaction. Never marks an order paid; that is
//! the settlement path's job.

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::config::ShippingRates;
use crate::db::orders::OrderRequest;
use crate::error::{AppError, AppResult};
use crate::orders::notify;
use crate::orders::state_machine::{lock_order, set_status};
use crate::orders::status::OrderStatus;
use crate::util::{new_id, now_millis};

/// Supported shipping methods with fixed-rate pricing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShippingMethod {
    Standard,
    Express,
}

impl ShippingMethod {
    pub fn as_db(&self) -> &'static str {
        match self {
            ShippingMethod::Standard => "STANDARD",
            ShippingMethod::Express => "EXPRESS",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "STANDARD" => Some(ShippingMethod::Standard),
            "EXPRESS" => Some(ShippingMethod::Express),
            _ => None,
        }
    }

    pub fn price(&self, rates: &ShippingRates) -> Decimal {
        match self {
            ShippingMethod::Standard => rates.standard,
            ShippingMethod::Express => rates.express,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AddressFields {
    pub recipient: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InvoiceFields {
    pub company: String,
    pub vat_id: Option<String>,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

/// One entry of the buyer's offer selection
#[derive(Debug, Clone)]
pub struct OfferSelection {
    pub order_item_id: String,
    pub offer_id: String,
    pub include: bool,
}

#[derive(Debug, Clone)]
pub struct CheckoutSubmission {
    pub address: AddressFields,
    pub invoice: Option<InvoiceFields>,
    pub shipping_method: ShippingMethod,
    pub selected_offers: Vec<OfferSelection>,
}

/// Gate for the checkout assembler: only a fully valuated order may enter
/// checkout.
fn ensure_checkout_ready(status: &str) -> AppResult<()> {
    if status != OrderStatus::Valuated.as_db() {
        return Err(AppError::NotReadyForCheckout);
    }
    Ok(())
}

/// Validate and persist a checkout submission.
///
/// Precondition: order status is `VALUATED`, otherwise `NotReadyForCheckout`
/// and nothing is persisted. Selections upsert per item, so a re-checkout
/// overwrites the prior choice instead of appending.
pub async fn checkout(
    pool: &PgPool,
    rates: &ShippingRates,
    order_id: &str,
    submission: CheckoutSubmission,
    actor: &str,
) -> AppResult<OrderRequest> {
    let now = now_millis();
    let mut tx = pool.begin().await?;

    let order = lock_order(&mut tx, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;

    ensure_checkout_ready(&order.status)?;

    let addr = &submission.address;
    sqlx::query(
        "INSERT INTO shipping_addresses (id, order_id, recipient, street, city, postal_code, country, phone, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
         ON CONFLICT (order_id) DO UPDATE SET
            recipient = EXCLUDED.recipient, street = EXCLUDED.street,
            city = EXCLUDED.city, postal_code = EXCLUDED.postal_code,
            country = EXCLUDED.country, phone = EXCLUDED.phone,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(new_id())
    .bind(order_id)
    .bind(&addr.recipient)
    .bind(&addr.street)
    .bind(&addr.city)
    .bind(&addr.postal_code)
    .bind(&addr.country)
    .bind(&addr.phone)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    match &submission.invoice {
        Some(inv) => {
            sqlx::query(
                "INSERT INTO invoices (id, order_id, company, vat_id, street, city, postal_code, country, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9)
                 ON CONFLICT (order_id) DO UPDATE SET
                    company = EXCLUDED.company, vat_id = EXCLUDED.vat_id,
                    street = EXCLUDED.street, city = EXCLUDED.city,
                    postal_code = EXCLUDED.postal_code, country = EXCLUDED.country,
                    updated_at = EXCLUDED.updated_at",
            )
            .bind(new_id())
            .bind(order_id)
            .bind(&inv.company)
            .bind(&inv.vat_id)
            .bind(&inv.street)
            .bind(&inv.city)
            .bind(&inv.postal_code)
            .bind(&inv.country)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        None => {
            // re-checkout without invoice details drops the prior invoice
            sqlx::query("DELETE FROM invoices WHERE order_id = $1")
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
        }
    }

    let price = submission.shipping_method.price(rates);
    sqlx::query(
        "INSERT INTO shipments (id, order_id, method, price, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $5)
         ON CONFLICT (order_id) DO UPDATE SET
            method = EXCLUDED.method, price = EXCLUDED.price,
            updated_at = EXCLUDED.updated_at",
    )
    .bind(new_id())
    .bind(order_id)
    .bind(submission.shipping_method.as_db())
    .bind(price)
    .bind(now)
    .execute(&mut *tx)
    .await?;

    for selection in submission.selected_offers.iter().filter(|s| s.include) {
        // the offer must belong to the named item, and the item to this order
        let valid: Option<(i32,)> = sqlx::query_as(
            "SELECT 1 FROM offers o
             JOIN order_items i ON i.id = o.order_item_id
             WHERE o.id = $1 AND i.id = $2 AND i.order_id = $3",
        )
        .bind(&selection.offer_id)
        .bind(&selection.order_item_id)
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;

        if valid.is_none() {
            return Err(AppError::Validation(format!(
                "offer {} does not belong to item {} of this order",
                selection.offer_id, selection.order_item_id
            )));
        }

        sqlx::query(
            "INSERT INTO chosen_offers (order_item_id, offer_id, created_at, updated_at)
             VALUES ($1, $2, $3, $3)
             ON CONFLICT (order_item_id) DO UPDATE SET
                offer_id = EXCLUDED.offer_id, updated_at = EXCLUDED.updated_at",
        )
        .bind(&selection.order_item_id)
        .bind(&selection.offer_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    let updated = set_status(&mut tx, order_id, OrderStatus::Checkout, now).await?;

    tx.commit().await?;

    let detail = serde_json::json!({
        "from": OrderStatus::Valuated.as_db(),
        "to": OrderStatus::Checkout.as_db(),
        "shipping_method": submission.shipping_method.as_db(),
        "shipping_price": price,
    });
    notify::emit(
        pool,
        &updated,
        "CHECKOUT_SUBMITTED",
        "status_transition",
        actor,
        Some(&detail),
    )
    .await;

    tracing::info!(
        order_id = %order_id,
        method = submission.shipping_method.as_db(),
        selections = submission.selected_offers.iter().filter(|s| s.include).count(),
        "Checkout submitted"
    );

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rates() -> ShippingRates {
        ShippingRates {
            standard: "4.90".parse().unwrap(),
            express: "9.90".parse().unwrap(),
        }
    }

    #[test]
    fn checkout_gate_requires_valuated() {
        assert!(ensure_checkout_ready("VALUATED").is_ok());
        for status in ["PENDING", "CHECKOUT", "PAID", "REMOVED"] {
            assert!(matches!(
                ensure_checkout_ready(status),
                Err(AppError::NotReadyForCheckout)
            ));
        }
    }

    #[test]
    fn method_db_round_trip() {
        for method in [ShippingMethod::Standard, ShippingMethod::Express] {
            assert_eq!(ShippingMethod::from_db(method.as_db()), Some(method));
        }
        assert_eq!(ShippingMethod::from_db("PIGEON"), None);
    }

    #[test]
    fn method_price_follows_rate_table() {
        let rates = rates();
        assert_eq!(
            ShippingMethod::Standard.price(&rates),
            "4.90".parse::<Decimal>().unwrap()
        );
        assert_eq!(
            ShippingMethod::Express.price(&rates),
            "9.90".parse::<Decimal>().unwrap()
        );
    }
}
