//! Checkout aggregates: shipping address, invoice, shipment

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ShippingAddress {
    pub id: String,
    pub order_id: String,
    pub recipient: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub phone: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Invoice {
    pub id: String,
    pub order_id: String,
    pub company: String,
    pub vat_id: Option<String>,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    pub country: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Shipment {
    pub id: String,
    pub order_id: String,
    pub method: String,
    pub price: Decimal,
    pub created_at: i64,
    pub updated_at: i64,
}

pub async fn find_address(
    pool: &PgPool,
    order_id: &str,
) -> Result<Option<ShippingAddress>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM shipping_addresses WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_invoice(pool: &PgPool, order_id: &str) -> Result<Option<Invoice>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM invoices WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await
}

pub async fn find_shipment(pool: &PgPool, order_id: &str) -> Result<Option<Shipment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM shipments WHERE order_id = $1")
        .bind(order_id)
        .fetch_optional(pool)
        .await
}
