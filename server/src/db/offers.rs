//! Offer and chosen-offer rows

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Offer {
    pub id: String,
    pub order_item_id: String,
    pub manufacturer: String,
    pub unit_price: Decimal,
    pub quantity_available: i32,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct ChosenOffer {
    pub order_item_id: String,
    pub offer_id: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// All offers attached to any item of the given order
pub async fn list_for_order(pool: &PgPool, order_id: &str) -> Result<Vec<Offer>, sqlx::Error> {
    sqlx::query_as(
        "SELECT o.* FROM offers o
         JOIN order_items i ON i.id = o.order_item_id
         WHERE i.order_id = $1
         ORDER BY o.created_at ASC, o.id ASC",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
}

pub async fn list_chosen_for_order(
    pool: &PgPool,
    order_id: &str,
) -> Result<Vec<ChosenOffer>, sqlx::Error> {
    sqlx::query_as(
        "SELECT c.* FROM chosen_offers c
         JOIN order_items i ON i.id = c.order_item_id
         WHERE i.order_id = $1",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await
}
