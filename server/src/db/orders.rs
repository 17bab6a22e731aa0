//! Order request and order item rows

use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct OrderRequest {
    pub id: String,
    pub public_code: String,
    pub owner_user_id: Option<String>,
    pub guest_email: Option<String>,
    pub vehicle_vin: String,
    pub status: String,
    #[serde(skip_serializing)]
    pub magic_link_hash: Option<String>,
    #[serde(skip_serializing)]
    pub magic_link_expires_at: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub category: String,
    pub quantity: i32,
    pub note: Option<String>,
    pub photo_ref: Option<String>,
    pub state: String,
    pub created_at: i64,
    pub updated_at: i64,
}

pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<OrderRequest>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_requests WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list_by_status(
    pool: &PgPool,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<OrderRequest>, sqlx::Error> {
    match status {
        Some(status) => {
            sqlx::query_as(
                "SELECT * FROM order_requests WHERE status = $1
                 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3",
            )
            .bind(status)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
        None => {
            sqlx::query_as(
                "SELECT * FROM order_requests ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
            )
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
        }
    }
}

pub async fn list_items(pool: &PgPool, order_id: &str) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(order_id)
        .fetch_all(pool)
        .await
}

pub async fn find_item(pool: &PgPool, item_id: &str) -> Result<Option<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE id = $1")
        .bind(item_id)
        .fetch_optional(pool)
        .await
}

/// Migrate guest orders to an authenticated owner after login.
///
/// One-way: guest_email is cleared, ownership is set. Returns the number of
/// orders migrated.
pub async fn claim_guest_orders(
    pool: &PgPool,
    email: &str,
    user_id: &str,
    now: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE order_requests
         SET owner_user_id = $1, guest_email = NULL,
             magic_link_hash = NULL, magic_link_expires_at = NULL,
             updated_at = $2
         WHERE guest_email = $3 AND owner_user_id IS NULL",
    )
    .bind(user_id)
    .bind(now)
    .bind(email)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
