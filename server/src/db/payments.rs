//! Payment attempt rows

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub provider: String,
    pub session_id: String,
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    #[serde(skip_serializing)]
    pub raw_payload: Option<serde_json::Value>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub async fn list_for_order(pool: &PgPool, order_id: &str) -> Result<Vec<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE order_id = $1 ORDER BY created_at ASC, id ASC")
        .bind(order_id)
        .fetch_all(pool)
        .await
}
