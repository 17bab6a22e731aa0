//! Notification records (append-only, consumed by the outbound dispatcher)

use sqlx::PgPool;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Append a notification record
pub async fn log(
    pool: &PgPool,
    order_id: &str,
    audience: &str,
    recipient: Option<&str>,
    kind: &str,
    detail: Option<&serde_json::Value>,
    now: i64,
) -> Result<(), BoxError> {
    sqlx::query(
        "INSERT INTO notifications (order_id, audience, recipient, kind, detail, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(order_id)
    .bind(audience)
    .bind(recipient)
    .bind(kind)
    .bind(detail)
    .bind(now)
    .execute(pool)
    .await?;
    Ok(())
}
