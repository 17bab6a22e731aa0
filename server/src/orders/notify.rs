//! Notification/audit emitter
//!
//! Side-effect-only channel shared by every state-changing operation. Both
//! records are best-effort: a failed append is logged and never fails or
//! rolls back the primary operation. Called after the owning transaction has
//! committed.

use sqlx::PgPool;

use crate::db;
use crate::db::orders::OrderRequest;
use crate::util::now_millis;

/// Append one notification and one audit entry for a committed state change.
pub async fn emit(
    pool: &PgPool,
    order: &OrderRequest,
    kind: &str,
    action: &str,
    actor: &str,
    detail: Option<&serde_json::Value>,
) {
    let now = now_millis();

    let (audience, recipient) = match order.owner_user_id.as_deref() {
        Some(user_id) => ("USER", Some(user_id)),
        None => ("GUEST", order.guest_email.as_deref()),
    };

    if let Err(e) =
        db::notifications::log(pool, &order.id, audience, recipient, kind, detail, now).await
    {
        tracing::warn!(order_id = %order.id, kind = kind, error = %e, "Failed to append notification");
    }

    if let Err(e) = db::audit::log(pool, &order.id, action, actor, detail, now).await {
        tracing::warn!(order_id = %order.id, action = action, error = %e, "Failed to append audit entry");
    }
}
