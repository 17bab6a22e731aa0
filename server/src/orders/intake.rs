//! Request intake
//!
//! Creates an order request with its part lines in one transaction. Guest
//! submissions get a time-limited capability link: the token is returned
//! exactly once and only its hash is stored.

use sqlx::PgPool;

use crate::auth::Principal;
use crate::db::orders::{OrderItem, OrderRequest};
use crate::error::{AppError, AppResult};
use crate::orders::notify;
use crate::orders::status::ItemState;
use crate::util::{generate_public_code, generate_token, hash_token, new_id, now_millis};

#[derive(Debug, Clone)]
pub struct IntakeItem {
    pub category: String,
    pub quantity: i32,
    pub note: Option<String>,
    pub photo_ref: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IntakeRequest {
    pub vehicle_vin: String,
    pub guest_email: Option<String>,
    pub items: Vec<IntakeItem>,
}

#[derive(Debug)]
pub struct IntakeResult {
    pub order: OrderRequest,
    pub items: Vec<OrderItem>,
    /// Plain capability token, present only for guest submissions
    pub magic_link_token: Option<String>,
}

/// 17-character alphanumeric vehicle identifier
pub fn validate_vin(vin: &str) -> AppResult<String> {
    let vin = vin.trim().to_uppercase();
    if vin.len() != 17 || !vin.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(AppError::Validation(
            "vehicle identifier must be 17 alphanumeric characters".into(),
        ));
    }
    Ok(vin)
}

fn validate_items(items: &[IntakeItem]) -> AppResult<()> {
    if items.is_empty() {
        return Err(AppError::Validation("at least one part line required".into()));
    }
    for item in items {
        if item.category.trim().is_empty() {
            return Err(AppError::Validation("item category must not be empty".into()));
        }
        if item.quantity <= 0 {
            return Err(AppError::Validation("item quantity must be positive".into()));
        }
    }
    Ok(())
}

/// Create an order request in `PENDING` with its items in `REQUESTED`.
///
/// Exactly one of {authenticated owner, guest email} identifies the request:
/// an authenticated principal always becomes the owner; otherwise a guest
/// email is required and a capability link is issued.
pub async fn create_request(
    pool: &PgPool,
    principal: Option<&Principal>,
    input: IntakeRequest,
    magic_link_ttl_millis: i64,
    actor: &str,
) -> AppResult<IntakeResult> {
    let vin = validate_vin(&input.vehicle_vin)?;
    validate_items(&input.items)?;

    let now = now_millis();

    let (owner_user_id, guest_email, token, link_hash, link_expires_at) = match principal {
        Some(p) => (Some(p.user_id.clone()), None, None, None, None),
        None => {
            let email = input
                .guest_email
                .as_deref()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .ok_or_else(|| {
                    AppError::Validation("guest submissions require an email address".into())
                })?;
            if !email.contains('@') {
                return Err(AppError::Validation("invalid guest email".into()));
            }
            let token = generate_token();
            let hash = hash_token(&token);
            (
                None,
                Some(email),
                Some(token),
                Some(hash),
                Some(now + magic_link_ttl_millis),
            )
        }
    };

    let mut tx = pool.begin().await?;

    let order: OrderRequest = sqlx::query_as(
        "INSERT INTO order_requests
            (id, public_code, owner_user_id, guest_email, vehicle_vin, status,
             magic_link_hash, magic_link_expires_at, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, 'PENDING', $6, $7, $8, $8)
         RETURNING *",
    )
    .bind(new_id())
    .bind(generate_public_code())
    .bind(&owner_user_id)
    .bind(&guest_email)
    .bind(&vin)
    .bind(&link_hash)
    .bind(link_expires_at)
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    let mut items = Vec::with_capacity(input.items.len());
    for item in &input.items {
        let row: OrderItem = sqlx::query_as(
            "INSERT INTO order_items (id, order_id, category, quantity, note, photo_ref, state, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
             RETURNING *",
        )
        .bind(new_id())
        .bind(&order.id)
        .bind(item.category.trim())
        .bind(item.quantity)
        .bind(&item.note)
        .bind(&item.photo_ref)
        .bind(ItemState::Requested.as_db())
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        items.push(row);
    }

    tx.commit().await?;

    let detail = serde_json::json!({
        "public_code": order.public_code,
        "item_count": items.len(),
    });
    notify::emit(
        pool,
        &order,
        "REQUEST_RECEIVED",
        "request_created",
        actor,
        Some(&detail),
    )
    .await;

    tracing::info!(
        order_id = %order.id,
        public_code = %order.public_code,
        items = items.len(),
        guest = order.guest_email.is_some(),
        "Order request created"
    );

    Ok(IntakeResult {
        order,
        items,
        magic_link_token: token,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vin_accepts_17_alphanumerics_and_uppercases() {
        let vin = validate_vin("wvwzzz1jzxw000001").unwrap();
        assert_eq!(vin, "WVWZZZ1JZXW000001");
    }

    #[test]
    fn vin_rejects_wrong_length_and_symbols() {
        assert!(validate_vin("SHORT").is_err());
        assert!(validate_vin("WVWZZZ1JZXW00000!").is_err());
        assert!(validate_vin("WVWZZZ1JZXW0000012").is_err());
    }

    #[test]
    fn items_must_be_present_and_positive() {
        assert!(validate_items(&[]).is_err());
        assert!(
            validate_items(&[IntakeItem {
                category: "brakes".into(),
                quantity: 0,
                note: None,
                photo_ref: None,
            }])
            .is_err()
        );
        assert!(
            validate_items(&[IntakeItem {
                category: "brakes".into(),
                quantity: 2,
                note: Some("front axle".into()),
                photo_ref: None,
            }])
            .is_ok()
        );
    }
}
