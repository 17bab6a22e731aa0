//! Access resolution for a single order
//!
//! Given the request's identity proof — an authenticated principal, a guest
//! capability token, or neither — resolve what the caller is allowed to do
//! with the target order. Resolution is stateless and re-evaluated on every
//! request; a capability token can expire between two calls of the same
//! session.

use crate::db::orders::OrderRequest;
use crate::error::AppError;
use crate::util::hash_token;

use super::{Principal, Role};

/// Authorization context for one request against one order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessContext {
    /// No usable identity proof
    None,
    /// Authenticated owner of the order
    Owner { user_id: String },
    /// Anonymous requester holding a live capability link
    Guest,
    /// Staff or admin, full access regardless of ownership
    Staff { user_id: String, role: Role },
}

impl AccessContext {
    pub fn is_staff(&self) -> bool {
        matches!(self, AccessContext::Staff { .. })
    }

    /// Owner, live guest, or staff — the contexts allowed to act on the
    /// buyer side of an order (fetch, checkout, pay).
    pub fn is_participant(&self) -> bool {
        !matches!(self, AccessContext::None)
    }

    /// Actor label recorded in audit entries
    pub fn actor(&self) -> String {
        match self {
            AccessContext::None => "anonymous".to_string(),
            AccessContext::Owner { user_id } => format!("owner:{user_id}"),
            AccessContext::Guest => "guest".to_string(),
            AccessContext::Staff { user_id, .. } => format!("staff:{user_id}"),
        }
    }
}

/// Resolve the caller's authorization context for `order`.
///
/// Precedence: staff role, then ownership, then a matching unexpired
/// capability token. An expired or mismatched token yields `None` even when
/// the token string matches the stored hash.
pub fn resolve(
    principal: Option<&Principal>,
    token: Option<&str>,
    order: &OrderRequest,
    now: i64,
) -> AccessContext {
    if let Some(p) = principal {
        if p.role.is_staff() {
            return AccessContext::Staff {
                user_id: p.user_id.clone(),
                role: p.role,
            };
        }
        if order.owner_user_id.as_deref() == Some(p.user_id.as_str()) {
            return AccessContext::Owner {
                user_id: p.user_id.clone(),
            };
        }
    }

    if let (Some(token), Some(stored_hash), Some(expires_at)) = (
        token,
        order.magic_link_hash.as_deref(),
        order.magic_link_expires_at,
    ) {
        if hash_token(token) == stored_hash && now < expires_at {
            return AccessContext::Guest;
        }
    }

    AccessContext::None
}

/// Error for a caller that resolved to [`AccessContext::None`]: anonymous
/// callers get `Unauthorized`, authenticated-but-unrelated callers get
/// `Forbidden`.
pub fn denied(principal: Option<&Principal>) -> AppError {
    match principal {
        Some(_) => AppError::Forbidden("not your order".to_string()),
        None => AppError::Unauthorized,
    }
}

/// Require a staff principal for back-office operations
pub fn require_staff(principal: &Principal) -> Result<AccessContext, AppError> {
    if principal.role.is_staff() {
        Ok(AccessContext::Staff {
            user_id: principal.user_id.clone(),
            role: principal.role,
        })
    } else {
        Err(AppError::Forbidden("staff role required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::generate_token;

    fn guest_order(token_hash: Option<String>, expires_at: Option<i64>) -> OrderRequest {
        OrderRequest {
            id: "order-1".to_string(),
            public_code: "PR-TEST01".to_string(),
            owner_user_id: None,
            guest_email: Some("guest@example.test".to_string()),
            vehicle_vin: "WVWZZZ1JZXW000001".to_string(),
            status: "PENDING".to_string(),
            magic_link_hash: token_hash,
            magic_link_expires_at: expires_at,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn owned_order(owner: &str) -> OrderRequest {
        OrderRequest {
            owner_user_id: Some(owner.to_string()),
            guest_email: None,
            magic_link_hash: None,
            magic_link_expires_at: None,
            ..guest_order(None, None)
        }
    }

    fn principal(user_id: &str, role: Role) -> Principal {
        Principal {
            user_id: user_id.to_string(),
            email: format!("{user_id}@example.test"),
            role,
        }
    }

    #[test]
    fn staff_wins_regardless_of_ownership() {
        let order = owned_order("someone-else");
        let staff = principal("staff-1", Role::Staff);
        let ctx = resolve(Some(&staff), None, &order, 100);
        assert_eq!(
            ctx,
            AccessContext::Staff {
                user_id: "staff-1".to_string(),
                role: Role::Staff
            }
        );
    }

    #[test]
    fn owner_resolves_for_matching_user() {
        let order = owned_order("user-7");
        let owner = principal("user-7", Role::Customer);
        assert_eq!(
            resolve(Some(&owner), None, &order, 100),
            AccessContext::Owner {
                user_id: "user-7".to_string()
            }
        );

        let stranger = principal("user-8", Role::Customer);
        assert_eq!(resolve(Some(&stranger), None, &order, 100), AccessContext::None);
    }

    #[test]
    fn live_capability_token_resolves_guest() {
        let token = generate_token();
        let order = guest_order(Some(hash_token(&token)), Some(1_000));
        assert_eq!(resolve(None, Some(&token), &order, 999), AccessContext::Guest);
    }

    #[test]
    fn expired_token_resolves_none_even_when_hash_matches() {
        let token = generate_token();
        let order = guest_order(Some(hash_token(&token)), Some(1_000));
        assert_eq!(resolve(None, Some(&token), &order, 1_000), AccessContext::None);
        assert_eq!(resolve(None, Some(&token), &order, 5_000), AccessContext::None);
    }

    #[test]
    fn wrong_token_resolves_none() {
        let order = guest_order(Some(hash_token("right")), Some(i64::MAX));
        assert_eq!(resolve(None, Some("wrong"), &order, 0), AccessContext::None);
    }

    #[test]
    fn denial_distinguishes_missing_proof_from_insufficient_proof() {
        assert!(matches!(denied(None), AppError::Unauthorized));
        let p = principal("user-1", Role::Customer);
        assert!(matches!(denied(Some(&p)), AppError::Forbidden(_)));
    }

    #[test]
    fn require_staff_rejects_customers() {
        let customer = principal("user-1", Role::Customer);
        assert!(require_staff(&customer).is_err());
        let admin = principal("admin-1", Role::Admin);
        assert!(require_staff(&admin).unwrap().is_staff());
    }
}
