//! JWT verification for identity-provider tokens

use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::{Principal, Role};

/// Claims issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User ID
    pub sub: String,
    /// User email
    pub email: String,
    /// Role string (CUSTOMER | STAFF | ADMIN)
    pub role: String,
    /// Expiration (Unix timestamp seconds)
    pub exp: usize,
    /// Issued at (Unix timestamp seconds)
    pub iat: usize,
}

const JWT_EXPIRY_HOURS: i64 = 24;

/// Create a token (dev tooling and tests; production tokens come from the
/// identity provider with the shared secret)
pub fn create_token(
    user_id: &str,
    email: &str,
    role: Role,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = chrono::Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        role: role.as_db().to_string(),
        exp: (now + chrono::Duration::hours(JWT_EXPIRY_HOURS)).timestamp() as usize,
        iat: now.timestamp() as usize,
    };

    jsonwebtoken::encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

/// Verify a token and resolve the principal it describes
pub fn verify_token(token: &str, secret: &str) -> Option<Principal> {
    let validation = Validation::default();
    let token_data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .ok()?;

    let role = Role::from_db(&token_data.claims.role)?;
    Some(Principal {
        user_id: token_data.claims.sub,
        email: token_data.claims.email,
        role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_preserves_identity() {
        let token = create_token("user-1", "a@b.test", Role::Staff, "secret").unwrap();
        let principal = verify_token(&token, "secret").unwrap();
        assert_eq!(principal.user_id, "user-1");
        assert_eq!(principal.email, "a@b.test");
        assert_eq!(principal.role, Role::Staff);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token("user-1", "a@b.test", Role::Customer, "secret").unwrap();
        assert!(verify_token(&token, "other").is_none());
    }

    #[test]
    fn unknown_role_is_rejected() {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: "user-1".into(),
            email: "a@b.test".into(),
            role: "ROOT".into(),
            exp: (now + chrono::Duration::hours(1)).timestamp() as usize,
            iat: now.timestamp() as usize,
        };
        let token = jsonwebtoken::encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"secret"),
        )
        .unwrap();
        assert!(verify_token(&token, "secret").is_none());
    }
}
