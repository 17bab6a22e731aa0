//! Authentication and authorization
//!
//! Identity itself comes from an external provider; this module only
//! verifies the JWT it issues and resolves what the caller may do with a
//! given order (staff / owner / guest capability link / nothing).

pub mod access;
pub mod jwt;
pub mod middleware;

pub use access::AccessContext;
pub use middleware::{auth_middleware, optional_auth_middleware};

use serde::{Deserialize, Serialize};

/// Role carried by the identity provider's JWT
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

impl Role {
    pub fn as_db(&self) -> &'static str {
        match self {
            Role::Customer => "CUSTOMER",
            Role::Staff => "STAFF",
            Role::Admin => "ADMIN",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "CUSTOMER" => Some(Role::Customer),
            "STAFF" => Some(Role::Staff),
            "ADMIN" => Some(Role::Admin),
            _ => None,
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Staff | Role::Admin)
    }
}

/// Authenticated principal extracted from a verified JWT
#[derive(Debug, Clone)]
pub struct Principal {
    pub user_id: String,
    pub email: String,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_db_round_trip() {
        for role in [Role::Customer, Role::Staff, Role::Admin] {
            assert_eq!(Role::from_db(role.as_db()), Some(role));
        }
        assert_eq!(Role::from_db("ROOT"), None);
    }

    #[test]
    fn staff_check_covers_admin() {
        assert!(Role::Staff.is_staff());
        assert!(Role::Admin.is_staff());
        assert!(!Role::Customer.is_staff());
    }
}
