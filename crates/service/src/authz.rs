//! Authorization gate for review mutations.
//!
//! Pure decisions over (actor, owner); no I/O. Admin status is the single
//! string role `admin` carried in the actor's token claims.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ReviewError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Provider,
    Admin,
}

impl Role {
    /// Unknown role strings degrade to `User`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "provider" => Role::Provider,
            _ => Role::User,
        }
    }

    pub fn is_admin(self) -> bool { self == Role::Admin }
}

/// Identity acting on a request, supplied by the auth middleware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(id: Uuid, role: Role) -> Self { Self { id, role } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Only the resource owner.
    AuthorOnly,
    /// The owner, or any admin.
    AuthorOrAdmin,
}

pub fn is_allowed(actor: &Actor, owner: Uuid, policy: Policy) -> bool {
    match policy {
        Policy::AuthorOnly => actor.id == owner,
        Policy::AuthorOrAdmin => actor.id == owner || actor.role.is_admin(),
    }
}

pub fn authorize(actor: &Actor, owner: Uuid, policy: Policy) -> Result<(), ReviewError> {
    if is_allowed(actor, owner, policy) {
        Ok(())
    } else {
        Err(ReviewError::Forbidden)
    }
}
