//! Permission helper functions for API handlers.
//!
//! Provides the per-request [`Principal`] and convenience checks on it.

use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::key::{PermissionKey, PermissionSet, Requirement};
use super::queries::get_user_role_grants;
use super::resolver::{union_role_grants, PermissionError};
use crate::db::{find_user_by_id, User};

/// Authenticated identity with its resolved roles and permissions.
///
/// Built once per request by the auth middleware. Handlers read it instead
/// of querying roles again.
#[derive(Debug, Clone, Serialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub email: String,
    pub name: String,
    /// Assigned role names, sorted.
    pub roles: Vec<String>,
    pub permissions: PermissionSet,
}

impl Principal {
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    #[must_use]
    pub fn can(&self, key: &PermissionKey) -> bool {
        self.permissions.has(key)
    }

    #[must_use]
    pub fn satisfies(&self, requirement: &Requirement) -> bool {
        self.permissions.satisfies(requirement)
    }

    /// Like [`Self::satisfies`], but as a `Result` for `?` in handlers.
    pub fn require(&self, requirement: &Requirement) -> Result<(), PermissionError> {
        if self.satisfies(requirement) {
            Ok(())
        } else {
            Err(PermissionError::MissingPermission(requirement.to_string()))
        }
    }

    /// Whether the principal may modify an entity of `resource` owned by `owner_id`.
    ///
    /// Owners always may. Everyone else needs `<resource>:edit`.
    #[must_use]
    pub fn can_modify_owned(&self, owner_id: Uuid, resource: &str) -> bool {
        if owner_id == self.user_id {
            return true;
        }
        PermissionKey::parse(&format!("{resource}:edit")).is_ok_and(|key| self.can(&key))
    }
}

/// Build the principal for an already loaded user.
#[tracing::instrument(skip(pool, user), fields(user_id = %user.id))]
pub async fn principal_for_user(pool: &PgPool, user: User) -> Result<Principal, PermissionError> {
    // One snapshot for both; grants come back sorted by role name
    let grants = get_user_role_grants(pool, user.id).await?;
    let roles = grants.iter().map(|g| g.role_name.clone()).collect();

    Ok(Principal {
        user_id: user.id,
        email: user.email,
        name: user.name,
        roles,
        permissions: union_role_grants(&grants),
    })
}

/// Load a user and build their principal.
///
/// Fails with [`PermissionError::UserNotFound`] if the user does not exist.
pub async fn load_principal(pool: &PgPool, user_id: Uuid) -> Result<Principal, PermissionError> {
    let user = find_user_by_id(pool, user_id)
        .await?
        .ok_or(PermissionError::UserNotFound)?;

    principal_for_user(pool, user).await
}
