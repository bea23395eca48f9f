//! Permission resolution logic.
//!
//! A user's effective permissions are the union of the permissions granted
//! by every role assigned to them. There is no precedence and no deny rule,
//! so role order never changes the result.

use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use super::key::{InvalidPermissionKey, PermissionSet};
use super::models::{Role, RoleGrants};
use super::queries::get_user_role_grants;
use crate::db;

/// Name of the root role. Only its holders may change system role assignments.
pub const SUPER_ADMIN: &str = "SUPER_ADMIN";

/// Union the grants of several roles into one set.
///
/// Keys granted by more than one role appear once.
pub fn union_role_grants(roles: &[RoleGrants]) -> PermissionSet {
    roles
        .iter()
        .flat_map(|role| role.permissions.iter().cloned())
        .collect()
}

/// Resolve the effective permission set of a user.
///
/// Fails with [`PermissionError::UserNotFound`] if the user does not exist.
/// A user without roles resolves to the empty set.
#[tracing::instrument(skip(pool))]
pub async fn resolve_user_permissions(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<PermissionSet, PermissionError> {
    if !db::user_exists(pool, user_id).await? {
        return Err(PermissionError::UserNotFound);
    }

    let grants = get_user_role_grants(pool, user_id).await?;
    let perms = union_role_grants(&grants);

    tracing::debug!(roles = grants.len(), permissions = perms.len(), "Resolved permissions");
    Ok(perms)
}

/// Check whether an actor may assign or revoke `role` on `target_user_id`.
///
/// Rules:
/// 1. Nobody changes their own roles
/// 2. System roles are only managed by `SUPER_ADMIN` holders
pub fn can_change_user_role(
    actor_id: Uuid,
    actor_roles: &[String],
    target_user_id: Uuid,
    role: &Role,
) -> Result<(), PermissionError> {
    if actor_id == target_user_id {
        return Err(PermissionError::CannotModifySelf);
    }

    if role.is_system && !actor_roles.iter().any(|r| r == SUPER_ADMIN) {
        return Err(PermissionError::SystemRoleProtected(role.name.clone()));
    }

    Ok(())
}

/// Check whether a role's definition (permissions, existence) may be changed.
pub fn ensure_role_mutable(role: &Role) -> Result<(), PermissionError> {
    if role.is_system {
        return Err(PermissionError::SystemRoleProtected(role.name.clone()));
    }
    Ok(())
}

/// Permission system errors.
///
/// Denial from a plain check is a `false`, not one of these. `MissingPermission`
/// only exists so `require` style helpers can short-circuit with `?`.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// Referenced user does not exist.
    #[error("User not found")]
    UserNotFound,

    /// Referenced role does not exist.
    #[error("Role not found")]
    RoleNotFound,

    /// Referenced permission does not exist.
    #[error("Permission not found: {0}")]
    PermissionNotFound(String),

    /// Caller lacks the required permission(s).
    #[error("Missing permission: {0}")]
    MissingPermission(String),

    /// System roles cannot be deleted or redefined, and only `SUPER_ADMIN` assigns them.
    #[error("System role {0} is protected")]
    SystemRoleProtected(String),

    /// Actors cannot change their own role assignments.
    #[error("Cannot modify your own roles")]
    CannotModifySelf,

    /// Revoking would leave no `SUPER_ADMIN`.
    #[error("Cannot remove the last SUPER_ADMIN")]
    LastSuperAdmin,

    /// Malformed permission key.
    #[error(transparent)]
    InvalidKey(#[from] InvalidPermissionKey),

    /// Database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}
