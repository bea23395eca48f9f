//! Admin API handlers.
//!
//! Every route is gated by a per-route permission requirement in the router.
//! Mutations are recorded in the audit log.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::api::AppState;
use crate::db::find_user_by_id;
use crate::permissions::{
    self, audit_actions, can_change_user_role, find_role_by_name, principal_for_user,
    queries::{get_audit_log as query_audit_log, write_audit_log},
    AuditLogEntry, Permission, PermissionError, Principal, Role, RoleWithPermissions,
};

use super::types::{
    AdminError, AssignRoleRequest, AuditQuery, CreatePermissionRequest, CreateRoleRequest,
    RoleAssignmentResponse, RolePermissionsResponse, SetRolePermissionsRequest,
    UserPermissionsResponse,
};

// ============================================================================
// Roles
// ============================================================================

/// List roles with their permission keys.
///
/// `GET /api/admin/roles`
#[tracing::instrument(skip(state))]
pub async fn list_roles(
    State(state): State<AppState>,
) -> Result<Json<Vec<RoleWithPermissions>>, AdminError> {
    Ok(Json(permissions::list_roles_with_permissions(&state.db).await?))
}

/// Create a custom role. An existing role with the same name is returned unchanged.
///
/// `POST /api/admin/roles`
#[tracing::instrument(skip(state, principal, body), fields(actor = %principal.user_id, name = %body.name))]
pub async fn create_role(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<CreateRoleRequest>,
) -> Result<(StatusCode, Json<Role>), AdminError> {
    body.check()?;

    let (role, inserted) =
        permissions::upsert_role(&state.db, &body.name, body.description.as_deref(), false).await?;

    if !inserted {
        return Ok((StatusCode::OK, Json(role)));
    }

    write_audit_log(
        &state.db,
        principal.user_id,
        audit_actions::ROLE_CREATED,
        "role",
        Some(role.id),
        serde_json::json!({ "name": role.name }),
    )
    .await?;

    tracing::info!(role_id = %role.id, "Role created");
    Ok((StatusCode::CREATED, Json(role)))
}

/// Replace the permission set of a custom role.
///
/// `PUT /api/admin/roles/{role_id}/permissions`
#[tracing::instrument(skip(state, principal, body), fields(actor = %principal.user_id))]
pub async fn set_role_permissions(
    State(state): State<AppState>,
    principal: Principal,
    Path(role_id): Path<Uuid>,
    Json(body): Json<SetRolePermissionsRequest>,
) -> Result<Json<RolePermissionsResponse>, AdminError> {
    body.validate()
        .map_err(|e| AdminError::Validation(e.to_string()))?;

    let replaced =
        permissions::replace_role_permissions(&state.db, role_id, &body.permissions).await?;

    if replaced.changed {
        write_audit_log(
            &state.db,
            principal.user_id,
            audit_actions::ROLE_PERMISSIONS_UPDATED,
            "role",
            Some(role_id),
            serde_json::json!({ "permissions": replaced.permissions }),
        )
        .await?;
    }

    Ok(Json(RolePermissionsResponse {
        role_id,
        permissions: replaced.permissions,
        changed: replaced.changed,
    }))
}

/// Delete a custom role and all of its assignments.
///
/// `DELETE /api/admin/roles/{role_id}`
#[tracing::instrument(skip(state, principal), fields(actor = %principal.user_id))]
pub async fn delete_role(
    State(state): State<AppState>,
    principal: Principal,
    Path(role_id): Path<Uuid>,
) -> Result<StatusCode, AdminError> {
    let members = permissions::count_role_members(&state.db, role_id).await?;
    let role = permissions::delete_role(&state.db, role_id).await?;

    write_audit_log(
        &state.db,
        principal.user_id,
        audit_actions::ROLE_DELETED,
        "role",
        Some(role.id),
        serde_json::json!({ "name": role.name, "members": members }),
    )
    .await?;

    tracing::info!(role = %role.name, members, "Role deleted");
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Permissions
// ============================================================================

/// List the permission catalog.
///
/// `GET /api/admin/permissions`
#[tracing::instrument(skip(state))]
pub async fn list_permissions(
    State(state): State<AppState>,
) -> Result<Json<Vec<Permission>>, AdminError> {
    Ok(Json(permissions::list_permissions(&state.db).await?))
}

/// Create a permission. An existing permission with the same key is returned unchanged.
///
/// `POST /api/admin/permissions`
#[tracing::instrument(skip(state, principal, body), fields(actor = %principal.user_id, key = %body.key))]
pub async fn create_permission(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<CreatePermissionRequest>,
) -> Result<(StatusCode, Json<Permission>), AdminError> {
    body.validate()
        .map_err(|e| AdminError::Validation(e.to_string()))?;

    let (permission, inserted) = permissions::upsert_permission(
        &state.db,
        &body.key,
        body.description.as_deref(),
        body.category.as_deref(),
    )
    .await?;

    if !inserted {
        return Ok((StatusCode::OK, Json(permission)));
    }

    write_audit_log(
        &state.db,
        principal.user_id,
        audit_actions::PERMISSION_CREATED,
        "permission",
        Some(permission.id),
        serde_json::json!({ "key": permission.key }),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(permission)))
}

/// Delete a permission and withdraw it from every role.
///
/// `DELETE /api/admin/permissions/{permission_id}`
#[tracing::instrument(skip(state, principal), fields(actor = %principal.user_id))]
pub async fn delete_permission(
    State(state): State<AppState>,
    principal: Principal,
    Path(permission_id): Path<Uuid>,
) -> Result<StatusCode, AdminError> {
    let permission = permissions::delete_permission(&state.db, permission_id).await?;

    write_audit_log(
        &state.db,
        principal.user_id,
        audit_actions::PERMISSION_DELETED,
        "permission",
        Some(permission.id),
        serde_json::json!({ "key": permission.key }),
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// User Roles
// ============================================================================

/// Load the target role and check the actor may change it on the target user.
async fn guarded_role(
    state: &AppState,
    principal: &Principal,
    body: &AssignRoleRequest,
) -> Result<Role, AdminError> {
    if !crate::db::user_exists(&state.db, body.user_id).await? {
        return Err(PermissionError::UserNotFound.into());
    }

    let role = find_role_by_name(&state.db, &body.role_name)
        .await?
        .ok_or(PermissionError::RoleNotFound)?;

    can_change_user_role(principal.user_id, &principal.roles, body.user_id, &role)?;
    Ok(role)
}

/// Assign a role to a user. Assigning a held role is a no-op.
///
/// `POST /api/admin/users/roles/assign`
#[tracing::instrument(skip(state, principal, body), fields(actor = %principal.user_id, target = %body.user_id, role = %body.role_name))]
pub async fn assign_role(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<AssignRoleRequest>,
) -> Result<Json<RoleAssignmentResponse>, AdminError> {
    let role = guarded_role(&state, &principal, &body).await?;

    let changed =
        permissions::assign_role_to_user(&state.db, body.user_id, role.id, Some(principal.user_id))
            .await?;

    if changed {
        write_audit_log(
            &state.db,
            principal.user_id,
            audit_actions::ROLE_ASSIGNED,
            "user",
            Some(body.user_id),
            serde_json::json!({ "role": role.name }),
        )
        .await?;
        tracing::info!("Role assigned");
    }

    Ok(Json(RoleAssignmentResponse {
        user_id: body.user_id,
        role_name: role.name,
        changed,
    }))
}

/// Revoke a role from a user. Revoking an unheld role is a no-op.
///
/// `POST /api/admin/users/roles/revoke`
#[tracing::instrument(skip(state, principal, body), fields(actor = %principal.user_id, target = %body.user_id, role = %body.role_name))]
pub async fn revoke_role(
    State(state): State<AppState>,
    principal: Principal,
    Json(body): Json<AssignRoleRequest>,
) -> Result<Json<RoleAssignmentResponse>, AdminError> {
    let role = guarded_role(&state, &principal, &body).await?;

    let changed = permissions::revoke_role_from_user_guarded(&state.db, body.user_id, &role).await?;

    if changed {
        write_audit_log(
            &state.db,
            principal.user_id,
            audit_actions::ROLE_REVOKED,
            "user",
            Some(body.user_id),
            serde_json::json!({ "role": role.name }),
        )
        .await?;
        tracing::info!("Role revoked");
    }

    Ok(Json(RoleAssignmentResponse {
        user_id: body.user_id,
        role_name: role.name,
        changed,
    }))
}

/// Effective roles and permissions of a user.
///
/// `GET /api/admin/users/{user_id}/permissions`
#[tracing::instrument(skip(state))]
pub async fn get_user_permissions(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserPermissionsResponse>, AdminError> {
    let user = find_user_by_id(&state.db, user_id)
        .await?
        .ok_or(PermissionError::UserNotFound)?;

    let resolved = principal_for_user(&state.db, user.clone()).await?;

    Ok(Json(UserPermissionsResponse {
        user: user.into(),
        roles: resolved.roles,
        permissions: resolved.permissions.to_strings(),
    }))
}

// ============================================================================
// Audit Log
// ============================================================================

/// Most recent audit log entries.
///
/// `GET /api/admin/audit`
#[tracing::instrument(skip(state))]
pub async fn get_audit_log(
    State(state): State<AppState>,
    Query(params): Query<AuditQuery>,
) -> Result<Json<Vec<AuditLogEntry>>, AdminError> {
    Ok(Json(query_audit_log(&state.db, params.clamped_limit()).await?))
}
