//! Role and Permission Administration
//!
//! Admin endpoints for the RBAC catalog and user role assignments:
//! - Roles: list, create, replace permissions, delete
//! - Permissions: list, create, delete
//! - User roles: assign, revoke, inspect effective permissions
//! - Audit log

pub mod handlers;
pub mod types;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};

use crate::api::AppState;
use crate::auth::{require_auth, require_permission};
use crate::permissions::{catalog, Requirement};

pub use types::AdminError;

/// Create the admin router.
///
/// All routes require authentication. Each method additionally declares its
/// own permission requirement.
pub fn router(state: AppState) -> Router<AppState> {
    let role_list = || from_fn(require_permission(Requirement::one(catalog::ROLE_LIST)));
    let role_manage = || from_fn(require_permission(Requirement::one(catalog::ROLE_MANAGE)));
    let assign_role =
        || from_fn(require_permission(Requirement::one(catalog::USER_ASSIGN_ROLE)));

    Router::new()
        .route(
            "/roles",
            get(handlers::list_roles)
                .layer(role_list())
                .merge(post(handlers::create_role).layer(role_manage())),
        )
        .route(
            "/roles/{role_id}",
            delete(handlers::delete_role).layer(role_manage()),
        )
        .route(
            "/roles/{role_id}/permissions",
            put(handlers::set_role_permissions).layer(role_manage()),
        )
        .route(
            "/permissions",
            get(handlers::list_permissions)
                .layer(role_list())
                .merge(post(handlers::create_permission).layer(role_manage())),
        )
        .route(
            "/permissions/{permission_id}",
            delete(handlers::delete_permission).layer(role_manage()),
        )
        .route(
            "/users/roles/assign",
            post(handlers::assign_role).layer(assign_role()),
        )
        .route(
            "/users/roles/revoke",
            post(handlers::revoke_role).layer(assign_role()),
        )
        .route(
            "/users/{user_id}/permissions",
            get(handlers::get_user_permissions).layer(from_fn(require_permission(
                Requirement::any_of(&[catalog::USER_VIEW, catalog::USER_LIST]),
            ))),
        )
        .route(
            "/audit",
            get(handlers::get_audit_log).layer(from_fn(require_permission(Requirement::one(
                catalog::AUDIT_VIEW,
            )))),
        )
        .layer(from_fn_with_state(state, require_auth))
}
