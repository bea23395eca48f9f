//! Admin module types.

use std::sync::LazyLock;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::db::UserProfile;
use crate::permissions::{PermissionError, PermissionKey};

/// Role names are upper snake case (`TRIP_GUIDE`).
static ROLE_NAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z][A-Z0-9_]*$").expect("valid regex"));

/// Admin API error type.
#[derive(Debug, Error)]
pub enum AdminError {
    /// Validation error.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Database error.
    #[error("Database error")]
    Database(#[from] sqlx::Error),

    /// Permission system error.
    #[error(transparent)]
    Permission(#[from] PermissionError),
}

impl AdminError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            Self::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database"),
            Self::Permission(e) => match e {
                PermissionError::UserNotFound
                | PermissionError::RoleNotFound
                | PermissionError::PermissionNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
                PermissionError::MissingPermission(_) => (StatusCode::FORBIDDEN, "access_denied"),
                PermissionError::SystemRoleProtected(_) => {
                    (StatusCode::FORBIDDEN, "system_role_protected")
                }
                PermissionError::CannotModifySelf => (StatusCode::FORBIDDEN, "cannot_modify_self"),
                PermissionError::LastSuperAdmin => (StatusCode::FORBIDDEN, "last_super_admin"),
                PermissionError::InvalidKey(_) => (StatusCode::BAD_REQUEST, "validation"),
                PermissionError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database"),
            },
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "Admin request failed");
            "Database error".to_string()
        } else {
            self.to_string()
        };

        let body = serde_json::json!({ "error": code, "message": message });
        (status, Json(body)).into_response()
    }
}

// Request types

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRoleRequest {
    #[validate(length(min = 2, max = 64))]
    pub name: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

impl CreateRoleRequest {
    /// Validate field lengths and the role name format.
    pub fn check(&self) -> Result<(), AdminError> {
        self.validate()
            .map_err(|e| AdminError::Validation(e.to_string()))?;
        if !ROLE_NAME_REGEX.is_match(&self.name) {
            return Err(AdminError::Validation(
                "role name must be upper snake case".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetRolePermissionsRequest {
    #[validate(length(max = 500))]
    pub permissions: Vec<PermissionKey>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreatePermissionRequest {
    pub key: PermissionKey,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 64))]
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignRoleRequest {
    pub user_id: Uuid,
    pub role_name: String,
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    pub limit: i64,
}

#[allow(clippy::missing_const_for_fn)]
fn default_audit_limit() -> i64 {
    50
}

impl AuditQuery {
    /// Requested limit clamped to 1..=200.
    #[must_use]
    pub fn clamped_limit(&self) -> i64 {
        self.limit.clamp(1, 200)
    }
}

// Response types

#[derive(Debug, Serialize)]
pub struct RolePermissionsResponse {
    pub role_id: Uuid,
    pub permissions: Vec<String>,
    /// Whether the call changed the stored set.
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct RoleAssignmentResponse {
    pub user_id: Uuid,
    pub role_name: String,
    /// Whether the call changed anything.
    pub changed: bool,
}

#[derive(Debug, Serialize)]
pub struct UserPermissionsResponse {
    pub user: UserProfile,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}
