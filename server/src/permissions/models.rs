//! Database models for the permission system.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::key::PermissionKey;

/// Named permission bundle.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Atomic capability.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Permission {
    pub id: Uuid,
    pub key: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// User ↔ Role join row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserRole {
    pub user_id: Uuid,
    pub role_id: Uuid,
    pub assigned_by: Option<Uuid>,
    pub assigned_at: DateTime<Utc>,
}

/// Role ↔ Permission join row.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RolePermission {
    pub role_id: Uuid,
    pub permission_id: Uuid,
    pub granted_at: DateTime<Utc>,
}

/// Role with its permission keys, as listed by the admin API.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct RoleWithPermissions {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub permissions: Vec<String>,
}

/// Permissions granted by one role, already loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrants {
    pub role_name: String,
    pub permissions: Vec<PermissionKey>,
}

/// Outcome of replacing a role's permission set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacedPermissions {
    /// Stored keys, sorted.
    pub permissions: Vec<String>,
    /// Whether the stored set differs from the previous one.
    pub changed: bool,
}

/// Audit log entry.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub actor_id: Option<Uuid>,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<Uuid>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Audit actions recorded by the admin API.
pub mod audit_actions {
    pub const ROLE_CREATED: &str = "ROLE_CREATED";
    pub const ROLE_DELETED: &str = "ROLE_DELETED";
    pub const ROLE_PERMISSIONS_UPDATED: &str = "ROLE_PERMISSIONS_UPDATED";
    pub const ROLE_ASSIGNED: &str = "ROLE_ASSIGNED";
    pub const ROLE_REVOKED: &str = "ROLE_REVOKED";
    pub const PERMISSION_CREATED: &str = "PERMISSION_CREATED";
    pub const PERMISSION_DELETED: &str = "PERMISSION_DELETED";
}
