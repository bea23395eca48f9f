//! Database queries for the permission system.
//!
//! Provides async functions for managing:
//! - Roles and permissions (idempotent upserts keyed by name / key)
//! - User role and role permission assignments
//! - Audit logging
//!
//! Every write that must not duplicate rows leans on the table's unique or
//! primary key through `ON CONFLICT`, so concurrent callers cannot race into
//! duplicates.

use std::collections::BTreeMap;

use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgExecutor, PgPool, Row};
use uuid::Uuid;

use super::key::PermissionKey;
use super::models::{
    AuditLogEntry, Permission, ReplacedPermissions, Role, RoleGrants, RolePermission,
    RoleWithPermissions, UserRole,
};
use super::resolver::{ensure_role_mutable, PermissionError, SUPER_ADMIN};

/// Map a foreign key violation on a join table to the missing side.
///
/// Postgres names the constraints `<table>_<column>_fkey`.
fn classify_join_error(err: sqlx::Error, permission_id: Option<Uuid>) -> PermissionError {
    let constraint = err
        .as_database_error()
        .filter(|e| e.is_foreign_key_violation())
        .map(|e| e.constraint().unwrap_or_default().to_string());

    match constraint {
        Some(c) if c.contains("role_id") => PermissionError::RoleNotFound,
        Some(c) if c.contains("permission_id") => PermissionError::PermissionNotFound(
            permission_id.map(|id| id.to_string()).unwrap_or_default(),
        ),
        Some(_) => PermissionError::UserNotFound,
        None => PermissionError::Database(err),
    }
}

// ============================================================================
// Resolution Queries
// ============================================================================

/// Load every role assigned to a user together with the keys it grants.
///
/// Roles without permissions are included with an empty key list. The result
/// is sorted by role name.
pub async fn get_user_role_grants(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<RoleGrants>> {
    let rows: Vec<(String, Option<String>)> = sqlx::query_as(
        r"
        SELECT r.name, p.key
        FROM user_roles ur
        INNER JOIN roles r ON r.id = ur.role_id
        LEFT JOIN role_permissions rp ON rp.role_id = r.id
        LEFT JOIN permissions p ON p.id = rp.permission_id
        WHERE ur.user_id = $1
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut by_role: BTreeMap<String, Vec<PermissionKey>> = BTreeMap::new();
    for (role_name, key) in rows {
        let entry = by_role.entry(role_name).or_default();
        if let Some(key) = key {
            entry.push(PermissionKey::from_trusted(key));
        }
    }

    Ok(by_role
        .into_iter()
        .map(|(role_name, permissions)| RoleGrants {
            role_name,
            permissions,
        })
        .collect())
}

/// Names of the roles assigned to a user, sorted.
pub async fn get_user_role_names(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<String>> {
    sqlx::query_scalar(
        r"
        SELECT r.name
        FROM user_roles ur
        INNER JOIN roles r ON r.id = ur.role_id
        WHERE ur.user_id = $1
        ORDER BY r.name ASC
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

// ============================================================================
// Role Queries
// ============================================================================

/// Get a role by ID.
pub async fn find_role_by_id(pool: &PgPool, role_id: Uuid) -> sqlx::Result<Option<Role>> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1")
        .bind(role_id)
        .fetch_optional(pool)
        .await
}

/// Get a role by its unique name.
pub async fn find_role_by_name<'e>(
    executor: impl PgExecutor<'e>,
    name: &str,
) -> sqlx::Result<Option<Role>> {
    sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE name = $1")
        .bind(name)
        .fetch_optional(executor)
        .await
}

/// List all roles with their permission keys, ordered by name.
pub async fn list_roles_with_permissions(pool: &PgPool) -> sqlx::Result<Vec<RoleWithPermissions>> {
    sqlx::query_as::<_, RoleWithPermissions>(
        r"
        SELECT
            r.id,
            r.name,
            r.description,
            r.is_system,
            COALESCE(
                ARRAY_AGG(p.key ORDER BY p.key) FILTER (WHERE p.key IS NOT NULL),
                '{}'
            ) AS permissions
        FROM roles r
        LEFT JOIN role_permissions rp ON rp.role_id = r.id
        LEFT JOIN permissions p ON p.id = rp.permission_id
        GROUP BY r.id
        ORDER BY r.name ASC
        ",
    )
    .fetch_all(pool)
    .await
}

/// Create a role, or return the existing one with the same name.
///
/// A repeated call changes nothing on the stored row; `description` and
/// `is_system` only apply when the role is first created. The flag is `true`
/// only for the caller whose statement inserted the row.
#[tracing::instrument(skip(pool))]
pub async fn upsert_role(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    is_system: bool,
) -> sqlx::Result<(Role, bool)> {
    // The no-op SET makes RETURNING yield the existing row on conflict.
    // xmax is 0 only on a freshly inserted tuple.
    let row = sqlx::query(
        r"
        INSERT INTO roles (id, name, description, is_system)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING *, (xmax = 0) AS inserted
        ",
    )
    .bind(Uuid::now_v7())
    .bind(name)
    .bind(description)
    .bind(is_system)
    .fetch_one(pool)
    .await?;

    Ok((Role::from_row(&row)?, row.try_get("inserted")?))
}

/// Delete a non-system role. Its assignments are removed by cascade.
///
/// Returns the deleted role.
#[tracing::instrument(skip(pool))]
pub async fn delete_role(pool: &PgPool, role_id: Uuid) -> Result<Role, PermissionError> {
    let role = find_role_by_id(pool, role_id)
        .await?
        .ok_or(PermissionError::RoleNotFound)?;
    ensure_role_mutable(&role)?;

    // is_system re-checked in the statement itself
    sqlx::query_as::<_, Role>(
        r"
        DELETE FROM roles
        WHERE id = $1
          AND is_system = false
        RETURNING *
        ",
    )
    .bind(role_id)
    .fetch_optional(pool)
    .await?
    .ok_or(PermissionError::RoleNotFound)
}

/// Number of users holding a role.
pub async fn count_role_members(pool: &PgPool, role_id: Uuid) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM user_roles WHERE role_id = $1")
        .bind(role_id)
        .fetch_one(pool)
        .await
}

// ============================================================================
// Permission Queries
// ============================================================================

/// Get a permission by its unique key.
pub async fn find_permission_by_key(
    pool: &PgPool,
    key: &PermissionKey,
) -> sqlx::Result<Option<Permission>> {
    sqlx::query_as::<_, Permission>("SELECT * FROM permissions WHERE key = $1")
        .bind(key.as_str())
        .fetch_optional(pool)
        .await
}

/// List all permissions ordered by category, then key.
pub async fn list_permissions(pool: &PgPool) -> sqlx::Result<Vec<Permission>> {
    sqlx::query_as::<_, Permission>(
        r"
        SELECT *
        FROM permissions
        ORDER BY category ASC NULLS LAST, key ASC
        ",
    )
    .fetch_all(pool)
    .await
}

/// Create a permission, or return the existing one with the same key.
///
/// Keys are immutable; a repeated call never rewrites the stored row.
/// The flag is `true` only for the caller that inserted the row.
#[tracing::instrument(skip(pool), fields(key = %key))]
pub async fn upsert_permission(
    pool: &PgPool,
    key: &PermissionKey,
    description: Option<&str>,
    category: Option<&str>,
) -> sqlx::Result<(Permission, bool)> {
    let row = sqlx::query(
        r"
        INSERT INTO permissions (id, key, description, category)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (key) DO UPDATE SET key = EXCLUDED.key
        RETURNING *, (xmax = 0) AS inserted
        ",
    )
    .bind(Uuid::now_v7())
    .bind(key.as_str())
    .bind(description)
    .bind(category)
    .fetch_one(pool)
    .await?;

    Ok((Permission::from_row(&row)?, row.try_get("inserted")?))
}

/// Delete a permission. Role grants are removed by cascade.
#[tracing::instrument(skip(pool))]
pub async fn delete_permission(
    pool: &PgPool,
    permission_id: Uuid,
) -> Result<Permission, PermissionError> {
    sqlx::query_as::<_, Permission>("DELETE FROM permissions WHERE id = $1 RETURNING *")
        .bind(permission_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| PermissionError::PermissionNotFound(permission_id.to_string()))
}

// ============================================================================
// User Role Queries
// ============================================================================

/// Assign a role to a user.
///
/// Re-assignment is a no-op. Returns `true` if a new row was created.
/// Accepts a pool or an open transaction.
#[tracing::instrument(skip(executor))]
pub async fn assign_role_to_user<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    role_id: Uuid,
    assigned_by: Option<Uuid>,
) -> Result<bool, PermissionError> {
    let result = sqlx::query(
        r"
        INSERT INTO user_roles (user_id, role_id, assigned_by)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, role_id) DO NOTHING
        ",
    )
    .bind(user_id)
    .bind(role_id)
    .bind(assigned_by)
    .execute(executor)
    .await
    .map_err(|e| classify_join_error(e, None))?;

    Ok(result.rows_affected() > 0)
}

/// Raw role assignment rows of a user.
pub async fn get_user_role_rows(pool: &PgPool, user_id: Uuid) -> sqlx::Result<Vec<UserRole>> {
    sqlx::query_as::<_, UserRole>(
        r"
        SELECT user_id, role_id, assigned_by, assigned_at
        FROM user_roles
        WHERE user_id = $1
        ORDER BY assigned_at ASC
        ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Remove a role from a user.
///
/// Returns `true` if the user had the role.
#[tracing::instrument(skip(pool))]
pub async fn revoke_role_from_user(
    pool: &PgPool,
    user_id: Uuid,
    role_id: Uuid,
) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
        .bind(user_id)
        .bind(role_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Remove a role from a user, refusing to strip the last `SUPER_ADMIN`.
///
/// For any other role this is [`revoke_role_from_user`]. For `SUPER_ADMIN`
/// the holder rows are locked so two concurrent revokes cannot both pass the
/// last-holder check.
#[tracing::instrument(skip(pool, role), fields(role = %role.name))]
pub async fn revoke_role_from_user_guarded(
    pool: &PgPool,
    user_id: Uuid,
    role: &Role,
) -> Result<bool, PermissionError> {
    if role.name != SUPER_ADMIN {
        return Ok(revoke_role_from_user(pool, user_id, role.id).await?);
    }

    let mut tx = pool.begin().await?;

    let holders: Vec<Uuid> =
        sqlx::query_scalar("SELECT user_id FROM user_roles WHERE role_id = $1 FOR UPDATE")
            .bind(role.id)
            .fetch_all(&mut *tx)
            .await?;

    if !holders.contains(&user_id) {
        return Ok(false);
    }
    if holders.len() <= 1 {
        return Err(PermissionError::LastSuperAdmin);
    }

    sqlx::query("DELETE FROM user_roles WHERE user_id = $1 AND role_id = $2")
        .bind(user_id)
        .bind(role.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

// ============================================================================
// Role Permission Queries
// ============================================================================

/// Grant a permission to a role.
///
/// Re-granting is a no-op. Returns `true` if a new row was created.
#[tracing::instrument(skip(pool))]
pub async fn assign_permission_to_role(
    pool: &PgPool,
    role_id: Uuid,
    permission_id: Uuid,
) -> Result<bool, PermissionError> {
    let result = sqlx::query(
        r"
        INSERT INTO role_permissions (role_id, permission_id)
        VALUES ($1, $2)
        ON CONFLICT (role_id, permission_id) DO NOTHING
        ",
    )
    .bind(role_id)
    .bind(permission_id)
    .execute(pool)
    .await
    .map_err(|e| classify_join_error(e, Some(permission_id)))?;

    Ok(result.rows_affected() > 0)
}

/// Raw permission grant rows of a role.
pub async fn get_role_permission_rows(
    pool: &PgPool,
    role_id: Uuid,
) -> sqlx::Result<Vec<RolePermission>> {
    sqlx::query_as::<_, RolePermission>(
        r"
        SELECT role_id, permission_id, granted_at
        FROM role_permissions
        WHERE role_id = $1
        ORDER BY granted_at ASC
        ",
    )
    .bind(role_id)
    .fetch_all(pool)
    .await
}

/// Withdraw a permission from a role.
///
/// Returns `true` if the role had the permission.
#[tracing::instrument(skip(pool))]
pub async fn revoke_permission_from_role(
    pool: &PgPool,
    role_id: Uuid,
    permission_id: Uuid,
) -> sqlx::Result<bool> {
    let result =
        sqlx::query("DELETE FROM role_permissions WHERE role_id = $1 AND permission_id = $2")
            .bind(role_id)
            .bind(permission_id)
            .execute(pool)
            .await?;

    Ok(result.rows_affected() > 0)
}

/// Replace the full permission set of a non-system role.
///
/// Runs in one transaction: either every key is known and the role ends up
/// with exactly those keys, or nothing changes. Replacing a set with itself
/// writes nothing and reports `changed: false`.
#[tracing::instrument(skip(pool, keys), fields(count = keys.len()))]
pub async fn replace_role_permissions(
    pool: &PgPool,
    role_id: Uuid,
    keys: &[PermissionKey],
) -> Result<ReplacedPermissions, PermissionError> {
    let mut tx = pool.begin().await?;

    let role = sqlx::query_as::<_, Role>("SELECT * FROM roles WHERE id = $1 FOR UPDATE")
        .bind(role_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(PermissionError::RoleNotFound)?;
    ensure_role_mutable(&role)?;

    let wanted: Vec<String> = keys.iter().map(|k| k.as_str().to_string()).collect();
    let found: Vec<(Uuid, String)> =
        sqlx::query_as("SELECT id, key FROM permissions WHERE key = ANY($1)")
            .bind(&wanted)
            .fetch_all(&mut *tx)
            .await?;

    if let Some(unknown) = wanted
        .iter()
        .find(|k| !found.iter().any(|(_, key)| key == *k))
    {
        return Err(PermissionError::PermissionNotFound(unknown.clone()));
    }

    let mut stored: Vec<String> = found.iter().map(|(_, key)| key.clone()).collect();
    stored.sort();

    // Role row lock above keeps this read consistent with the write below
    let mut previous: Vec<String> = sqlx::query_scalar(
        r"
        SELECT p.key
        FROM role_permissions rp
        INNER JOIN permissions p ON p.id = rp.permission_id
        WHERE rp.role_id = $1
        ",
    )
    .bind(role_id)
    .fetch_all(&mut *tx)
    .await?;
    previous.sort();

    if previous == stored {
        tx.commit().await?;
        return Ok(ReplacedPermissions {
            permissions: stored,
            changed: false,
        });
    }

    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut *tx)
        .await?;

    let permission_ids: Vec<Uuid> = found.iter().map(|(id, _)| *id).collect();
    sqlx::query(
        r"
        INSERT INTO role_permissions (role_id, permission_id)
        SELECT $1, UNNEST($2::uuid[])
        ON CONFLICT (role_id, permission_id) DO NOTHING
        ",
    )
    .bind(role_id)
    .bind(&permission_ids)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE roles SET updated_at = NOW() WHERE id = $1")
        .bind(role_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(ReplacedPermissions {
        permissions: stored,
        changed: true,
    })
}

// ============================================================================
// Audit Log Queries
// ============================================================================

/// Write an entry to the audit log.
pub async fn write_audit_log(
    pool: &PgPool,
    actor_id: Uuid,
    action: &str,
    target_type: &str,
    target_id: Option<Uuid>,
    metadata: JsonValue,
) -> sqlx::Result<AuditLogEntry> {
    sqlx::query_as::<_, AuditLogEntry>(
        r"
        INSERT INTO audit_log (id, actor_id, action, target_type, target_id, metadata)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        ",
    )
    .bind(Uuid::now_v7())
    .bind(actor_id)
    .bind(action)
    .bind(target_type)
    .bind(target_id)
    .bind(metadata)
    .fetch_one(pool)
    .await
}

/// Most recent audit log entries first.
pub async fn get_audit_log(pool: &PgPool, limit: i64) -> sqlx::Result<Vec<AuditLogEntry>> {
    sqlx::query_as::<_, AuditLogEntry>(
        r"
        SELECT *
        FROM audit_log
        ORDER BY created_at DESC, id DESC
        LIMIT $1
        ",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
