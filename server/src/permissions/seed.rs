//! Default permission catalog and startup seeding.
//!
//! Everything here is idempotent, so it is safe to run on every boot.

use anyhow::Context;
use sqlx::PgPool;
use uuid::Uuid;

use super::key::PermissionKey;
use super::queries::{
    assign_permission_to_role, assign_role_to_user, find_role_by_name, upsert_permission,
    upsert_role,
};
use super::resolver::{PermissionError, SUPER_ADMIN};

/// Keys the server itself checks on its routes.
pub mod catalog {
    pub const ROLE_LIST: &str = "role:list";
    pub const ROLE_MANAGE: &str = "role:manage";
    pub const USER_ASSIGN_ROLE: &str = "user:assign-role";
    pub const USER_VIEW: &str = "user:view";
    pub const USER_LIST: &str = "user:list";
    pub const AUDIT_VIEW: &str = "audit:view";
}

/// Role given to every newly registered user.
pub const DEFAULT_USER_ROLE: &str = "USER";

/// `(key, description, category)`
pub const DEFAULT_PERMISSIONS: &[(&str, &str, &str)] = &[
    // Trips
    ("trip:create", "Create new trips", "trips"),
    ("trip:read", "Read/View trips", "trips"),
    ("trip:update", "Update trips", "trips"),
    ("trip:edit", "Edit trips owned by others", "trips"),
    ("trip:delete", "Delete trips", "trips"),
    ("trip:publish", "Publish trips", "trips"),
    ("trip:view:internal", "View internal/draft trips", "trips"),
    ("trip:assign-guide", "Assign guides to trips", "trips"),
    ("trip:assign-manager", "Assign managers to trips", "trips"),
    // Bookings
    ("booking:read", "View bookings", "bookings"),
    ("booking:create", "Create bookings", "bookings"),
    ("booking:update", "Update bookings", "bookings"),
    ("booking:cancel", "Cancel bookings", "bookings"),
    ("booking:refund", "Process refunds", "bookings"),
    ("booking:manage", "Manage all bookings", "bookings"),
    // Users
    ("user:list", "List users", "users"),
    ("user:view", "View user details and permissions", "users"),
    ("user:create", "Create users", "users"),
    ("user:update", "Update user details", "users"),
    ("user:delete", "Delete users", "users"),
    ("user:ban", "Ban/suspend users", "users"),
    ("user:assign-role", "Assign and revoke user roles", "users"),
    // Blogs
    ("blog:create", "Create blog posts", "blogs"),
    ("blog:read", "Read blog posts", "blogs"),
    ("blog:update", "Update blog posts", "blogs"),
    ("blog:edit", "Edit blog posts owned by others", "blogs"),
    ("blog:delete", "Delete blog posts", "blogs"),
    // Media
    ("media:upload", "Upload media files", "media"),
    ("media:read", "View/Download media", "media"),
    ("media:update", "Update media details", "media"),
    ("media:delete", "Delete media", "media"),
    ("media:manage", "Manage media library", "media"),
    // Reviews
    ("review:read", "Read reviews", "reviews"),
    ("review:moderate", "Moderate reviews", "reviews"),
    ("review:delete", "Delete reviews", "reviews"),
    // Admin
    ("admin:access", "Access admin panel", "admin"),
    ("admin:settings", "Manage system settings", "admin"),
    ("audit:view", "View audit logs", "admin"),
    ("metrics:read", "Read platform metrics", "admin"),
    // Roles
    ("role:list", "List roles and permissions", "roles"),
    ("role:manage", "Create, change and delete roles and permissions", "roles"),
];

/// A role created by the seed together with its default keys.
#[derive(Debug, Clone, Copy)]
pub struct DefaultRole {
    pub name: &'static str,
    pub description: &'static str,
    pub is_system: bool,
    pub permissions: Bundle,
}

/// How a default role's keys are chosen from [`DEFAULT_PERMISSIONS`].
#[derive(Debug, Clone, Copy)]
pub enum Bundle {
    All,
    AllExcept(&'static [&'static str]),
    Only(&'static [&'static str]),
}

impl Bundle {
    /// Catalog keys included in this bundle, in catalog order.
    #[must_use]
    pub fn keys(&self) -> Vec<&'static str> {
        let catalog = DEFAULT_PERMISSIONS.iter().map(|(key, _, _)| *key);
        match self {
            Self::All => catalog.collect(),
            Self::AllExcept(excluded) => catalog.filter(|k| !excluded.contains(k)).collect(),
            Self::Only(keys) => keys.to_vec(),
        }
    }
}

pub const DEFAULT_ROLES: &[DefaultRole] = &[
    DefaultRole {
        name: SUPER_ADMIN,
        description: "Super Administrator - Full system access",
        is_system: true,
        permissions: Bundle::All,
    },
    DefaultRole {
        name: "ADMIN",
        description: "Administrator - Full admin panel access",
        is_system: true,
        permissions: Bundle::AllExcept(&["user:delete", "role:manage", "booking:refund"]),
    },
    DefaultRole {
        name: "TRIP_MANAGER",
        description: "Trip Manager - Trip & booking management",
        is_system: true,
        permissions: Bundle::Only(&[
            "trip:read",
            "trip:create",
            "trip:update",
            "trip:view:internal",
            "trip:assign-guide",
            "booking:read",
            "booking:create",
            "booking:update",
            "booking:cancel",
            "media:upload",
            "media:read",
            "media:manage",
            "user:view",
        ]),
    },
    DefaultRole {
        name: "TRIP_GUIDE",
        description: "Trip Guide - Assigned trips management",
        is_system: true,
        permissions: Bundle::Only(&[
            "trip:read",
            "trip:view:internal",
            "booking:read",
            "booking:update",
            "review:moderate",
            "media:upload",
            "media:read",
        ]),
    },
    DefaultRole {
        name: "UPLOADER",
        description: "Uploader - Media library management",
        is_system: true,
        permissions: Bundle::Only(&[
            "media:upload",
            "media:read",
            "media:update",
            "media:delete",
            "media:manage",
        ]),
    },
    DefaultRole {
        name: DEFAULT_USER_ROLE,
        description: "Regular User - Basic user access",
        is_system: false,
        permissions: Bundle::Only(&[
            "trip:read",
            "blog:read",
            "review:read",
            "media:read",
            "booking:read",
        ]),
    },
];

/// Counts of rows created by one seed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub permissions: usize,
    pub roles: usize,
    pub grants_added: usize,
}

/// Create the default permissions and roles and grant each role its bundle.
///
/// Existing rows are left as they are. System roles get their bundle back on
/// every run. Non-system roles only receive it when this run created them, so
/// an operator's edits to them survive restarts.
#[tracing::instrument(skip(pool))]
pub async fn ensure_default_catalog(pool: &PgPool) -> Result<SeedSummary, PermissionError> {
    let mut summary = SeedSummary::default();

    let mut permission_ids = Vec::with_capacity(DEFAULT_PERMISSIONS.len());
    for (key, description, category) in DEFAULT_PERMISSIONS {
        let key = PermissionKey::parse(key)?;
        let (permission, _) =
            upsert_permission(pool, &key, Some(*description), Some(*category)).await?;
        permission_ids.push((permission.key, permission.id));
    }
    summary.permissions = permission_ids.len();

    for default in DEFAULT_ROLES {
        let (role, inserted) =
            upsert_role(pool, default.name, Some(default.description), default.is_system).await?;
        summary.roles += 1;

        if !inserted && !role.is_system {
            continue;
        }

        for key in default.permissions.keys() {
            let Some((_, permission_id)) = permission_ids.iter().find(|(k, _)| k == key) else {
                return Err(PermissionError::PermissionNotFound(key.to_string()));
            };
            if assign_permission_to_role(pool, role.id, *permission_id).await? {
                summary.grants_added += 1;
            }
        }
    }

    tracing::info!(
        permissions = summary.permissions,
        roles = summary.roles,
        grants_added = summary.grants_added,
        "Default permission catalog ensured"
    );
    Ok(summary)
}

/// Make sure the configured bootstrap account exists and holds `SUPER_ADMIN`.
///
/// An existing account keeps its password. Returns the account's user ID.
#[tracing::instrument(skip(pool, password))]
pub async fn ensure_bootstrap_admin(
    pool: &PgPool,
    email: &str,
    password: &str,
) -> anyhow::Result<Uuid> {
    let user = match crate::db::find_user_by_email(pool, email).await? {
        Some(user) => user,
        None => {
            let hash = crate::auth::hash_password(password)
                .map_err(|e| anyhow::anyhow!("hashing bootstrap admin password: {e}"))?;
            let user = crate::db::create_user(pool, email, "Administrator", &hash).await?;
            tracing::info!(user_id = %user.id, "Created bootstrap admin account");
            user
        }
    };

    let role = find_role_by_name(pool, SUPER_ADMIN)
        .await?
        .context("SUPER_ADMIN role missing; enable SEED_DEFAULT_CATALOG")?;

    if assign_role_to_user(pool, user.id, role.id, None).await? {
        tracing::info!(user_id = %user.id, "Granted SUPER_ADMIN to bootstrap admin");
    }

    Ok(user.id)
}
