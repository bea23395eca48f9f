//! Role-based access control.
//!
//! - Users hold roles, roles grant permission keys
//! - A user's permissions are the union over their roles
//! - Routes declare a [`Requirement`] (all of / any of) checked against a [`Principal`]

pub mod helpers;
pub mod key;
pub mod models;
pub mod queries;
pub mod resolver;
pub mod seed;


pub use helpers::{load_principal, principal_for_user, Principal};
pub use key::{InvalidPermissionKey, PermissionKey, PermissionSet, Requirement, WILDCARD};
pub use models::*;
pub use queries::*;
pub use resolver::{
    can_change_user_role, ensure_role_mutable, resolve_user_permissions, union_role_grants,
    PermissionError, SUPER_ADMIN,
};
pub use seed::{catalog, ensure_bootstrap_admin, ensure_default_catalog, DEFAULT_USER_ROLE};
