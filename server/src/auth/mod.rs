//! Authentication Service
//!
//! Handles local accounts, access tokens and the per-request principal.

mod error;
mod handlers;
pub mod jwt;
mod middleware;
mod password;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};

use crate::api::AppState;

pub use error::{AuthError, AuthResult, ErrorResponse};
pub use handlers::{AuthResponse, MeResponse};
pub use middleware::{require_auth, require_permission};
pub use password::{hash_password, verify_password};

/// Create authentication router.
///
/// Public routes (no auth required):
/// - POST /register - Register a new user
/// - POST /login - Login with email/password
///
/// Protected routes (auth required):
/// - GET /me - Current user profile with roles and permissions
pub fn router(state: AppState) -> Router<AppState> {
    let public_routes = Router::new()
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login));

    let protected_routes = Router::new()
        .route("/me", get(handlers::me))
        .layer(axum_middleware::from_fn_with_state(state, require_auth));

    public_routes.merge(protected_routes)
}
