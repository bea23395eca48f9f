//! Authentication and Authorization Middleware

use std::future::Future;
use std::pin::Pin;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::AppState;
use crate::db::find_user_by_id;
use crate::permissions::{principal_for_user, Principal, Requirement};

use super::error::AuthError;
use super::jwt::validate_access_token;

/// Middleware to require authentication.
///
/// Extracts the Bearer token from the Authorization header, validates the JWT,
/// loads the user with their roles and permissions, and injects the resulting
/// [`Principal`] into request extensions.
///
/// # Usage
///
/// ```ignore
/// Router::new()
///     .route("/protected", get(handler))
///     .layer(axum::middleware::from_fn_with_state(state, require_auth))
/// ```
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?;

    let claims = validate_access_token(token, &state.config.jwt_secret)?;
    let user_id = claims.user_id()?;

    // Token may outlive the account
    let user = find_user_by_id(&state.db, user_id)
        .await?
        .ok_or(AuthError::InvalidToken)?;

    let principal = principal_for_user(&state.db, user).await?;
    tracing::debug!(
        user_id = %principal.user_id,
        roles = ?principal.roles,
        permissions = principal.permissions.len(),
        "Authenticated request"
    );
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

/// Build a middleware that rejects requests whose principal does not satisfy `requirement`.
///
/// Must be layered inside [`require_auth`]. A request without a principal is
/// treated as unauthenticated.
///
/// ```ignore
/// Router::new()
///     .route("/audit", get(handler))
///     .layer(axum::middleware::from_fn(require_permission(Requirement::one("audit:view"))))
/// ```
pub fn require_permission(
    requirement: Requirement,
) -> impl Fn(Request, Next) -> Pin<Box<dyn Future<Output = Response> + Send>> + Clone + Send + 'static
{
    move |request: Request, next: Next| {
        let requirement = requirement.clone();
        Box::pin(async move {
            let Some(principal) = request.extensions().get::<Principal>() else {
                return AuthError::MissingAuthHeader.into_response();
            };

            if !principal.satisfies(&requirement) {
                tracing::warn!(
                    user_id = %principal.user_id,
                    requirement = %requirement,
                    missing = ?requirement.missing(&principal.permissions),
                    "Permission denied"
                );
                return AuthError::AccessDenied(requirement.to_string()).into_response();
            }

            next.run(request).await
        })
    }
}

/// Extractor for the authenticated principal in handlers.
///
/// ```ignore
/// async fn protected_handler(principal: Principal) -> impl IntoResponse {
///     format!("Hello, {}!", principal.name)
/// }
/// ```
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Self>()
            .cloned()
            .ok_or(AuthError::MissingAuthHeader)
    }
}
