//! Authentication HTTP Handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

use super::error::{AuthError, AuthResult};
use super::jwt::generate_access_token;
use super::password::{hash_password, verify_password};
use crate::api::AppState;
use crate::db::{self, email_exists, find_user_by_email, UserProfile};
use crate::permissions::{assign_role_to_user, find_role_by_name, Principal, DEFAULT_USER_ROLE};

// ============================================================================
// Request/Response Types
// ============================================================================

/// Registration request.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email, length(max = 254))]
    pub email: String,
    /// Display name (1-64 characters).
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    /// Password (8-128 characters).
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Login request.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Authentication response with an access token.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    /// Token type (always "Bearer").
    pub token_type: String,
    /// Access token expiry in seconds.
    pub expires_in: i64,
    pub user: UserProfile,
}

/// Current user with effective authorization.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub profile: UserProfile,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
}

fn auth_response(state: &AppState, user: db::User) -> AuthResult<AuthResponse> {
    let access_token =
        generate_access_token(user.id, &state.config.jwt_secret, state.config.jwt_access_expiry)?;

    Ok(AuthResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.config.jwt_access_expiry,
        user: user.into(),
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// Register a new local account.
///
/// POST /auth/register
#[tracing::instrument(skip(state, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AuthResult<(StatusCode, Json<AuthResponse>)> {
    body.validate()
        .map_err(|e| AuthError::Validation(e.to_string()))?;

    let email = body.email.trim().to_lowercase();

    // Unique index on LOWER(email) catches races
    if email_exists(&state.db, &email).await? {
        return Err(AuthError::UserAlreadyExists);
    }

    let password_hash = hash_password(&body.password).map_err(|_| AuthError::PasswordHash)?;

    // Account and default role commit together or not at all
    let mut tx = state.db.begin().await.map_err(|e| {
        tracing::error!(error = %e, "Failed to start registration transaction");
        e
    })?;

    let user = db::create_user(&mut *tx, &email, body.name.trim(), &password_hash)
        .await
        .map_err(|e| {
            if e.as_database_error().is_some_and(|d| d.is_unique_violation()) {
                AuthError::UserAlreadyExists
            } else {
                e.into()
            }
        })?;

    assign_default_role(&mut *tx, user.id).await?;

    tx.commit().await.map_err(|e| {
        tracing::error!(
            error = %e,
            user_id = %user.id,
            "Failed to commit registration transaction"
        );
        e
    })?;

    tracing::info!(user_id = %user.id, "User registered");
    Ok((StatusCode::CREATED, Json(auth_response(&state, user)?)))
}

/// Give a new account the default role, if the catalog has one.
async fn assign_default_role(tx: &mut PgConnection, user_id: Uuid) -> AuthResult<()> {
    match find_role_by_name(&mut *tx, DEFAULT_USER_ROLE).await? {
        Some(role) => {
            assign_role_to_user(&mut *tx, user_id, role.id, None)
                .await
                .map_err(|e| {
                    tracing::error!(
                        error = %e,
                        user_id = %user_id,
                        "Failed to grant default role - transaction will rollback"
                    );
                    e
                })?;
        }
        None => tracing::warn!(
            user_id = %user_id,
            role = DEFAULT_USER_ROLE,
            "Default role missing, new user has no roles"
        ),
    }
    Ok(())
}

/// Login with email/password.
///
/// POST /auth/login
#[tracing::instrument(skip(state, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AuthResult<Json<AuthResponse>> {
    let Some(user) = find_user_by_email(&state.db, body.email.trim()).await? else {
        tracing::debug!("Login for unknown email");
        return Err(AuthError::InvalidCredentials);
    };

    let valid = verify_password(&body.password, &user.password_hash)
        .map_err(|_| AuthError::PasswordHash)?;
    if !valid {
        tracing::debug!(user_id = %user.id, "Login with wrong password");
        return Err(AuthError::InvalidCredentials);
    }

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(auth_response(&state, user)?))
}

/// Current user's profile, roles and permissions.
///
/// GET /auth/me
#[tracing::instrument(skip(state, principal), fields(user_id = %principal.user_id))]
pub async fn me(
    State(state): State<AppState>,
    principal: Principal,
) -> AuthResult<Json<MeResponse>> {
    let user = db::find_user_by_id(&state.db, principal.user_id)
        .await?
        .ok_or(AuthError::UserNotFound)?;

    Ok(Json(MeResponse {
        profile: user.into(),
        roles: principal.roles,
        permissions: principal.permissions.to_strings(),
    }))
}
