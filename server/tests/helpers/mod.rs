//! Reusable test helpers for HTTP integration tests.
//!
//! Provides `TestApp` for building and sending requests through the full axum router,
//! plus utilities for user creation, role grants, and JWT generation.
//!
//! ## Pools
//!
//! Every [`TestApp::new`] opens its own pool. sqlx pools are bound to the tokio
//! runtime that created them and each `#[tokio::test]` runs its own runtime.
//! Migrations and the default catalog are idempotent, so each pool applies them.
//! Tests that alter the schema use [`TestApp::with_pool`] over a `#[sqlx::test]`
//! database instead.
//!
//! ## Cleanup Guards
//!
//! Use [`CleanupGuard`] for RAII-based cleanup that runs even if a test panics.
#![allow(dead_code)]

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{self, header, Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use pa_server::api::{create_router, AppState};
use pa_server::auth::jwt;
use pa_server::config::Config;
use pa_server::db;
use pa_server::permissions;
use sqlx::PgPool;
use tokio::sync::OnceCell;
use tower::ServiceExt;
use uuid::Uuid;

// ============================================================================
// Shared resources
// ============================================================================

/// Shared config across all tests in the same binary.
static SHARED_CONFIG: OnceCell<Config> = OnceCell::const_new();

/// Open a pool on the current runtime with migrations and catalog applied.
pub async fn test_pool() -> PgPool {
    let config = shared_config().await;
    let pool = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .expect("Failed to connect to test DB");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");
    permissions::ensure_default_catalog(&pool)
        .await
        .expect("Failed to seed default catalog");
    pool
}

/// Get or create a shared config.
pub async fn shared_config() -> &'static Config {
    SHARED_CONFIG
        .get_or_init(|| async { Config::default_for_test() })
        .await
}

// ============================================================================
// Cleanup Guard
// ============================================================================

/// Async cleanup action type.
type CleanupAction = Box<dyn FnOnce(PgPool) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send>;

/// RAII guard that runs cleanup actions on drop, even if the test panics.
///
/// # Example
///
/// ```ignore
/// let mut guard = app.cleanup_guard();
/// guard.delete_user(user_id);
/// guard.delete_role("PHOTOGRAPHER_1234");
///
/// // Test assertions here, cleanup runs even if these panic
/// assert_eq!(resp.status(), 200);
/// ```
pub struct CleanupGuard {
    pool: PgPool,
    actions: Vec<CleanupAction>,
}

impl CleanupGuard {
    /// Create a new cleanup guard for the given pool.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            actions: Vec::new(),
        }
    }

    /// Register a generic async cleanup action.
    pub fn add<F, Fut>(&mut self, action: F)
    where
        F: FnOnce(PgPool) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.actions
            .push(Box::new(move |pool| Box::pin(action(pool))));
    }

    /// Register cleanup to delete a user by ID (cascades to role assignments).
    pub fn delete_user(&mut self, user_id: Uuid) {
        self.add(move |pool| async move {
            let _ = sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(user_id)
                .execute(&pool)
                .await;
        });
    }

    /// Register cleanup to delete a custom role by name.
    pub fn delete_role(&mut self, name: &str) {
        let name = name.to_string();
        self.add(move |pool| async move {
            let _ = sqlx::query("DELETE FROM roles WHERE name = $1 AND is_system = false")
                .bind(&name)
                .execute(&pool)
                .await;
        });
    }

    /// Register cleanup to delete a permission by key.
    pub fn delete_permission(&mut self, key: &str) {
        let key = key.to_string();
        self.add(move |pool| async move {
            let _ = sqlx::query("DELETE FROM permissions WHERE key = $1")
                .bind(&key)
                .execute(&pool)
                .await;
        });
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let actions = std::mem::take(&mut self.actions);
        if actions.is_empty() {
            return;
        }

        let pool = self.pool.clone();
        let handle = tokio::runtime::Handle::current();

        // Spawn a blocking thread to run async cleanup.
        // This works regardless of tokio runtime flavor.
        std::thread::spawn(move || {
            handle.block_on(async move {
                for action in actions {
                    action(pool.clone()).await;
                }
            });
        })
        .join()
        .expect("Cleanup thread panicked");
    }
}

// ============================================================================
// Test App
// ============================================================================

/// A test application wrapping the full axum router.
pub struct TestApp {
    pub router: Router,
    pub pool: PgPool,
    pub config: Arc<Config>,
}

impl TestApp {
    /// Create a new test app with a pool on the calling test's runtime.
    pub async fn new() -> Self {
        let pool = test_pool().await;
        let config = shared_config().await.clone();

        let router = create_router(AppState::new(pool.clone(), config.clone()));

        Self {
            router,
            pool,
            config: Arc::new(config),
        }
    }

    /// Create a test app over a pool the caller owns, such as a `#[sqlx::test]` database.
    ///
    /// The pool must already be migrated; the default catalog is seeded here.
    pub async fn with_pool(pool: PgPool) -> Self {
        permissions::ensure_default_catalog(&pool)
            .await
            .expect("Failed to seed default catalog");
        let config = shared_config().await.clone();

        let router = create_router(AppState::new(pool.clone(), config.clone()));

        Self {
            router,
            pool,
            config: Arc::new(config),
        }
    }

    /// Build an HTTP request with the given method and URI.
    pub fn request(method: Method, uri: &str) -> http::request::Builder {
        Request::builder().method(method).uri(uri)
    }

    /// Build an authenticated JSON request.
    pub fn json_request(
        method: Method,
        uri: &str,
        token: &str,
        body: &serde_json::Value,
    ) -> Request<Body> {
        Self::request(method, uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("Failed to build request")
    }

    /// Build an authenticated request without a body.
    pub fn authed(method: Method, uri: &str, token: &str) -> Request<Body> {
        Self::request(method, uri)
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .expect("Failed to build request")
    }

    /// Send a request through the router via `tower::ServiceExt::oneshot`.
    pub async fn oneshot(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot request failed")
    }

    /// Create a [`CleanupGuard`] for this app's pool.
    pub fn cleanup_guard(&self) -> CleanupGuard {
        CleanupGuard::new(self.pool.clone())
    }

    /// Generate an access token for the given user.
    pub fn token_for(&self, user_id: Uuid) -> String {
        generate_access_token(&self.config, user_id)
    }
}

// ============================================================================
// User & Auth helpers
// ============================================================================

/// Short random suffix for names that must be unique across test runs.
pub fn unique_suffix() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

/// Create a test user without roles and return `(user_id, email)`.
pub async fn create_test_user(pool: &PgPool) -> (Uuid, String) {
    let email = format!("httptest_{}@example.com", unique_suffix().to_lowercase());
    let user = db::create_user(pool, &email, "HTTP Test User", "hash")
        .await
        .expect("Failed to create test user");
    (user.id, email)
}

/// Assign an existing role to a user by name.
pub async fn grant_role(pool: &PgPool, user_id: Uuid, role_name: &str) {
    let role = permissions::find_role_by_name(pool, role_name)
        .await
        .expect("Failed to look up role")
        .unwrap_or_else(|| panic!("Role {role_name} missing"));
    permissions::assign_role_to_user(pool, user_id, role.id, None)
        .await
        .expect("Failed to assign role");
}

/// Generate an access token for the given user.
pub fn generate_access_token(config: &Config, user_id: Uuid) -> String {
    jwt::generate_access_token(user_id, &config.jwt_secret, config.jwt_access_expiry)
        .expect("Failed to generate access token")
}

/// Collect a response body and parse it as JSON.
pub async fn body_to_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("Failed to collect response body")
        .to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        let preview = String::from_utf8_lossy(&bytes);
        panic!("Failed to parse response as JSON: {e}\nBody: {preview}")
    })
}
