//! HTTP Integration Tests for authentication and role administration
//!
//! Covers registration with the default role, permission-gated admin routes,
//! the role lifecycle and the assignment guards.
//!
//! Run with: `cargo test --test rbac_http_test -- --nocapture`

mod helpers;

use axum::body::Body;
use axum::http::{Method, StatusCode};
use helpers::{body_to_json, create_test_user, grant_role, unique_suffix, TestApp};
use serial_test::serial;
use sqlx::PgPool;
use tokio::task::JoinSet;
use tower::ServiceExt;
use uuid::Uuid;

fn json_body(value: &serde_json::Value) -> Body {
    Body::from(value.to_string())
}

fn register_request(email: &str) -> axum::http::Request<Body> {
    TestApp::request(Method::POST, "/auth/register")
        .header("Content-Type", "application/json")
        .body(json_body(&serde_json::json!({
            "email": email,
            "name": "Trail Walker",
            "password": "correct-horse-battery",
        })))
        .unwrap()
}

async fn audit_rows(pool: &PgPool, action: &str, target_id: Uuid) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM audit_log WHERE action = $1 AND target_id = $2")
        .bind(action)
        .bind(target_id)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn strings(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .expect("expected array")
        .iter()
        .map(|v| v.as_str().expect("expected string").to_string())
        .collect()
}

// ============================================================================
// Health & Auth
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_health_reports_database() {
    let app = TestApp::new().await;

    let req = TestApp::request(Method::GET, "/health")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_to_json(resp).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["database"], true);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_register_assigns_default_role() {
    let app = TestApp::new().await;
    let email = format!("Register_{}@Example.com", unique_suffix());

    let req = TestApp::request(Method::POST, "/auth/register")
        .header("Content-Type", "application/json")
        .body(json_body(&serde_json::json!({
            "email": email,
            "name": "Trail Walker",
            "password": "correct-horse-battery",
        })))
        .unwrap();
    let resp = app.oneshot(req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let json = body_to_json(resp).await;
    let user_id: Uuid = json["user"]["id"].as_str().unwrap().parse().unwrap();
    let mut guard = app.cleanup_guard();
    guard.delete_user(user_id);

    assert_eq!(json["token_type"], "Bearer");
    assert_eq!(json["user"]["email"], email.to_lowercase());
    assert!(json["user"].get("password_hash").is_none());

    let token = json["access_token"].as_str().unwrap();
    let resp = app.oneshot(TestApp::authed(Method::GET, "/auth/me", token)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let me = body_to_json(resp).await;
    assert_eq!(me["id"], user_id.to_string());
    assert_eq!(strings(&me["roles"]), vec!["USER".to_string()]);
    let perms = strings(&me["permissions"]);
    assert!(perms.contains(&"trip:read".to_string()));
    assert!(!perms.contains(&"role:manage".to_string()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_register_duplicate_and_login() {
    let app = TestApp::new().await;
    let email = format!("dup_{}@example.com", unique_suffix().to_lowercase());
    let register = serde_json::json!({
        "email": email,
        "name": "Dup",
        "password": "correct-horse-battery",
    });

    let req = TestApp::request(Method::POST, "/auth/register")
        .header("Content-Type", "application/json")
        .body(json_body(&register))
        .unwrap();
    let resp = app.oneshot(req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = body_to_json(resp).await;
    let user_id: Uuid = json["user"]["id"].as_str().unwrap().parse().unwrap();
    let mut guard = app.cleanup_guard();
    guard.delete_user(user_id);

    let req = TestApp::request(Method::POST, "/auth/register")
        .header("Content-Type", "application/json")
        .body(json_body(&register))
        .unwrap();
    let resp = app.oneshot(req).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_to_json(resp).await["error"], "USER_EXISTS");

    let req = TestApp::request(Method::POST, "/auth/login")
        .header("Content-Type", "application/json")
        .body(json_body(&serde_json::json!({
            "email": email.to_uppercase(),
            "password": "correct-horse-battery",
        })))
        .unwrap();
    let resp = app.oneshot(req).await;
    assert_eq!(resp.status(), StatusCode::OK, "login is case-insensitive on email");

    let req = TestApp::request(Method::POST, "/auth/login")
        .header("Content-Type", "application/json")
        .body(json_body(&serde_json::json!({
            "email": email,
            "password": "wrong-password",
        })))
        .unwrap();
    let resp = app.oneshot(req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[sqlx::test]
async fn test_failed_default_grant_rolls_back_registration(pool: PgPool) {
    let app = TestApp::with_pool(pool).await;
    let email = "rollback@example.com";

    sqlx::query(
        r"
        CREATE FUNCTION reject_user_roles() RETURNS trigger AS $$
        BEGIN
            RAISE EXCEPTION 'user_roles insert rejected';
        END
        $$ LANGUAGE plpgsql
        ",
    )
    .execute(&app.pool)
    .await
    .unwrap();
    sqlx::query(
        r"
        CREATE TRIGGER reject_user_roles BEFORE INSERT ON user_roles
        FOR EACH ROW EXECUTE FUNCTION reject_user_roles()
        ",
    )
    .execute(&app.pool)
    .await
    .unwrap();

    let resp = app.oneshot(register_request(email)).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = $1")
        .bind(email)
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(users, 0, "account must not outlive its failed role grant");

    sqlx::query("DROP TRIGGER reject_user_roles ON user_roles")
        .execute(&app.pool)
        .await
        .unwrap();

    // The address is still free
    let resp = app.oneshot(register_request(email)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = body_to_json(resp).await;
    let token = json["access_token"].as_str().unwrap();

    let resp = app.oneshot(TestApp::authed(Method::GET, "/auth/me", token)).await;
    let me = body_to_json(resp).await;
    assert_eq!(strings(&me["roles"]), vec!["USER".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_admin_routes_require_token() {
    let app = TestApp::new().await;

    let req = TestApp::request(Method::GET, "/api/admin/roles")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .oneshot(TestApp::authed(Method::GET, "/api/admin/roles", "not-a-jwt"))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_token_for_deleted_user_is_rejected() {
    let app = TestApp::new().await;
    let (user_id, _) = create_test_user(&app.pool).await;
    let token = app.token_for(user_id);

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&app.pool)
        .await
        .unwrap();

    let resp = app.oneshot(TestApp::authed(Method::GET, "/auth/me", &token)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

// ============================================================================
// Permission gates
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_plain_user_is_forbidden_from_admin() {
    let app = TestApp::new().await;
    let (user_id, _) = create_test_user(&app.pool).await;
    grant_role(&app.pool, user_id, "USER").await;
    let mut guard = app.cleanup_guard();
    guard.delete_user(user_id);
    let token = app.token_for(user_id);

    let resp = app
        .oneshot(TestApp::authed(Method::GET, "/api/admin/roles", &token))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_to_json(resp).await["error"], "ACCESS_DENIED");

    let resp = app
        .oneshot(TestApp::json_request(
            Method::POST,
            "/api/admin/roles",
            &token,
            &serde_json::json!({ "name": "SNEAKY" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_admin_can_list_but_not_manage_roles() {
    let app = TestApp::new().await;
    let (admin_id, _) = create_test_user(&app.pool).await;
    grant_role(&app.pool, admin_id, "ADMIN").await;
    let mut guard = app.cleanup_guard();
    guard.delete_user(admin_id);
    let token = app.token_for(admin_id);

    let resp = app
        .oneshot(TestApp::authed(Method::GET, "/api/admin/roles", &token))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let roles = body_to_json(resp).await;
    let names: Vec<&str> = roles
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"SUPER_ADMIN"));
    assert!(names.contains(&"USER"));

    // role:manage is withheld from ADMIN
    let resp = app
        .oneshot(TestApp::json_request(
            Method::POST,
            "/api/admin/roles",
            &token,
            &serde_json::json!({ "name": format!("NOPE_{}", unique_suffix()) }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_user_permissions_route_accepts_either_key() {
    let app = TestApp::new().await;
    let (viewer_id, _) = create_test_user(&app.pool).await;
    let (target_id, _) = create_test_user(&app.pool).await;
    grant_role(&app.pool, target_id, "USER").await;

    // A custom role holding only user:list
    let role_name = format!("LISTER_{}", unique_suffix());
    let (role, _) = pa_server::permissions::upsert_role(&app.pool, &role_name, None, false)
        .await
        .unwrap();
    let key = pa_server::permissions::PermissionKey::parse("user:list").unwrap();
    pa_server::permissions::replace_role_permissions(&app.pool, role.id, &[key])
        .await
        .unwrap();
    grant_role(&app.pool, viewer_id, &role_name).await;

    let mut guard = app.cleanup_guard();
    guard.delete_user(viewer_id);
    guard.delete_user(target_id);
    guard.delete_role(&role_name);

    let token = app.token_for(viewer_id);
    let uri = format!("/api/admin/users/{target_id}/permissions");
    let resp = app.oneshot(TestApp::authed(Method::GET, &uri, &token)).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let json = body_to_json(resp).await;
    assert_eq!(json["user"]["id"], target_id.to_string());
    assert_eq!(strings(&json["roles"]), vec!["USER".to_string()]);
    assert!(strings(&json["permissions"]).contains(&"booking:read".to_string()));

    // Same role cannot reach the audit log
    let resp = app
        .oneshot(TestApp::authed(Method::GET, "/api/admin/audit", &token))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let uri = format!("/api/admin/users/{}/permissions", Uuid::new_v4());
    let resp = app.oneshot(TestApp::authed(Method::GET, &uri, &token)).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Role lifecycle
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_super_admin_role_lifecycle() {
    let app = TestApp::new().await;
    let (root_id, _) = create_test_user(&app.pool).await;
    let (member_id, _) = create_test_user(&app.pool).await;
    grant_role(&app.pool, root_id, "SUPER_ADMIN").await;

    let role_name = format!("PHOTOGRAPHER_{}", unique_suffix());
    let mut guard = app.cleanup_guard();
    guard.delete_user(member_id);
    guard.delete_user(root_id);
    guard.delete_role(&role_name);

    let token = app.token_for(root_id);
    let member_token = app.token_for(member_id);

    // Create
    let create = serde_json::json!({ "name": role_name, "description": "Takes trip photos" });
    let resp = app
        .oneshot(TestApp::json_request(Method::POST, "/api/admin/roles", &token, &create))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let role = body_to_json(resp).await;
    let role_id = role["id"].as_str().unwrap().to_string();
    assert_eq!(role["is_system"], false);

    // Creating again returns the existing role
    let resp = app
        .oneshot(TestApp::json_request(Method::POST, "/api/admin/roles", &token, &create))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_to_json(resp).await["id"], role_id.as_str());

    // Set permissions
    let resp = app
        .oneshot(TestApp::json_request(
            Method::PUT,
            &format!("/api/admin/roles/{role_id}/permissions"),
            &token,
            &serde_json::json!({ "permissions": ["media:upload", "media:read", "media:upload"] }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let mut stored = strings(&body_to_json(resp).await["permissions"]);
    stored.sort();
    assert_eq!(stored, vec!["media:read".to_string(), "media:upload".to_string()]);

    // Assign and observe through /auth/me
    let assign = serde_json::json!({ "user_id": member_id, "role_name": role_name });
    let resp = app
        .oneshot(TestApp::json_request(
            Method::POST,
            "/api/admin/users/roles/assign",
            &token,
            &assign,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_to_json(resp).await["changed"], true);

    let resp = app
        .oneshot(TestApp::json_request(
            Method::POST,
            "/api/admin/users/roles/assign",
            &token,
            &assign,
        ))
        .await;
    assert_eq!(body_to_json(resp).await["changed"], false, "second assign is a no-op");

    let resp = app
        .oneshot(TestApp::authed(Method::GET, "/auth/me", &member_token))
        .await;
    let me = body_to_json(resp).await;
    assert!(strings(&me["roles"]).contains(&role_name));
    assert!(strings(&me["permissions"]).contains(&"media:upload".to_string()));

    // Revoke
    let resp = app
        .oneshot(TestApp::json_request(
            Method::POST,
            "/api/admin/users/roles/revoke",
            &token,
            &assign,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_to_json(resp).await["changed"], true);

    let resp = app
        .oneshot(TestApp::authed(Method::GET, "/auth/me", &member_token))
        .await;
    let me = body_to_json(resp).await;
    assert!(!strings(&me["permissions"]).contains(&"media:upload".to_string()));

    // Delete
    let resp = app
        .oneshot(TestApp::authed(
            Method::DELETE,
            &format!("/api/admin/roles/{role_id}"),
            &token,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // Audit trail
    let resp = app
        .oneshot(TestApp::authed(Method::GET, "/api/admin/audit?limit=200", &token))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let entries = body_to_json(resp).await;
    let actions: Vec<&str> = entries
        .as_array()
        .unwrap()
        .iter()
        .filter(|e| e["actor_id"] == root_id.to_string())
        .map(|e| e["action"].as_str().unwrap())
        .collect();
    for expected in [
        "ROLE_CREATED",
        "ROLE_PERMISSIONS_UPDATED",
        "ROLE_ASSIGNED",
        "ROLE_REVOKED",
        "ROLE_DELETED",
    ] {
        assert!(actions.contains(&expected), "missing audit action {expected}");
    }
    assert_eq!(
        actions.iter().filter(|a| **a == "ROLE_ASSIGNED").count(),
        1,
        "no-op assignment is not audited"
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn test_concurrent_role_creation_reports_one_creator() {
    let app = TestApp::new().await;
    let (root_id, _) = create_test_user(&app.pool).await;
    grant_role(&app.pool, root_id, "SUPER_ADMIN").await;

    let role_name = format!("RACER_{}", unique_suffix());
    let mut guard = app.cleanup_guard();
    guard.delete_user(root_id);
    guard.delete_role(&role_name);

    let token = app.token_for(root_id);
    let create = serde_json::json!({ "name": role_name });
    let mut requests = JoinSet::new();
    for _ in 0..8 {
        let router = app.router.clone();
        let req = TestApp::json_request(Method::POST, "/api/admin/roles", &token, &create);
        requests.spawn(async move { router.oneshot(req).await.unwrap() });
    }

    let mut created = 0;
    let mut role_ids = Vec::new();
    while let Some(resp) = requests.join_next().await {
        let resp = resp.unwrap();
        match resp.status() {
            StatusCode::CREATED => created += 1,
            StatusCode::OK => {}
            other => panic!("unexpected status {other}"),
        }
        role_ids.push(body_to_json(resp).await["id"].as_str().unwrap().to_string());
    }
    assert_eq!(created, 1, "exactly one request creates the role");
    role_ids.dedup();
    assert_eq!(role_ids.len(), 1);

    let role_id: Uuid = role_ids[0].parse().unwrap();
    assert_eq!(audit_rows(&app.pool, "ROLE_CREATED", role_id).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_unchanged_permission_set_is_not_audited() {
    let app = TestApp::new().await;
    let (root_id, _) = create_test_user(&app.pool).await;
    grant_role(&app.pool, root_id, "SUPER_ADMIN").await;

    let role_name = format!("EDITOR_{}", unique_suffix());
    let (role, _) = pa_server::permissions::upsert_role(&app.pool, &role_name, None, false)
        .await
        .unwrap();
    let mut guard = app.cleanup_guard();
    guard.delete_user(root_id);
    guard.delete_role(&role_name);

    let token = app.token_for(root_id);
    let uri = format!("/api/admin/roles/{}/permissions", role.id);

    let resp = app
        .oneshot(TestApp::json_request(
            Method::PUT,
            &uri,
            &token,
            &serde_json::json!({ "permissions": ["blog:edit", "blog:read"] }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_to_json(resp).await["changed"], true);

    let resp = app
        .oneshot(TestApp::json_request(
            Method::PUT,
            &uri,
            &token,
            &serde_json::json!({ "permissions": ["blog:read", "blog:edit"] }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let json = body_to_json(resp).await;
    assert_eq!(json["changed"], false);
    assert_eq!(strings(&json["permissions"]), vec!["blog:edit", "blog:read"]);

    assert_eq!(
        audit_rows(&app.pool, "ROLE_PERMISSIONS_UPDATED", role.id).await,
        1
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_invalid_role_requests() {
    let app = TestApp::new().await;
    let (root_id, _) = create_test_user(&app.pool).await;
    grant_role(&app.pool, root_id, "SUPER_ADMIN").await;
    let mut guard = app.cleanup_guard();
    guard.delete_user(root_id);
    let token = app.token_for(root_id);

    let resp = app
        .oneshot(TestApp::json_request(
            Method::POST,
            "/api/admin/roles",
            &token,
            &serde_json::json!({ "name": "lower case" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let super_admin = pa_server::permissions::find_role_by_name(&app.pool, "SUPER_ADMIN")
        .await
        .unwrap()
        .unwrap();

    let resp = app
        .oneshot(TestApp::authed(
            Method::DELETE,
            &format!("/api/admin/roles/{}", super_admin.id),
            &token,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_to_json(resp).await["error"], "system_role_protected");

    let resp = app
        .oneshot(TestApp::json_request(
            Method::PUT,
            &format!("/api/admin/roles/{}/permissions", super_admin.id),
            &token,
            &serde_json::json!({ "permissions": [] }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = app
        .oneshot(TestApp::authed(
            Method::DELETE,
            &format!("/api/admin/roles/{}", Uuid::new_v4()),
            &token,
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ============================================================================
// Assignment guards
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_cannot_change_own_roles() {
    let app = TestApp::new().await;
    let (root_id, _) = create_test_user(&app.pool).await;
    grant_role(&app.pool, root_id, "SUPER_ADMIN").await;
    let mut guard = app.cleanup_guard();
    guard.delete_user(root_id);
    let token = app.token_for(root_id);

    let resp = app
        .oneshot(TestApp::json_request(
            Method::POST,
            "/api/admin/users/roles/assign",
            &token,
            &serde_json::json!({ "user_id": root_id, "role_name": "TRIP_GUIDE" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_to_json(resp).await["error"], "cannot_modify_self");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_admin_cannot_assign_system_roles() {
    let app = TestApp::new().await;
    let (admin_id, _) = create_test_user(&app.pool).await;
    let (target_id, _) = create_test_user(&app.pool).await;
    grant_role(&app.pool, admin_id, "ADMIN").await;
    let mut guard = app.cleanup_guard();
    guard.delete_user(admin_id);
    guard.delete_user(target_id);
    let token = app.token_for(admin_id);

    let resp = app
        .oneshot(TestApp::json_request(
            Method::POST,
            "/api/admin/users/roles/assign",
            &token,
            &serde_json::json!({ "user_id": target_id, "role_name": "TRIP_MANAGER" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_to_json(resp).await["error"], "system_role_protected");

    // USER is not a system role, so ADMIN may hand it out
    let resp = app
        .oneshot(TestApp::json_request(
            Method::POST,
            "/api/admin/users/roles/assign",
            &token,
            &serde_json::json!({ "user_id": target_id, "role_name": "USER" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[serial]
async fn test_assign_unknown_role_or_user() {
    let app = TestApp::new().await;
    let (root_id, _) = create_test_user(&app.pool).await;
    let (target_id, _) = create_test_user(&app.pool).await;
    grant_role(&app.pool, root_id, "SUPER_ADMIN").await;
    let mut guard = app.cleanup_guard();
    guard.delete_user(root_id);
    guard.delete_user(target_id);
    let token = app.token_for(root_id);

    let resp = app
        .oneshot(TestApp::json_request(
            Method::POST,
            "/api/admin/users/roles/assign",
            &token,
            &serde_json::json!({ "user_id": target_id, "role_name": "NO_SUCH_ROLE" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app
        .oneshot(TestApp::json_request(
            Method::POST,
            "/api/admin/users/roles/assign",
            &token,
            &serde_json::json!({ "user_id": Uuid::new_v4(), "role_name": "USER" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}
