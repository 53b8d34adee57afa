use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::json;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt;
use uuid::Uuid;

use taskdeck::create_app;

async fn setup_with_admin() -> Result<(Router, SqlitePool, TempDir, String)> {
    let dir = tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");

    use sqlx::sqlite::SqliteConnectOptions;
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(
        std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    )
    .await?;
    migrator.run(&pool).await?;

    std::env::set_var("SESSION_SECRET", "test-secret");
    let app = create_app(pool.clone()).await?;

    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "name": "Admin", "email": "admin@example.com", "password": "password123" })
                .to_string(),
        ))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    let token = value["token"].as_str().context("missing token")?.to_string();
    let admin_id: Uuid = value["user"]["id"].as_str().context("missing id")?.parse()?;

    sqlx::query("UPDATE users SET role = 'ADMIN' WHERE id = ?")
        .bind(admin_id)
        .execute(&pool)
        .await?;

    Ok((app, pool, dir, token))
}

#[tokio::test]
async fn test_seeded_roles_and_permissions_are_visible() -> Result<()> {
    let (app, _pool, _dir, token) = setup_with_admin().await?;

    let req = Request::builder()
        .uri("/api/roles")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let roles: serde_json::Value = serde_json::from_slice(&bytes)?;
    let names: Vec<&str> = roles
        .as_array()
        .context("expected array")?
        .iter()
        .filter_map(|r| r["name"].as_str())
        .collect();
    assert_eq!(names, vec!["ADMIN", "MANAGER", "USER"]);

    // ADMIN carries the whole catalog.
    let admin_role_id = roles[0]["id"].as_str().context("missing role id")?;
    let req = Request::builder()
        .uri(format!("/api/roles/{}/permissions", admin_role_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let permissions: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(permissions.as_array().map(Vec::len), Some(10));

    Ok(())
}

#[tokio::test]
async fn test_custom_role_lifecycle() -> Result<()> {
    let (app, _pool, _dir, token) = setup_with_admin().await?;

    let req = Request::builder()
        .method("POST")
        .uri("/api/roles")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(
            json!({ "name": "board_moderator", "description": "Curates comments" }).to_string(),
        ))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let role: serde_json::Value = serde_json::from_slice(&bytes)?;
    let role_id = role["id"].as_str().context("missing role id")?.to_string();

    // Duplicate names are rejected.
    let req = Request::builder()
        .method("POST")
        .uri("/api/roles")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(json!({ "name": "board_moderator" }).to_string()))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // The permission namespace is closed.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/roles/{}/permissions", role_id))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(json!({ "permission": "comments.purge" }).to_string()))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/roles/{}/permissions", role_id))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(json!({ "permission": "comments.delete" }).to_string()))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = Request::builder()
        .uri(format!("/api/roles/{}/permissions", role_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let permissions: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(permissions[0]["name"], "comments.delete");

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/api/roles/{}/permissions/comments.delete", role_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    // Revoking an absent grant is 404.
    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/api/roles/{}/permissions/comments.delete", role_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_user_administration() -> Result<()> {
    let (app, _pool, _dir, token) = setup_with_admin().await?;

    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "name": "Target", "email": "target@example.com", "password": "password123" })
                .to_string(),
        ))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    let target_id: Uuid = value["user"]["id"].as_str().context("missing id")?.parse()?;

    let req = Request::builder()
        .uri("/api/users")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let users: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(users.as_array().map(Vec::len), Some(2));

    // Unknown role names are rejected strictly.
    let req = Request::builder()
        .method("PUT")
        .uri(format!("/api/users/{}/role", target_id))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(json!({ "role": "SUPERUSER" }).to_string()))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .method("PUT")
        .uri(format!("/api/users/{}/role", target_id))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::from(json!({ "role": "MANAGER" }).to_string()))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let user: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(user["role"], "MANAGER");

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/api/users/{}", target_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    Ok(())
}

#[tokio::test]
async fn test_admin_cannot_delete_own_account() -> Result<()> {
    let (app, pool, _dir, token) = setup_with_admin().await?;

    let admin_id: Uuid = sqlx::query_scalar("SELECT id FROM users WHERE email = ?")
        .bind("admin@example.com")
        .fetch_one(&pool)
        .await?;

    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/api/users/{}", admin_id))
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    Ok(())
}
