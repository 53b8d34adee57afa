use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::json;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::ServiceExt; // for `oneshot`
use uuid::Uuid;

use taskdeck::create_app;

async fn setup() -> Result<(Router, SqlitePool, TempDir)> {
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

    Ok((app, pool, dir))
}

async fn register(app: &Router, name: &str, email: &str, password: &str) -> Result<(String, Uuid)> {
    let req = Request::builder()
        .method("POST")
        .uri("/auth/register")
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "name": name, "email": email, "password": password }).to_string(),
        ))?;

    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let value: serde_json::Value = serde_json::from_slice(&bytes)?;
    let token = value["token"].as_str().context("missing token")?.to_string();
    let user_id: Uuid = value["user"]["id"]
        .as_str()
        .context("missing user id")?
        .parse()?;
    Ok((token, user_id))
}

async fn promote(pool: &SqlitePool, user_id: Uuid, role: &str) -> Result<()> {
    sqlx::query("UPDATE users SET role = ? WHERE id = ?")
        .bind(role)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

#[tokio::test]
async fn test_task_board_happy_path() -> Result<()> {
    let (app, pool, _dir) = setup().await?;

    let (admin_token, admin_id) = register(&app, "Admin", "admin@example.com", "password123").await?;
    promote(&pool, admin_id, "ADMIN").await?;
    let (_user_token, user_id) = register(&app, "Worker", "worker@example.com", "password123").await?;

    // Create a task assigned to another user; the admin holds tasks.assign.
    let req = Request::builder()
        .method("POST")
        .uri("/api/tasks")
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", admin_token))
        .body(Body::from(
            json!({
                "title": "Ship the board",
                "description": "First slice",
                "priority": "HIGH",
                "assigned_to_id": user_id
            })
            .to_string(),
        ))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let task: serde_json::Value = serde_json::from_slice(&bytes)?;
    let task_id = task["id"].as_str().context("missing task id")?.to_string();
    assert_eq!(task["status"], "TODO");
    assert_eq!(task["priority"], "HIGH");
    assert_eq!(task["creator"]["email"], "admin@example.com");
    assert_eq!(task["assigned_to"]["email"], "worker@example.com");

    // List with a status filter.
    let req = Request::builder()
        .uri("/api/tasks?status=TODO")
        .header("authorization", format!("Bearer {}", admin_token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let tasks: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(tasks.as_array().map(Vec::len), Some(1));

    // A search that matches nothing.
    let req = Request::builder()
        .uri("/api/tasks?search=nomatch")
        .header("authorization", format!("Bearer {}", admin_token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let tasks: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(tasks.as_array().map(Vec::len), Some(0));

    // Move the task across the board.
    let req = Request::builder()
        .method("PUT")
        .uri(format!("/api/tasks/{}", task_id))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", admin_token))
        .body(Body::from(json!({ "status": "IN_PROGRESS" }).to_string()))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let task: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(task["status"], "IN_PROGRESS");

    // Comment on it.
    let req = Request::builder()
        .method("POST")
        .uri(format!("/api/tasks/{}/comments", task_id))
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {}", admin_token))
        .body(Body::from(json!({ "content": "Looks good" }).to_string()))?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::CREATED);

    // Detail view includes the comment.
    let req = Request::builder()
        .uri(format!("/api/tasks/{}", task_id))
        .header("authorization", format!("Bearer {}", admin_token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let task: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(task["comments"].as_array().map(Vec::len), Some(1));
    assert_eq!(task["comments"][0]["content"], "Looks good");

    // Delete it.
    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/api/tasks/{}", task_id))
        .header("authorization", format!("Bearer {}", admin_token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = Request::builder()
        .uri(format!("/api/tasks/{}", task_id))
        .header("authorization", format!("Bearer {}", admin_token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn test_invalid_filters_are_rejected() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    let (token, _) = register(&app, "U", "u@example.com", "password123").await?;

    let req = Request::builder()
        .uri("/api/tasks?status=SHIPPED")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let req = Request::builder()
        .uri("/api/tasks?priority=URGENT")
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    Ok(())
}

#[tokio::test]
async fn test_health_reports_database() -> Result<()> {
    let (app, _pool, _dir) = setup().await?;

    let req = Request::builder().uri("/api/health").body(Body::empty())?;
    let resp = app.clone().oneshot(req).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = body::to_bytes(resp.into_body(), usize::MAX).await?;
    let health: serde_json::Value = serde_json::from_slice(&bytes)?;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["database"], "ok");

    Ok(())
}
