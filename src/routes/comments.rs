use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::Permission;
use crate::errors::{AppError, AppResult};
use crate::models::comment::{Comment, CommentCreateRequest, CommentUpdateRequest, DbComment};
use crate::routes::tasks::fetch_task_row;
use crate::session::SessionCredentials;
use crate::utils::utc_now;

#[utoipa::path(
    post,
    path = "/api/tasks/{id}/comments",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = CommentCreateRequest,
    responses(
        (status = 201, description = "Comment created", body = Comment),
        (status = 403, description = "Missing comments.create"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn create_comment(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    credentials: SessionCredentials,
    Json(payload): Json<CommentCreateRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let principal = state.gate.require(&credentials, Permission::CommentsCreate).await?;

    if payload.content.trim().is_empty() {
        return Err(AppError::bad_request("content must not be empty"));
    }

    fetch_task_row(&state.pool, task_id).await?;

    let comment_id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO comments (id, task_id, author_id, content, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(comment_id)
    .bind(task_id)
    .bind(principal.id)
    .bind(payload.content.trim())
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let comment = fetch_comment(&state.pool, comment_id).await?;
    Ok((StatusCode::CREATED, Json(Comment::from(comment))))
}

#[utoipa::path(
    put,
    path = "/api/comments/{id}",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Comment id")),
    request_body = CommentUpdateRequest,
    responses(
        (status = 200, description = "Comment updated", body = Comment),
        (status = 403, description = "Not the author and missing comments.update"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn update_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    credentials: SessionCredentials,
    Json(payload): Json<CommentUpdateRequest>,
) -> AppResult<Json<Comment>> {
    let principal = state.gate.authenticate(&credentials).await?;

    if payload.content.trim().is_empty() {
        return Err(AppError::bad_request("content must not be empty"));
    }

    let comment = fetch_comment(&state.pool, id).await?;

    // Authors may always edit their own comments; everyone else needs the
    // blanket grant.
    if !principal.owns(comment.author_id) && !principal.can(Permission::CommentsUpdate) {
        return Err(AppError::forbidden("insufficient permissions"));
    }

    sqlx::query("UPDATE comments SET content = ?, updated_at = ? WHERE id = ?")
        .bind(payload.content.trim())
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    let comment = fetch_comment(&state.pool, id).await?;
    Ok(Json(Comment::from(comment)))
}

#[utoipa::path(
    delete,
    path = "/api/comments/{id}",
    tag = "Comments",
    params(("id" = Uuid, Path, description = "Comment id")),
    responses(
        (status = 204, description = "Comment deleted"),
        (status = 403, description = "Not the author and missing comments.delete"),
        (status = 404, description = "Comment not found")
    )
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    credentials: SessionCredentials,
) -> AppResult<StatusCode> {
    let principal = state.gate.authenticate(&credentials).await?;

    let comment = fetch_comment(&state.pool, id).await?;

    if !principal.owns(comment.author_id) && !principal.can(Permission::CommentsDelete) {
        return Err(AppError::forbidden("insufficient permissions"));
    }

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_comment(pool: &SqlitePool, comment_id: Uuid) -> AppResult<DbComment> {
    sqlx::query_as::<_, DbComment>(
        "SELECT c.id, c.task_id, c.author_id, u.email as author_email, u.name as author_name, \
                c.content, c.created_at, c.updated_at \
         FROM comments c INNER JOIN users u ON u.id = c.author_id WHERE c.id = ?",
    )
    .bind(comment_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("comment not found"))
}
