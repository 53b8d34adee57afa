use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Permission, Principal};
use crate::errors::{AppError, AppResult};
use crate::models::comment::{Comment, DbComment};
use crate::models::task::{
    validate_priority, validate_status, DbTask, Task, TaskCreateRequest, TaskListQuery, TaskUpdateRequest,
};
use crate::models::user::{DbUserSummary, UserSummary};
use crate::session::SessionCredentials;
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/api/tasks",
    tag = "Tasks",
    params(
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("priority" = Option<String>, Query, description = "Filter by priority"),
        ("assigned_to" = Option<Uuid>, Query, description = "Filter by assignee"),
        ("search" = Option<String>, Query, description = "Search in title and description"),
    ),
    responses(
        (status = 200, description = "List tasks", body = [Task]),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Missing tasks.read")
    )
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskListQuery>,
    credentials: SessionCredentials,
) -> AppResult<Json<Vec<Task>>> {
    state.gate.require(&credentials, Permission::TasksRead).await?;

    let mut builder: sqlx::QueryBuilder<sqlx::Sqlite> = sqlx::QueryBuilder::new(
        "SELECT id, title, description, status, priority, position, creator_id, assigned_to_id, created_at, updated_at \
         FROM tasks WHERE 1=1",
    );

    if let Some(status) = &query.status {
        validate_status(status)?;
        builder.push(" AND status = ").push_bind(status.clone());
    }
    if let Some(priority) = &query.priority {
        validate_priority(priority)?;
        builder.push(" AND priority = ").push_bind(priority.clone());
    }
    if let Some(assigned_to) = query.assigned_to {
        builder.push(" AND assigned_to_id = ").push_bind(assigned_to);
    }
    if let Some(search) = &query.search {
        let pattern = format!("%{}%", search.to_lowercase());
        builder
            .push(" AND (lower(title) LIKE ")
            .push_bind(pattern.clone())
            .push(" OR lower(coalesce(description, '')) LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    builder.push(" ORDER BY position ASC, created_at DESC");

    let rows: Vec<DbTask> = builder.build_query_as().fetch_all(&state.pool).await?;

    let tasks = assemble_tasks(&state.pool, rows).await?;
    Ok(Json(tasks))
}

#[utoipa::path(
    post,
    path = "/api/tasks",
    tag = "Tasks",
    request_body = TaskCreateRequest,
    responses(
        (status = 201, description = "Task created", body = Task),
        (status = 403, description = "Missing tasks.create or tasks.assign")
    )
)]
pub async fn create_task(
    State(state): State<AppState>,
    credentials: SessionCredentials,
    Json(payload): Json<TaskCreateRequest>,
) -> AppResult<(StatusCode, Json<Task>)> {
    let principal = state.gate.require(&credentials, Permission::TasksCreate).await?;

    if payload.title.trim().is_empty() {
        return Err(AppError::bad_request("title must not be empty"));
    }

    let priority = payload.priority.unwrap_or_else(|| "MEDIUM".to_string());
    validate_priority(&priority)?;

    // Assigning to anyone but yourself needs the dedicated grant.
    ensure_may_assign(&principal, payload.assigned_to_id)?;
    if let Some(assignee) = payload.assigned_to_id {
        ensure_user_exists(&state.pool, assignee).await?;
    }

    let task_id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query(
        "INSERT INTO tasks (id, title, description, status, priority, position, creator_id, assigned_to_id, created_at, updated_at) \
         VALUES (?, ?, ?, 'TODO', ?, ?, ?, ?, ?, ?)",
    )
    .bind(task_id)
    .bind(payload.title.trim())
    .bind(&payload.description)
    .bind(&priority)
    .bind(next_position(&state.pool).await?)
    .bind(principal.id)
    .bind(payload.assigned_to_id)
    .bind(now)
    .bind(now)
    .execute(&state.pool)
    .await?;

    let task = load_task(&state.pool, task_id).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[utoipa::path(
    get,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 200, description = "Task detail", body = Task),
        (status = 404, description = "Task not found")
    )
)]
pub async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    credentials: SessionCredentials,
) -> AppResult<Json<Task>> {
    state.gate.require(&credentials, Permission::TasksRead).await?;
    let task = load_task(&state.pool, id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    put,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    request_body = TaskUpdateRequest,
    responses(
        (status = 200, description = "Task updated", body = Task),
        (status = 404, description = "Task not found")
    )
)]
pub async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    credentials: SessionCredentials,
    Json(payload): Json<TaskUpdateRequest>,
) -> AppResult<Json<Task>> {
    let principal = state.gate.require(&credentials, Permission::TasksUpdate).await?;

    let mut task = fetch_task_row(&state.pool, id).await?;

    if let Some(title) = payload.title {
        if title.trim().is_empty() {
            return Err(AppError::bad_request("title must not be empty"));
        }
        task.title = title.trim().to_string();
    }
    if let Some(description) = payload.description {
        task.description = Some(description);
    }
    if let Some(status) = payload.status {
        validate_status(&status)?;
        task.status = status;
    }
    if let Some(priority) = payload.priority {
        validate_priority(&priority)?;
        task.priority = priority;
    }
    if let Some(position) = payload.position {
        task.position = position;
    }
    if let Some(assignee) = payload.assigned_to_id {
        ensure_may_assign(&principal, assignee)?;
        if let Some(assignee) = assignee {
            ensure_user_exists(&state.pool, assignee).await?;
        }
        task.assigned_to_id = assignee;
    }

    let now = utc_now();
    sqlx::query(
        "UPDATE tasks SET title = ?, description = ?, status = ?, priority = ?, position = ?, assigned_to_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&task.title)
    .bind(&task.description)
    .bind(&task.status)
    .bind(&task.priority)
    .bind(task.position)
    .bind(task.assigned_to_id)
    .bind(now)
    .bind(task.id)
    .execute(&state.pool)
    .await?;

    let task = load_task(&state.pool, id).await?;
    Ok(Json(task))
}

#[utoipa::path(
    delete,
    path = "/api/tasks/{id}",
    tag = "Tasks",
    params(("id" = Uuid, Path, description = "Task id")),
    responses(
        (status = 204, description = "Task deleted"),
        (status = 403, description = "Missing tasks.delete"),
        (status = 404, description = "Task not found")
    )
)]
pub async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    credentials: SessionCredentials,
) -> AppResult<StatusCode> {
    // Permission first: callers without tasks.delete learn nothing about
    // whether the id exists.
    state.gate.require(&credentials, Permission::TasksDelete).await?;

    let affected = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("task not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

fn ensure_may_assign(principal: &Principal, assignee: impl Into<Option<Uuid>>) -> AppResult<()> {
    match assignee.into() {
        Some(target) if target != principal.id && !principal.can(Permission::TasksAssign) => {
            Err(AppError::forbidden("insufficient permissions"))
        }
        _ => Ok(()),
    }
}

async fn ensure_user_exists(pool: &SqlitePool, user_id: Uuid) -> AppResult<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE id = ?)")
        .bind(user_id)
        .fetch_one(pool)
        .await?;

    if !exists {
        return Err(AppError::bad_request("assignee does not exist"));
    }
    Ok(())
}

async fn next_position(pool: &SqlitePool) -> AppResult<i64> {
    let max: Option<i64> = sqlx::query_scalar("SELECT MAX(position) FROM tasks")
        .fetch_one(pool)
        .await?;
    Ok(max.unwrap_or(0) + 1)
}

pub(crate) async fn fetch_task_row(pool: &SqlitePool, task_id: Uuid) -> AppResult<DbTask> {
    sqlx::query_as::<_, DbTask>(
        "SELECT id, title, description, status, priority, position, creator_id, assigned_to_id, created_at, updated_at \
         FROM tasks WHERE id = ?",
    )
    .bind(task_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("task not found"))
}

pub(crate) async fn load_task(pool: &SqlitePool, task_id: Uuid) -> AppResult<Task> {
    let row = fetch_task_row(pool, task_id).await?;
    let mut tasks = assemble_tasks(pool, vec![row]).await?;
    tasks.pop().ok_or_else(|| AppError::not_found("task not found"))
}

/// Join creator/assignee summaries and comments onto the flat task rows in
/// three queries total, preserving row order.
async fn assemble_tasks(pool: &SqlitePool, rows: Vec<DbTask>) -> AppResult<Vec<Task>> {
    if rows.is_empty() {
        return Ok(Vec::new());
    }

    let mut user_ids: Vec<Uuid> = Vec::new();
    for row in &rows {
        user_ids.push(row.creator_id);
        if let Some(assignee) = row.assigned_to_id {
            user_ids.push(assignee);
        }
    }
    user_ids.sort_unstable();
    user_ids.dedup();

    let users = fetch_user_summaries(pool, &user_ids).await?;

    let task_ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
    let mut comments = fetch_comments_for_tasks(pool, &task_ids).await?;

    let mut tasks = Vec::with_capacity(rows.len());
    for row in rows {
        let creator = users
            .get(&row.creator_id)
            .cloned()
            .ok_or_else(|| AppError::internal("task creator missing from users table"))?;
        let assigned_to = row.assigned_to_id.and_then(|id| users.get(&id).cloned());

        tasks.push(Task {
            id: row.id,
            title: row.title,
            description: row.description,
            status: row.status,
            priority: row.priority,
            position: row.position,
            creator,
            assigned_to,
            comments: comments.remove(&row.id).unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        });
    }

    Ok(tasks)
}

async fn fetch_user_summaries(pool: &SqlitePool, ids: &[Uuid]) -> AppResult<HashMap<Uuid, UserSummary>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; ids.len()].join(",");
    let sql = format!("SELECT id, email, name FROM users WHERE id IN ({placeholders})");

    let mut query = sqlx::query_as::<_, DbUserSummary>(&sql);
    for id in ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(pool).await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.id, UserSummary::from(row)))
        .collect())
}

async fn fetch_comments_for_tasks(
    pool: &SqlitePool,
    task_ids: &[Uuid],
) -> AppResult<HashMap<Uuid, Vec<Comment>>> {
    if task_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let placeholders = vec!["?"; task_ids.len()].join(",");
    let sql = format!(
        "SELECT c.id, c.task_id, c.author_id, u.email as author_email, u.name as author_name, \
                c.content, c.created_at, c.updated_at \
         FROM comments c INNER JOIN users u ON u.id = c.author_id \
         WHERE c.task_id IN ({placeholders}) ORDER BY c.created_at ASC"
    );

    let mut query = sqlx::query_as::<_, DbComment>(&sql);
    for id in task_ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(pool).await?;

    let mut grouped: HashMap<Uuid, Vec<Comment>> = HashMap::new();
    for row in rows {
        grouped.entry(row.task_id).or_default().push(Comment::from(row));
    }
    Ok(grouped)
}
