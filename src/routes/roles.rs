//! Admin surface over the relational role/permission tables. These tables
//! document grants for operators; request-time authorization reads only the
//! `users.role` column and the static catalog.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{is_valid_permission, Permission};
use crate::errors::{AppError, AppResult};
use crate::models::rbac::{AssignPermissionRequest, PermissionEntity, RoleCreateRequest, RoleEntity};
use crate::session::SessionCredentials;
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/api/roles",
    tag = "Roles",
    responses(
        (status = 200, description = "List roles", body = [RoleEntity]),
        (status = 403, description = "Missing roles.manage")
    )
)]
pub async fn list_roles(
    State(state): State<AppState>,
    credentials: SessionCredentials,
) -> AppResult<Json<Vec<RoleEntity>>> {
    state.gate.require(&credentials, Permission::RolesManage).await?;

    let roles = sqlx::query_as::<_, RoleEntity>(
        "SELECT id, name, description, created_at, updated_at FROM roles ORDER BY name ASC",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(roles))
}

#[utoipa::path(
    post,
    path = "/api/roles",
    tag = "Roles",
    request_body = RoleCreateRequest,
    responses(
        (status = 201, description = "Role created", body = RoleEntity),
        (status = 409, description = "Role name already exists")
    )
)]
pub async fn create_role(
    State(state): State<AppState>,
    credentials: SessionCredentials,
    Json(payload): Json<RoleCreateRequest>,
) -> AppResult<(StatusCode, Json<RoleEntity>)> {
    state.gate.require(&credentials, Permission::RolesManage).await?;

    if payload.name.trim().is_empty() {
        return Err(AppError::bad_request("role name must not be empty"));
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM roles WHERE name = ?)")
        .bind(&payload.name)
        .fetch_one(&state.pool)
        .await?;
    if exists {
        return Err(AppError::conflict("role name already exists"));
    }

    let role_id = Uuid::new_v4();
    let now = utc_now();

    sqlx::query("INSERT INTO roles (id, name, description, created_at, updated_at) VALUES (?, ?, ?, ?, ?)")
        .bind(role_id)
        .bind(payload.name.trim())
        .bind(&payload.description)
        .bind(now)
        .bind(now)
        .execute(&state.pool)
        .await?;

    let role = fetch_role(&state.pool, role_id).await?;
    Ok((StatusCode::CREATED, Json(role)))
}

#[utoipa::path(
    get,
    path = "/api/roles/{id}/permissions",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role id")),
    responses(
        (status = 200, description = "Permissions granted to the role", body = [PermissionEntity]),
        (status = 404, description = "Role not found")
    )
)]
pub async fn list_role_permissions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    credentials: SessionCredentials,
) -> AppResult<Json<Vec<PermissionEntity>>> {
    state.gate.require(&credentials, Permission::RolesManage).await?;

    fetch_role(&state.pool, id).await?;

    let permissions = sqlx::query_as::<_, PermissionEntity>(
        "SELECT p.id, p.name, p.description, p.created_at \
         FROM permissions p INNER JOIN role_permissions rp ON rp.permission_id = p.id \
         WHERE rp.role_id = ? ORDER BY p.name ASC",
    )
    .bind(id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(permissions))
}

#[utoipa::path(
    post,
    path = "/api/roles/{id}/permissions",
    tag = "Roles",
    params(("id" = Uuid, Path, description = "Role id")),
    request_body = AssignPermissionRequest,
    responses(
        (status = 204, description = "Permission granted"),
        (status = 400, description = "Unknown permission name"),
        (status = 404, description = "Role not found")
    )
)]
pub async fn assign_permission(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    credentials: SessionCredentials,
    Json(payload): Json<AssignPermissionRequest>,
) -> AppResult<StatusCode> {
    state.gate.require(&credentials, Permission::RolesManage).await?;

    // The permission namespace is closed; anything outside the catalog is a
    // client error, not a new row.
    if !is_valid_permission(&payload.permission) {
        return Err(AppError::bad_request("unknown permission"));
    }

    fetch_role(&state.pool, id).await?;

    let permission_id: Uuid = sqlx::query_scalar("SELECT id FROM permissions WHERE name = ?")
        .bind(&payload.permission)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::internal("catalog permission missing from permissions table"))?;

    sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
        .bind(id)
        .bind(permission_id)
        .execute(&state.pool)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    delete,
    path = "/api/roles/{id}/permissions/{permission}",
    tag = "Roles",
    params(
        ("id" = Uuid, Path, description = "Role id"),
        ("permission" = String, Path, description = "Permission name"),
    ),
    responses(
        (status = 204, description = "Permission revoked"),
        (status = 404, description = "Role or grant not found")
    )
)]
pub async fn revoke_permission(
    State(state): State<AppState>,
    Path((id, permission)): Path<(Uuid, String)>,
    credentials: SessionCredentials,
) -> AppResult<StatusCode> {
    state.gate.require(&credentials, Permission::RolesManage).await?;

    fetch_role(&state.pool, id).await?;

    let affected = sqlx::query(
        "DELETE FROM role_permissions WHERE role_id = ? \
         AND permission_id = (SELECT id FROM permissions WHERE name = ?)",
    )
    .bind(id)
    .bind(&permission)
    .execute(&state.pool)
    .await?;

    if affected.rows_affected() == 0 {
        return Err(AppError::not_found("grant not found"));
    }

    Ok(StatusCode::NO_CONTENT)
}

async fn fetch_role(pool: &SqlitePool, role_id: Uuid) -> AppResult<RoleEntity> {
    sqlx::query_as::<_, RoleEntity>(
        "SELECT id, name, description, created_at, updated_at FROM roles WHERE id = ?",
    )
    .bind(role_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::not_found("role not found"))
}
