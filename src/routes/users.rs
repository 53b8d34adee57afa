use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app::AppState;
use crate::authz::{Permission, Role};
use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, User, UserRoleUpdateRequest};
use crate::routes::auth::fetch_user_by_id;
use crate::session::SessionCredentials;
use crate::utils::utc_now;

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    responses(
        (status = 200, description = "List users", body = [User]),
        (status = 403, description = "Missing users.manage")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    credentials: SessionCredentials,
) -> AppResult<Json<Vec<User>>> {
    state.gate.require(&credentials, Permission::UsersManage).await?;

    let rows = sqlx::query_as::<_, DbUser>(
        "SELECT id, email, name, password_hash, role, created_at, updated_at FROM users ORDER BY created_at ASC",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(rows.into_iter().map(User::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 200, description = "User detail", body = User),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    credentials: SessionCredentials,
) -> AppResult<Json<User>> {
    state.gate.require(&credentials, Permission::UsersManage).await?;
    let user = fetch_user_by_id(&state.pool, id).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    request_body = UserRoleUpdateRequest,
    responses(
        (status = 200, description = "Role updated", body = User),
        (status = 400, description = "Unknown role name"),
        (status = 404, description = "User not found")
    )
)]
pub async fn update_user_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    credentials: SessionCredentials,
    Json(payload): Json<UserRoleUpdateRequest>,
) -> AppResult<Json<User>> {
    state.gate.require(&credentials, Permission::UsersManage).await?;

    // Strict parse here: role changes must name a known role exactly.
    let role = Role::parse(&payload.role)
        .ok_or_else(|| AppError::bad_request("unknown role"))?;

    fetch_user_by_id(&state.pool, id).await?;

    sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(utc_now())
        .bind(id)
        .execute(&state.pool)
        .await?;

    // Cached principals would keep the old grants for up to the TTL.
    state.gate.resolver().invalidate(id);

    tracing::info!(user_id = %id, role = %role, "user role changed");

    let user = fetch_user_by_id(&state.pool, id).await?;
    Ok(Json(user.into()))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = Uuid, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "Cannot delete own account"),
        (status = 404, description = "User not found")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    credentials: SessionCredentials,
) -> AppResult<StatusCode> {
    let principal = state.gate.require(&credentials, Permission::UsersManage).await?;

    if principal.id == id {
        return Err(AppError::bad_request("cannot delete own account"));
    }

    fetch_user_by_id(&state.pool, id).await?;

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&state.pool)
        .await?;

    state.gate.resolver().invalidate(id);

    Ok(StatusCode::NO_CONTENT)
}
