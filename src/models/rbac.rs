//! Relational RBAC entities (second schema generation). These are managed
//! through the admin API and kept consistent with the permission catalog;
//! authorization resolution itself reads only the `users.role` column.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct RoleEntity {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Seed data; immutable from the application's perspective once established.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, FromRow)]
pub struct PermissionEntity {
    pub id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RoleCreateRequest {
    #[schema(example = "board_moderator")]
    pub name: String,
    #[schema(example = "Can curate tasks and comments")]
    pub description: Option<String>,
}

/// Permission identifiers are exposed externally as plain strings and must
/// match the catalog's closed set.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignPermissionRequest {
    #[schema(example = "comments.delete")]
    pub permission: String,
}
