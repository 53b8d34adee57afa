use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use super::comment::Comment;
use super::user::UserSummary;
use crate::errors::AppError;

pub const TASK_STATUSES: &[&str] = &["TODO", "IN_PROGRESS", "REVIEW", "DONE"];
pub const TASK_PRIORITIES: &[&str] = &["HIGH", "MEDIUM", "LOW"];

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "TODO")]
    pub status: String,
    #[schema(example = "MEDIUM")]
    pub priority: String,
    /// Board column ordering; smaller sorts first.
    pub position: i64,
    pub creator: UserSummary,
    pub assigned_to: Option<UserSummary>,
    pub comments: Vec<Comment>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct DbTask {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: String,
    pub priority: String,
    pub position: i64,
    pub creator_id: Uuid,
    pub assigned_to_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskCreateRequest {
    #[schema(example = "Define launch checklist")]
    pub title: String,
    pub description: Option<String>,
    #[schema(example = "HIGH")]
    pub priority: Option<String>,
    pub assigned_to_id: Option<Uuid>,
}

/// Partial update. `assigned_to_id` distinguishes "not sent" (no change)
/// from `null` (unassign).
#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskUpdateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[schema(example = "IN_PROGRESS")]
    pub status: Option<String>,
    pub priority: Option<String>,
    pub position: Option<i64>,
    #[serde(default, deserialize_with = "present")]
    #[schema(value_type = Option<Uuid>, nullable)]
    pub assigned_to_id: Option<Option<Uuid>>,
}

/// Marks a field as present even when its value is `null`, so handlers can
/// tell "unassign" apart from "leave unchanged".
fn present<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TaskListQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<Uuid>,
    pub search: Option<String>,
}

pub fn validate_status(status: &str) -> Result<(), AppError> {
    if TASK_STATUSES.contains(&status) {
        Ok(())
    } else {
        Err(AppError::bad_request(format!("invalid status: {status}")))
    }
}

pub fn validate_priority(priority: &str) -> Result<(), AppError> {
    if TASK_PRIORITIES.contains(&priority) {
        Ok(())
    } else {
        Err(AppError::bad_request(format!("invalid priority: {priority}")))
    }
}
