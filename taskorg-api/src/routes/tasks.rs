//! Task endpoints
//!
//! - `POST /v1/orgs/:org_id/tasks` - Create a task (permission-checked)
//! - `PATCH /v1/tasks/:task_id` - Update any subset of fields
//! - `POST /v1/tasks/:task_id/status` - Move to another status column
//! - `DELETE /v1/tasks/:task_id` - Hard delete

use super::ApiResponse;
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskorg_shared::models::task::{NewTask, Task, TaskPatch, TaskPriority, TaskStatus};
use taskorg_shared::workflows::task::{self, UpdateTask};
use validator::Validate;

const FAILED_CREATE: &str = "Failed to create task";
const FAILED_UPDATE: &str = "Failed to update task";
const FAILED_DELETE: &str = "Failed to delete task";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[validate(length(min = 3, max = 50, message = "Must be between 3 and 50 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 500, message = "Must be at most 500 characters"))]
    pub description: String,

    pub due_date: DateTime<Utc>,

    #[serde(default)]
    pub priority: TaskPriority,

    #[serde(default)]
    pub status: TaskStatus,

    pub assigned_to: String,

    pub created_by: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    /// Blank or absent is rejected by the workflow
    #[serde(default)]
    pub updated_by: String,

    #[validate(length(min = 3, max = 50, message = "Must be between 3 and 50 characters"))]
    pub name: Option<String>,

    #[validate(length(max = 500, message = "Must be at most 500 characters"))]
    pub description: Option<String>,

    pub due_date: Option<DateTime<Utc>>,

    pub priority: Option<TaskPriority>,

    pub status: Option<TaskStatus>,

    pub assigned_to: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequest {
    pub status: TaskStatus,
    #[serde(default)]
    pub updated_by: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskBody {
    pub task_id: String,
    pub task: Task,
}

impl From<Task> for TaskBody {
    fn from(task: Task) -> Self {
        Self {
            task_id: task.id.clone(),
            task,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletedBody {
    pub task_id: String,
}

/// Create-task endpoint
///
/// ```text
/// POST /v1/orgs/acme/tasks
///
/// {
///   "name": "Ship v1",
///   "description": "Cut the first release",
///   "dueDate": "2025-02-01T00:00:00Z",
///   "priority": "high",
///   "assignedTo": "u2",
///   "createdBy": "u1"
/// }
/// ```
///
/// # Errors
///
/// - `400`: a required field is missing or the body is not valid JSON
/// - `403`: the policy service denied `create` on `Task`
/// - `422`: field validation failed
pub async fn create_task(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<TaskBody>>> {
    let Json(req) = payload.map_err(|e| ApiError::invalid_body(task::INVALID_DATA, e))?;
    req.validate()?;

    let outcome = task::create_task(
        state.store.as_ref(),
        state.policy.as_ref(),
        NewTask {
            org_id,
            name: req.name,
            description: req.description,
            due_date: req.due_date,
            priority: req.priority,
            status: req.status,
            assigned_to: req.assigned_to,
            created_by: req.created_by,
        },
    )
    .await
    .map_err(|e| ApiError::workflow(e, FAILED_CREATE))?;

    Ok(Json(ApiResponse::from_outcome(outcome, TaskBody::from)))
}

pub async fn update_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    payload: Result<Json<UpdateTaskRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<TaskBody>>> {
    let Json(req) = payload.map_err(|e| ApiError::invalid_body(task::INVALID_UPDATE, e))?;
    req.validate()?;

    let patch = TaskPatch {
        name: req.name,
        description: req.description,
        due_date: req.due_date,
        priority: req.priority,
        status: req.status,
        assigned_to: req.assigned_to,
    };

    let outcome = task::update_task(
        state.store.as_ref(),
        state.policy.as_ref(),
        UpdateTask {
            task_id,
            updated_by: req.updated_by,
            patch,
        },
    )
    .await
    .map_err(|e| ApiError::workflow(e, FAILED_UPDATE))?;

    Ok(Json(ApiResponse::from_outcome(outcome, TaskBody::from)))
}

pub async fn change_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
    payload: Result<Json<StatusRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<TaskBody>>> {
    let Json(req) = payload.map_err(|e| ApiError::invalid_body(task::INVALID_UPDATE, e))?;
    let outcome = task::change_task_status(
        state.store.as_ref(),
        state.policy.as_ref(),
        &task_id,
        req.status,
        &req.updated_by,
    )
    .await
    .map_err(|e| ApiError::workflow(e, FAILED_UPDATE))?;

    Ok(Json(ApiResponse::from_outcome(outcome, TaskBody::from)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<ApiResponse<DeletedBody>>> {
    let outcome = task::delete_task(state.store.as_ref(), &task_id)
        .await
        .map_err(|e| ApiError::workflow(e, FAILED_DELETE))?;

    Ok(Json(ApiResponse::from_outcome(outcome, |task_id| DeletedBody {
        task_id,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn request() -> CreateTaskRequest {
        CreateTaskRequest {
            name: "Ship v1".to_string(),
            description: "Cut the first release".to_string(),
            due_date: Utc::now() + Duration::days(1),
            priority: TaskPriority::High,
            status: TaskStatus::Todo,
            assigned_to: "u2".to_string(),
            created_by: "u1".to_string(),
        }
    }

    #[test]
    fn test_create_request_rules() {
        assert!(request().validate().is_ok());

        let mut short = request();
        short.name = "v1".to_string();
        assert!(short.validate().is_err());

        let mut long = request();
        long.description = "x".repeat(501);
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_update_request_defaults_to_empty_patch() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"updatedBy":"u1"}"#).unwrap();
        assert!(req.validate().is_ok());
        assert!(req.name.is_none() && req.assigned_to.is_none());
    }

    #[test]
    fn test_update_request_without_updater_reaches_workflow() {
        let req: UpdateTaskRequest = serde_json::from_str(r#"{"status":"completed"}"#).unwrap();
        assert!(req.updated_by.is_empty());
        assert_eq!(req.status, Some(TaskStatus::Completed));
    }
}
