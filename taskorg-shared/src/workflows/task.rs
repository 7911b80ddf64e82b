//! Task creation, updates and deletion
//!
//! Creation is gated by `check(createdBy, "create", "Task")` and followed by
//! four sync calls: register `Task:<id>`, `admin` for the creator,
//! `assignee` for the assignee, and `Organization:<orgId>` as the task's
//! `parent`.
//!
//! Updates and deletes are not permission-checked.

use super::{is_blank, require_permission, SyncReport, WorkflowError, WorkflowOutcome, WorkflowResult};
use crate::models::task::{NewTask, Task, TaskPatch, TaskStatus};
use crate::policy::{
    actions, relations, resources, roles, PolicyClient, RelationshipTuple, ResourceInstance,
    ResourceRef, RoleAssignment,
};
use crate::store::{DocumentStore, StoreError};
use serde::{Deserialize, Serialize};

pub const INVALID_DATA: &str = "Invalid task data";
pub const CREATED: &str = "Task created successfully";
pub const INVALID_UPDATE: &str = "Invalid update data";
pub const NOT_FOUND: &str = "Task not found";
pub const NO_FIELDS: &str = "No fields to update";
pub const UPDATED: &str = "Task updated successfully";
pub const DELETED: &str = "Task deleted successfully";

/// Update request: who, which task, and the fields to change
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTask {
    pub task_id: String,
    pub updated_by: String,
    #[serde(flatten)]
    pub patch: TaskPatch,
}

/// Creates a task and describes it to the policy service
pub async fn create_task(
    store: &dyn DocumentStore,
    policy: &dyn PolicyClient,
    input: NewTask,
) -> WorkflowResult<Task> {
    require_permission(
        policy,
        &input.created_by,
        actions::CREATE,
        &ResourceRef::kind(resources::TASK),
    )
    .await?;

    let required = [
        &input.name,
        &input.description,
        &input.created_by,
        &input.assigned_to,
        &input.org_id,
    ];
    if required.iter().any(|field| is_blank(field)) {
        return Err(WorkflowError::InvalidInput(INVALID_DATA.to_string()));
    }

    let task = Task::create(store, input).await?;
    tracing::info!(
        task_id = %task.id,
        org_id = %task.org_id,
        created_by = %task.created_by,
        assigned_to = %task.assigned_to,
        "Task created"
    );

    let resource = ResourceRef::task(&task.id);
    let org = ResourceRef::organization(&task.org_id);
    let mut sync = SyncReport::default();

    if let Some(instance) = ResourceInstance::for_ref(&resource) {
        sync.run(
            "create_resource_instance",
            &resource,
            policy.create_resource_instance(instance),
        )
        .await;
    }
    sync.run(
        "assign_role",
        format!("{}@{}", roles::ADMIN, resource),
        policy.assign_role(RoleAssignment::scoped(&task.created_by, roles::ADMIN, &resource)),
    )
    .await;
    sync.run(
        "assign_role",
        format!("{}@{}", roles::ASSIGNEE, resource),
        policy.assign_role(RoleAssignment::scoped(&task.assigned_to, roles::ASSIGNEE, &resource)),
    )
    .await;
    sync.run(
        "create_relationship",
        format!("{} {} {}", org, relations::PARENT, resource),
        policy.create_relationship(RelationshipTuple::new(&org, relations::PARENT, &resource)),
    )
    .await;

    Ok(WorkflowOutcome::new(CREATED, task).with_sync(sync))
}

/// Applies a partial update to a task
///
/// When the update carries `assignedTo`, the `assignee` role is assigned
/// again even if the assignee did not change. Without it no role call is
/// made.
pub async fn update_task(
    store: &dyn DocumentStore,
    policy: &dyn PolicyClient,
    input: UpdateTask,
) -> WorkflowResult<Task> {
    if is_blank(&input.task_id) || is_blank(&input.updated_by) {
        return Err(WorkflowError::InvalidInput(INVALID_UPDATE.to_string()));
    }

    let Some(task) = Task::find(store, &input.task_id).await? else {
        tracing::debug!(task_id = %input.task_id, "Task not found");
        return Err(WorkflowError::NotFound(NOT_FOUND.to_string()));
    };

    if input.patch.is_empty() {
        return Err(WorkflowError::InvalidInput(NO_FIELDS.to_string()));
    }

    let updated = match task.update(store, &input.patch, &input.updated_by).await {
        Ok(updated) => updated,
        // Deleted between the read and the write
        Err(StoreError::NotFound { .. }) => {
            return Err(WorkflowError::NotFound(NOT_FOUND.to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(task_id = %updated.id, updated_by = %input.updated_by, "Task updated");

    let mut sync = SyncReport::default();
    if let Some(assignee) = &input.patch.assigned_to {
        let resource = ResourceRef::task(&updated.id);
        sync.run(
            "assign_role",
            format!("{}@{}", roles::ASSIGNEE, resource),
            policy.assign_role(RoleAssignment::scoped(assignee, roles::ASSIGNEE, &resource)),
        )
        .await;
    }

    Ok(WorkflowOutcome::new(UPDATED, updated).with_sync(sync))
}

/// Moves a task to another status column
pub async fn change_task_status(
    store: &dyn DocumentStore,
    policy: &dyn PolicyClient,
    task_id: &str,
    status: TaskStatus,
    updated_by: &str,
) -> WorkflowResult<Task> {
    update_task(
        store,
        policy,
        UpdateTask {
            task_id: task_id.to_string(),
            updated_by: updated_by.to_string(),
            patch: TaskPatch::status(status),
        },
    )
    .await
}

/// Hard-deletes a task
///
/// Role assignments and relationships in the policy service are left behind.
pub async fn delete_task(store: &dyn DocumentStore, task_id: &str) -> WorkflowResult<String> {
    if is_blank(task_id) {
        return Err(WorkflowError::InvalidInput(INVALID_UPDATE.to_string()));
    }

    if !Task::delete(store, task_id).await? {
        return Err(WorkflowError::NotFound(NOT_FOUND.to_string()));
    }

    tracing::info!(task_id, "Task deleted");
    Ok(WorkflowOutcome::new(DELETED, task_id.to_string()))
}
