//! Task records
//!
//! Tasks belong to one organization, are created by one user and assigned to
//! one user. `participants` holds the deduplicated `[createdBy, assignedTo]`
//! pair so "tasks visible to user X" is a single array-contains query.
//!
//! # State Machine
//!
//! ```text
//! todo ⇄ in-progress ⇄ completed
//! ```
//!
//! Any status may be set from any other; the board moves cards freely.
//!
//! # Document
//!
//! ```json
//! {
//!   "id": "9b1e…",
//!   "orgId": "3f2c…",
//!   "name": "Ship v1",
//!   "description": "Cut the release",
//!   "dueDate": "2025-02-01T00:00:00Z",
//!   "priority": "high",
//!   "status": "todo",
//!   "assignedTo": "u2",
//!   "createdBy": "u1",
//!   "participants": ["u1", "u2"],
//!   "createdAt": "2025-01-01T00:00:00Z",
//!   "updatedAt": "2025-01-01T00:00:00Z"
//! }
//! ```

use super::list;
use crate::store::{to_object, Collection, DocumentStore, Filter, StoreError, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

/// Task workflow status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Completed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in-progress",
            TaskStatus::Completed => "completed",
        }
    }

    /// Human-readable column title
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "To Do",
            TaskStatus::InProgress => "In Progress",
            TaskStatus::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    #[default]
    Low,
    Medium,
    High,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }
}

/// Task record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Generated id, also the document key
    pub id: String,

    pub org_id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default)]
    pub priority: TaskPriority,

    #[serde(default)]
    pub status: TaskStatus,

    pub assigned_to: String,

    pub created_by: String,

    /// Deduplicated `[createdBy, assignedTo]`
    #[serde(default)]
    pub participants: Vec<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,

    /// Set by every update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated_by: Option<String>,
}

/// Input for creating a task
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub org_id: String,
    pub name: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    #[serde(default)]
    pub priority: TaskPriority,
    #[serde(default)]
    pub status: TaskStatus,
    pub assigned_to: String,
    pub created_by: String,
}

/// Partial task update
///
/// Absent fields are left untouched; they never reach the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
}

impl TaskPatch {
    /// A patch that only moves the task to `status`
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// True when no field would be written
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.assigned_to.is_none()
    }
}

/// How a task relates to the user viewing it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskRelation {
    Created,
    Assigned,
}

/// Task annotated with the viewer's relation to it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskWithRelation {
    #[serde(flatten)]
    pub task: Task,

    pub relation: TaskRelation,
}

impl TaskWithRelation {
    /// `created` when the viewer created the task, `assigned` otherwise
    pub fn for_viewer(task: Task, viewer: &str) -> Self {
        let relation = if task.created_by == viewer {
            TaskRelation::Created
        } else {
            TaskRelation::Assigned
        };
        Self { task, relation }
    }
}

/// Deduplicated participant list, creator first
pub fn participants(created_by: &str, assigned_to: &str) -> Vec<String> {
    let mut participants = vec![created_by.to_string()];
    if assigned_to != created_by {
        participants.push(assigned_to.to_string());
    }
    participants
}

impl Task {
    pub async fn find(store: &dyn DocumentStore, id: &str) -> StoreResult<Option<Self>> {
        match store.get(Collection::Tasks, id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Writes a new task under a fresh UUID
    pub async fn create(store: &dyn DocumentStore, data: NewTask) -> StoreResult<Self> {
        let now = Utc::now();
        let task = Task {
            id: Uuid::new_v4().to_string(),
            participants: participants(&data.created_by, &data.assigned_to),
            org_id: data.org_id,
            name: data.name,
            description: data.description,
            due_date: Some(data.due_date),
            priority: data.priority,
            status: data.status,
            assigned_to: data.assigned_to,
            created_by: data.created_by,
            created_at: now,
            updated_at: now,
            last_updated_by: None,
        };

        store
            .create(Collection::Tasks, &task.id, to_object(&task)?)
            .await?;

        tracing::debug!(task_id = %task.id, org_id = %task.org_id, "Task record created");
        Ok(task)
    }

    /// Merges `patch` into this task and returns the updated record
    ///
    /// Stamps `updatedAt` and `lastUpdatedBy`. A new assignee also refreshes
    /// `participants`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the task was deleted meanwhile.
    pub async fn update(
        &self,
        store: &dyn DocumentStore,
        patch: &TaskPatch,
        updated_by: &str,
    ) -> StoreResult<Self> {
        let mut fields = match to_object(patch)? {
            JsonValue::Object(fields) => fields,
            _ => Map::new(),
        };

        if let Some(assignee) = &patch.assigned_to {
            fields.insert(
                "participants".to_string(),
                serde_json::to_value(participants(&self.created_by, assignee))?,
            );
        }
        fields.insert("updatedAt".to_string(), serde_json::to_value(Utc::now())?);
        fields.insert("lastUpdatedBy".to_string(), JsonValue::from(updated_by));

        store
            .merge(Collection::Tasks, &self.id, fields.clone())
            .await?;

        let mut merged = match to_object(self)? {
            JsonValue::Object(current) => current,
            _ => return Err(StoreError::InvalidData("task is not an object".to_string())),
        };
        merged.extend(fields);

        tracing::debug!(task_id = %self.id, updated_by, "Task record updated");
        Ok(serde_json::from_value(JsonValue::Object(merged))?)
    }

    /// Hard-deletes a task, returning whether it existed
    pub async fn delete(store: &dyn DocumentStore, id: &str) -> StoreResult<bool> {
        store.delete(Collection::Tasks, id).await
    }

    /// Query filters for the tasks a user takes part in within an organization
    pub fn visible_to(org_id: &str, user_id: &str) -> Vec<Filter> {
        vec![
            Filter::eq("orgId", org_id),
            Filter::array_contains("participants", user_id),
        ]
    }

    /// Tasks in an organization created by or assigned to `user_id`
    pub async fn list_for_user_in_org(
        store: &dyn DocumentStore,
        org_id: &str,
        user_id: &str,
    ) -> StoreResult<Vec<Self>> {
        list(store, Collection::Tasks, &Self::visible_to(org_id, user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;

    fn ship_v1(created_by: &str, assigned_to: &str) -> NewTask {
        NewTask {
            org_id: "acme".to_string(),
            name: "Ship v1".to_string(),
            description: "Cut the release".to_string(),
            due_date: Utc::now(),
            priority: TaskPriority::default(),
            status: TaskStatus::default(),
            assigned_to: assigned_to.to_string(),
            created_by: created_by.to_string(),
        }
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(
            serde_json::to_value(TaskStatus::InProgress).unwrap(),
            "in-progress"
        );
        let status: TaskStatus = serde_json::from_str(r#""completed""#).unwrap();
        assert_eq!(status, TaskStatus::Completed);
        assert_eq!(TaskStatus::InProgress.label(), "In Progress");
        assert!(serde_json::from_str::<TaskStatus>(r#""open""#).is_err());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(TaskStatus::default(), TaskStatus::Todo);
        assert_eq!(TaskPriority::default(), TaskPriority::Low);
    }

    #[test]
    fn test_participants_are_deduplicated() {
        assert_eq!(participants("u1", "u2"), vec!["u1", "u2"]);
        assert_eq!(participants("u1", "u1"), vec!["u1"]);
    }

    #[test]
    fn test_patch_serializes_only_present_fields() {
        let patch = TaskPatch::status(TaskStatus::Completed);
        assert!(!patch.is_empty());
        assert!(TaskPatch::default().is_empty());

        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({"status": "completed"}));
    }

    #[test]
    fn test_relation_for_viewer() {
        let now = Utc::now();
        let task = Task {
            id: "t1".to_string(),
            org_id: "acme".to_string(),
            name: "Ship v1".to_string(),
            description: String::new(),
            due_date: None,
            priority: TaskPriority::High,
            status: TaskStatus::Todo,
            assigned_to: "u2".to_string(),
            created_by: "u1".to_string(),
            participants: participants("u1", "u2"),
            created_at: now,
            updated_at: now,
            last_updated_by: None,
        };

        let created = TaskWithRelation::for_viewer(task.clone(), "u1");
        assert_eq!(created.relation, TaskRelation::Created);
        let assigned = TaskWithRelation::for_viewer(task, "u2");
        assert_eq!(assigned.relation, TaskRelation::Assigned);

        let json = serde_json::to_value(&assigned).unwrap();
        assert_eq!(json["relation"], "assigned");
        assert_eq!(json["name"], "Ship v1");
    }

    #[tokio::test]
    async fn test_create_and_list_visible() {
        let store = MemoryDocumentStore::new();
        let task = Task::create(&store, ship_v1("u1", "u2")).await.unwrap();
        assert_eq!(task.participants, vec!["u1", "u2"]);
        Task::create(&store, ship_v1("u3", "u3")).await.unwrap();

        let for_u2 = Task::list_for_user_in_org(&store, "acme", "u2").await.unwrap();
        assert_eq!(for_u2.len(), 1);
        assert_eq!(for_u2[0].id, task.id);

        assert!(Task::list_for_user_in_org(&store, "globex", "u2")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_update_stamps_and_refreshes_participants() {
        let store = MemoryDocumentStore::new();
        let task = Task::create(&store, ship_v1("u1", "u2")).await.unwrap();

        let patch = TaskPatch {
            assigned_to: Some("u3".to_string()),
            ..TaskPatch::default()
        };
        let updated = task.update(&store, &patch, "u1").await.unwrap();

        assert_eq!(updated.assigned_to, "u3");
        assert_eq!(updated.participants, vec!["u1", "u3"]);
        assert_eq!(updated.last_updated_by.as_deref(), Some("u1"));
        assert_eq!(updated.name, "Ship v1");

        let stored = Task::find(&store, &task.id).await.unwrap().unwrap();
        assert_eq!(stored, updated);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryDocumentStore::new();
        let task = Task::create(&store, ship_v1("u1", "u2")).await.unwrap();

        assert!(Task::delete(&store, &task.id).await.unwrap());
        assert!(Task::find(&store, &task.id).await.unwrap().is_none());
        assert!(!Task::delete(&store, &task.id).await.unwrap());
    }
}
