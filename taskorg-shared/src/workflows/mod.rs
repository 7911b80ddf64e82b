//! Application workflows
//!
//! Each workflow composes, strictly in sequence:
//!
//! 1. a permission check against the policy service (create paths only),
//! 2. input validation and existence checks against the store,
//! 3. the primary store write,
//! 4. zero or more policy sync calls describing the new entity.
//!
//! Failures in steps 1-3 abort the workflow and come back as a
//! [`WorkflowError`]. Failures in step 4 do not: the primary write already
//! happened and is not rolled back, so each failed sync call is logged at
//! `warn` and listed in the outcome's [`SyncReport`].
//!
//! The store and policy client are passed in on every call.
//!
//! # Example
//!
//! ```no_run
//! use taskorg_shared::policy::RecordingPolicyClient;
//! use taskorg_shared::store::MemoryDocumentStore;
//! use taskorg_shared::workflows::organization::{create_organization, CreateOrganization};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryDocumentStore::new();
//! let policy = RecordingPolicyClient::new();
//!
//! let outcome = create_organization(&store, &policy, CreateOrganization {
//!     name: "Acme".to_string(),
//!     user_id: "u1".to_string(),
//! }).await?;
//!
//! println!("{}: {}", outcome.message, outcome.value.organization.id);
//! assert!(outcome.sync.complete);
//! # Ok(())
//! # }
//! ```

pub mod membership;
pub mod organization;
pub mod task;
pub mod user;

use crate::policy::{PolicyClient, PolicyError, PolicyResult, ResourceRef};
use crate::store::StoreError;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::fmt::Display;
use std::future::Future;

/// Reasons a workflow stops before or during its primary write
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// Missing or malformed input
    #[error("{0}")]
    InvalidInput(String),

    /// A referenced record does not exist
    #[error("{0}")]
    NotFound(String),

    /// The record to create already exists
    #[error("{0}")]
    Conflict(String),

    /// The policy service answered the permission check with "no"
    #[error("User {user} is not permitted to {action} {resource}")]
    PermissionDenied {
        user: String,
        action: String,
        resource: String,
    },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// The permission check itself failed
    #[error("Policy service error: {0}")]
    Policy(#[from] PolicyError),
}

impl WorkflowError {
    /// True for the transport/store failures that are the server's fault
    pub fn is_internal(&self) -> bool {
        matches!(self, WorkflowError::Store(_) | WorkflowError::Policy(_))
    }
}

pub type WorkflowResult<T> = Result<WorkflowOutcome<T>, WorkflowError>;

/// Successful workflow result
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome<T> {
    /// Caller-facing status message
    pub message: String,

    pub value: T,

    /// Policy sync calls made after the primary write
    pub sync: SyncReport,
}

impl<T> WorkflowOutcome<T> {
    pub fn new(message: impl Into<String>, value: T) -> Self {
        Self {
            message: message.into(),
            value,
            sync: SyncReport::default(),
        }
    }

    pub fn with_sync(mut self, sync: SyncReport) -> Self {
        self.sync = sync;
        self
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WorkflowOutcome<U> {
        WorkflowOutcome {
            message: self.message,
            value: f(self.value),
            sync: self.sync,
        }
    }
}

/// A policy sync call that failed after the primary write succeeded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncFailure {
    /// Policy client operation, e.g. `assign_role`
    pub operation: String,

    /// What the call was about, e.g. `assignee@Task:t1`
    pub target: String,

    pub error: String,
}

/// Outcome of the post-write policy sync calls of one workflow
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncReport {
    /// False when at least one call failed
    pub complete: bool,

    pub failures: Vec<SyncFailure>,
}

impl Default for SyncReport {
    fn default() -> Self {
        Self {
            complete: true,
            failures: Vec::new(),
        }
    }
}

impl SyncReport {
    /// Awaits one sync call, recording its failure instead of returning it
    pub(crate) async fn run<F>(&mut self, operation: &'static str, target: impl Display, call: F)
    where
        F: Future<Output = PolicyResult<JsonValue>>,
    {
        match call.await {
            Ok(_) => {
                tracing::debug!(operation, target = %target, "Policy sync call succeeded");
            }
            Err(e) => {
                tracing::warn!(
                    operation,
                    target = %target,
                    error = %e,
                    "Policy sync failed after primary write; store and policy service now disagree"
                );
                self.complete = false;
                self.failures.push(SyncFailure {
                    operation: operation.to_string(),
                    target: target.to_string(),
                    error: e.to_string(),
                });
            }
        }
    }

    /// Folds another report into this one
    pub fn absorb(&mut self, other: SyncReport) {
        self.complete &= other.complete;
        self.failures.extend(other.failures);
    }
}

/// Rejects the workflow unless the policy service allows the action
///
/// # Errors
///
/// `PermissionDenied` when the answer is no, `Policy` when the check fails.
pub async fn require_permission(
    policy: &dyn PolicyClient,
    user: &str,
    action: &str,
    resource: &ResourceRef,
) -> Result<(), WorkflowError> {
    if policy.check(user, action, resource, None).await? {
        return Ok(());
    }

    tracing::info!(user, action, resource = %resource, "Permission denied");
    Err(WorkflowError::PermissionDenied {
        user: user.to_string(),
        action: action.to_string(),
        resource: resource.to_string(),
    })
}

/// True when `value` is missing or blank
pub(crate) fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}
