//! In-process [`PolicyClient`] that records every call
//!
//! Checks answer from a configurable decision (allow by default). Selected
//! operations can be made to fail so callers' sync-failure paths can be
//! exercised without a network.
//!
//! # Example
//!
//! ```no_run
//! use taskorg_shared::policy::{PolicyClient, RecordingPolicyClient, ResourceRef};
//!
//! # async fn example() {
//! let policy = RecordingPolicyClient::denying();
//! assert!(!policy.check("u1", "create", &ResourceRef::kind("Task"), None).await.unwrap());
//! assert_eq!(policy.calls().len(), 1);
//! # }
//! ```

use super::{
    PolicyClient, PolicyError, PolicyResult, RelationshipTuple, ResourceInstance, ResourceRef,
    RoleAssignment, SyncUser,
};
use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};
use std::collections::HashSet;
use std::sync::Mutex;

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyCall {
    Check {
        user: String,
        action: String,
        resource: String,
    },
    AssignRole(RoleAssignment),
    CreateResourceInstance(ResourceInstance),
    CreateRelationship(RelationshipTuple),
    ListResourceInstances,
    SyncUser(SyncUser),
}

impl PolicyCall {
    /// Operation name, as used by [`RecordingPolicyClient::failing`]
    pub fn operation(&self) -> &'static str {
        match self {
            PolicyCall::Check { .. } => "check",
            PolicyCall::AssignRole(_) => "assign_role",
            PolicyCall::CreateResourceInstance(_) => "create_resource_instance",
            PolicyCall::CreateRelationship(_) => "create_relationship",
            PolicyCall::ListResourceInstances => "list_resource_instances",
            PolicyCall::SyncUser(_) => "sync_user",
        }
    }
}

/// Recording test double
#[derive(Debug)]
pub struct RecordingPolicyClient {
    allow: bool,
    failing: HashSet<&'static str>,
    calls: Mutex<Vec<PolicyCall>>,
}

impl RecordingPolicyClient {
    /// Allows every check
    pub fn new() -> Self {
        Self {
            allow: true,
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Denies every check
    pub fn denying() -> Self {
        Self {
            allow: false,
            ..Self::new()
        }
    }

    /// Makes `operation` (e.g. `"assign_role"`) fail with `Unavailable`
    pub fn failing(mut self, operation: &'static str) -> Self {
        self.failing.insert(operation);
        self
    }

    /// Every call so far, oldest first
    pub fn calls(&self) -> Vec<PolicyCall> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn role_assignments(&self) -> Vec<RoleAssignment> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PolicyCall::AssignRole(assignment) => Some(assignment),
                _ => None,
            })
            .collect()
    }

    /// Calls other than permission checks
    pub fn writes(&self) -> Vec<PolicyCall> {
        self.calls()
            .into_iter()
            .filter(|call| !matches!(call, PolicyCall::Check { .. }))
            .collect()
    }

    fn record(&self, call: PolicyCall) -> PolicyResult<()> {
        let operation = call.operation();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }

        if self.failing.contains(operation) {
            return Err(PolicyError::Unavailable(format!("{} is configured to fail", operation)));
        }
        Ok(())
    }

    fn recorded_instances(&self) -> Vec<JsonValue> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PolicyCall::CreateResourceInstance(instance) => serde_json::to_value(instance).ok(),
                _ => None,
            })
            .collect()
    }
}

impl Default for RecordingPolicyClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PolicyClient for RecordingPolicyClient {
    async fn check(
        &self,
        user: &str,
        action: &str,
        resource: &ResourceRef,
        _context: Option<JsonValue>,
    ) -> PolicyResult<bool> {
        self.record(PolicyCall::Check {
            user: user.to_string(),
            action: action.to_string(),
            resource: resource.to_string(),
        })?;
        Ok(self.allow)
    }

    async fn assign_role(&self, assignment: RoleAssignment) -> PolicyResult<JsonValue> {
        let record = serde_json::to_value(&assignment)?;
        self.record(PolicyCall::AssignRole(assignment))?;
        Ok(record)
    }

    async fn create_resource_instance(&self, instance: ResourceInstance) -> PolicyResult<JsonValue> {
        let record = serde_json::to_value(&instance)?;
        self.record(PolicyCall::CreateResourceInstance(instance))?;
        Ok(record)
    }

    async fn create_relationship(&self, tuple: RelationshipTuple) -> PolicyResult<JsonValue> {
        let record = serde_json::to_value(&tuple)?;
        self.record(PolicyCall::CreateRelationship(tuple))?;
        Ok(record)
    }

    async fn list_resource_instances(&self) -> PolicyResult<JsonValue> {
        // Snapshot before recording so the listing does not include itself
        let instances = self.recorded_instances();
        self.record(PolicyCall::ListResourceInstances)?;
        Ok(json!(instances))
    }

    async fn sync_user(&self, user: SyncUser) -> PolicyResult<JsonValue> {
        let record = serde_json::to_value(&user)?;
        self.record(PolicyCall::SyncUser(user))?;
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::roles;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let policy = RecordingPolicyClient::new();
        assert!(policy
            .check("u1", "create", &ResourceRef::kind("Organization"), None)
            .await
            .unwrap());
        policy
            .assign_role(RoleAssignment::scoped(
                "u1",
                roles::ADMIN,
                &ResourceRef::organization("acme"),
            ))
            .await
            .unwrap();

        let calls = policy.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0],
            PolicyCall::Check {
                user: "u1".to_string(),
                action: "create".to_string(),
                resource: "Organization".to_string(),
            }
        );
        assert_eq!(policy.writes().len(), 1);
        assert_eq!(policy.role_assignments()[0].role, "admin");
    }

    #[tokio::test]
    async fn test_failing_operation_is_still_recorded() {
        let policy = RecordingPolicyClient::new().failing("create_relationship");
        let err = policy
            .create_relationship(RelationshipTuple::new(
                &ResourceRef::organization("acme"),
                "parent",
                &ResourceRef::task("t1"),
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, PolicyError::Unavailable(_)));
        assert_eq!(policy.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_list_returns_registered_instances() {
        let policy = RecordingPolicyClient::new();
        let instance = ResourceInstance::for_ref(&ResourceRef::task("t1")).unwrap();
        policy.create_resource_instance(instance).await.unwrap();

        let listed = policy.list_resource_instances().await.unwrap();
        assert_eq!(listed[0]["key"], "t1");
        assert_eq!(listed.as_array().map(Vec::len), Some(1));
    }
}
