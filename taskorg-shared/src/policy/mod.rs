//! Authorization service client
//!
//! Permission checks and the facts they depend on (role assignments, resource
//! instances, relationships) live in an external policy service. Workflows
//! talk to it through the [`PolicyClient`] trait, which is always passed in
//! explicitly so tests can swap in [`RecordingPolicyClient`].
//!
//! Every call is a single request/response with no retry. Sync calls made
//! after a store write are never rolled back; see `workflows::SyncReport`.
//!
//! # Example
//!
//! ```no_run
//! use taskorg_shared::policy::{roles, PermitClient, PermitConfig, PolicyClient, ResourceRef, RoleAssignment};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PermitClient::new(PermitConfig::from_env()?)?;
//!
//! if client.check("u1", "create", &ResourceRef::kind("Organization"), None).await? {
//!     client
//!         .assign_role(RoleAssignment::scoped("u1", roles::ADMIN, &ResourceRef::organization("acme")))
//!         .await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod permit;
pub mod recording;

pub use permit::{PermitClient, PermitConfig};
pub use recording::{PolicyCall, RecordingPolicyClient};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fmt;

/// Resource types registered with the policy service
pub mod resources {
    pub const ORGANIZATION: &str = "Organization";
    pub const TASK: &str = "Task";
}

/// Role keys
pub mod roles {
    pub const ADMIN: &str = "admin";
    pub const MEMBER: &str = "member";
    pub const ASSIGNEE: &str = "assignee";
}

/// Action keys
pub mod actions {
    pub const CREATE: &str = "create";
    pub const READ: &str = "read";
}

/// Relation keys
pub mod relations {
    pub const PARENT: &str = "parent";
}

/// Tenant used when none is given
pub const DEFAULT_TENANT: &str = "default";

/// Reference to a resource type or a single instance, written `Type` or `Type:key`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub resource_type: String,
    pub key: Option<String>,
}

impl ResourceRef {
    /// The resource type as a whole (no instance)
    pub fn kind(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            key: None,
        }
    }

    pub fn instance(resource_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            key: Some(key.into()),
        }
    }

    pub fn organization(id: impl Into<String>) -> Self {
        Self::instance(resources::ORGANIZATION, id)
    }

    pub fn task(id: impl Into<String>) -> Self {
        Self::instance(resources::TASK, id)
    }

    /// Parses `Type` or `Type:key`
    ///
    /// # Errors
    ///
    /// Returns `PolicyError::InvalidResource` for an empty type or key.
    pub fn parse(s: &str) -> Result<Self, PolicyError> {
        let invalid = || PolicyError::InvalidResource(s.to_string());
        match s.split_once(':') {
            Some((resource_type, key)) if !resource_type.is_empty() && !key.is_empty() => {
                Ok(Self::instance(resource_type, key))
            }
            Some(_) => Err(invalid()),
            None if !s.is_empty() => Ok(Self::kind(s)),
            None => Err(invalid()),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}:{}", self.resource_type, key),
            None => f.write_str(&self.resource_type),
        }
    }
}

/// Role grant, optionally scoped to one resource instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub user: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_instance: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

impl RoleAssignment {
    /// Role on a single resource instance
    pub fn scoped(user: impl Into<String>, role: impl Into<String>, resource: &ResourceRef) -> Self {
        Self {
            user: user.into(),
            role: role.into(),
            resource_type: Some(resource.resource_type.clone()),
            resource_instance: resource.key.clone(),
            tenant: None,
        }
    }

    /// `Type:key` scope, only when both halves are present
    pub fn instance(&self) -> Option<String> {
        match (&self.resource_type, &self.resource_instance) {
            (Some(resource_type), Some(key)) => Some(format!("{}:{}", resource_type, key)),
            _ => None,
        }
    }
}

/// Resource instance registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInstance {
    pub key: String,
    pub resource: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<String>,
}

impl ResourceInstance {
    /// Registration for an instance reference
    ///
    /// The tenant is left to the client, which uses its configured one.
    /// `None` for a bare resource type.
    pub fn for_ref(resource: &ResourceRef) -> Option<Self> {
        resource.key.as_ref().map(|key| Self {
            key: key.clone(),
            resource: resource.resource_type.clone(),
            tenant: None,
        })
    }
}

/// Directed link between two resource instances
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipTuple {
    /// `Type:key` of the subject
    pub subject: String,
    pub relation: String,
    /// `Type:key` of the object
    pub object: String,
}

impl RelationshipTuple {
    pub fn new(subject: &ResourceRef, relation: impl Into<String>, object: &ResourceRef) -> Self {
        Self {
            subject: subject.to_string(),
            relation: relation.into(),
            object: object.to_string(),
        }
    }
}

/// User profile mirrored into the policy service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncUser {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub attributes: Map<String, JsonValue>,
}

/// Policy service errors
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Policy service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Malformed policy service response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid resource: {0}")]
    InvalidResource(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Raised by test doubles and unreachable backends
    #[error("Policy service unavailable: {0}")]
    Unavailable(String),
}

pub type PolicyResult<T> = Result<T, PolicyError>;

/// Operations against the authorization service
///
/// Record-returning calls hand back the service's JSON response untouched.
#[async_trait]
pub trait PolicyClient: Send + Sync {
    /// Asks whether `user` may perform `action` on `resource`
    async fn check(
        &self,
        user: &str,
        action: &str,
        resource: &ResourceRef,
        context: Option<JsonValue>,
    ) -> PolicyResult<bool>;

    async fn assign_role(&self, assignment: RoleAssignment) -> PolicyResult<JsonValue>;

    async fn create_resource_instance(&self, instance: ResourceInstance) -> PolicyResult<JsonValue>;

    async fn create_relationship(&self, tuple: RelationshipTuple) -> PolicyResult<JsonValue>;

    async fn list_resource_instances(&self) -> PolicyResult<JsonValue>;

    /// Creates or replaces the user record
    async fn sync_user(&self, user: SyncUser) -> PolicyResult<JsonValue>;
}
