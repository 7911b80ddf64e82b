//! Organization records
//!
//! Organizations are keyed by a generated UUID and carry their display name
//! as a field. Creation is idempotent by name at the workflow level
//! ([`Organization::find_by_name`] runs first), so names stay unique in
//! practice without a uniqueness constraint.
//!
//! # Document
//!
//! ```json
//! {
//!   "id": "3f2c…",
//!   "name": "Acme",
//!   "createdBy": "u1",
//!   "createdAt": "2025-01-01T00:00:00Z",
//!   "updatedAt": "2025-01-01T00:00:00Z"
//! }
//! ```

use super::membership::Membership;
use crate::store::{to_object, Collection, DocumentStore, Filter, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Organization record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Generated id, also the document key
    pub id: String,

    pub name: String,

    /// User that created the organization
    #[serde(default)]
    pub created_by: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Organization together with its membership records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizationWithMembers {
    #[serde(flatten)]
    pub organization: Organization,

    pub members: Vec<Membership>,
}

impl Organization {
    pub async fn find(store: &dyn DocumentStore, id: &str) -> StoreResult<Option<Self>> {
        match store.get(Collection::Orgs, id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Finds the organization with exactly this name
    pub async fn find_by_name(store: &dyn DocumentStore, name: &str) -> StoreResult<Option<Self>> {
        let docs = store
            .query(Collection::Orgs, &[Filter::eq("name", name)])
            .await?;

        match docs.into_iter().next() {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Writes a new organization under a fresh UUID
    pub async fn create(store: &dyn DocumentStore, name: &str, created_by: &str) -> StoreResult<Self> {
        let now = Utc::now();
        let org = Organization {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            created_by: Some(created_by.to_string()),
            created_at: now,
            updated_at: now,
        };

        store
            .create(Collection::Orgs, &org.id, to_object(&org)?)
            .await?;

        tracing::debug!(org_id = %org.id, name = %org.name, "Organization record created");
        Ok(org)
    }

    /// Loads the organization and its memberships
    pub async fn with_members(
        store: &dyn DocumentStore,
        id: &str,
    ) -> StoreResult<Option<OrganizationWithMembers>> {
        let Some(organization) = Self::find(store, id).await? else {
            return Ok(None);
        };
        let members = Membership::list_for_org(store, id).await?;

        Ok(Some(OrganizationWithMembers {
            organization,
            members,
        }))
    }
}
