//! Membership records
//!
//! A membership links one user to one organization and is keyed
//! `orgId_userId`, so the store's guarded create enforces at most one
//! membership per pair.
//!
//! # Statuses
//!
//! - **invited**: added by another member, not yet joined (default)
//! - **active**: joined; `joinedAt` and `lastActiveAt` are stamped on creation
//! - **suspended**: kept for history, no longer active
//!
//! # Example
//!
//! ```no_run
//! use taskorg_shared::models::membership::{CreateMembership, Membership, MembershipStatus};
//! use taskorg_shared::store::MemoryDocumentStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = MemoryDocumentStore::new();
//! let membership = Membership::create(&store, CreateMembership {
//!     org_id: "acme".to_string(),
//!     user_id: "u2".to_string(),
//!     invited_by: "u1".to_string(),
//!     status: MembershipStatus::Invited,
//!     role: None,
//! }).await?;
//! assert!(membership.joined_at.is_none());
//! # Ok(())
//! # }
//! ```

use super::list;
use crate::store::{to_object, Collection, DocumentStore, Filter, StoreResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Membership lifecycle status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipStatus {
    #[default]
    Invited,
    Active,
    Suspended,
}

impl MembershipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MembershipStatus::Invited => "invited",
            MembershipStatus::Active => "active",
            MembershipStatus::Suspended => "suspended",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, MembershipStatus::Active)
    }
}

/// User-organization link
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub org_id: String,

    pub user_id: String,

    #[serde(default)]
    pub status: MembershipStatus,

    /// Organization-level role label shown in member lists
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    pub invited_by: String,

    pub invited_at: DateTime<Utc>,

    /// Set on creation only for active memberships
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_active_at: Option<DateTime<Utc>>,
}

/// Input for creating a membership
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMembership {
    pub org_id: String,
    pub user_id: String,
    pub invited_by: String,

    #[serde(default)]
    pub status: MembershipStatus,

    #[serde(default)]
    pub role: Option<String>,
}

impl Membership {
    /// Composite document key
    pub fn document_id(org_id: &str, user_id: &str) -> String {
        format!("{}_{}", org_id, user_id)
    }

    pub async fn find(
        store: &dyn DocumentStore,
        org_id: &str,
        user_id: &str,
    ) -> StoreResult<Option<Self>> {
        let id = Self::document_id(org_id, user_id);
        match store.get(Collection::Memberships, &id).await? {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    /// Writes a new membership
    ///
    /// `invitedAt` is always stamped; `joinedAt` and `lastActiveAt` only when
    /// the status is active.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::AlreadyExists` when the pair already has a
    /// membership.
    pub async fn create(store: &dyn DocumentStore, data: CreateMembership) -> StoreResult<Self> {
        let now = Utc::now();
        let joined = data.status.is_active().then_some(now);

        let membership = Membership {
            org_id: data.org_id,
            user_id: data.user_id,
            status: data.status,
            role: data.role,
            invited_by: data.invited_by,
            invited_at: now,
            joined_at: joined,
            last_active_at: joined,
        };

        let id = Self::document_id(&membership.org_id, &membership.user_id);
        store
            .create(Collection::Memberships, &id, to_object(&membership)?)
            .await?;

        tracing::debug!(
            org_id = %membership.org_id,
            user_id = %membership.user_id,
            status = membership.status.as_str(),
            "Membership record created"
        );
        Ok(membership)
    }

    /// All memberships of an organization
    pub async fn list_for_org(store: &dyn DocumentStore, org_id: &str) -> StoreResult<Vec<Self>> {
        list(store, Collection::Memberships, &[Filter::eq("orgId", org_id)]).await
    }

    /// All memberships held by a user
    pub async fn list_for_user(store: &dyn DocumentStore, user_id: &str) -> StoreResult<Vec<Self>> {
        list(store, Collection::Memberships, &[Filter::eq("userId", user_id)]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryDocumentStore, StoreError};

    fn invite(org_id: &str, user_id: &str, status: MembershipStatus) -> CreateMembership {
        CreateMembership {
            org_id: org_id.to_string(),
            user_id: user_id.to_string(),
            invited_by: "u1".to_string(),
            status,
            role: None,
        }
    }

    #[test]
    fn test_document_id() {
        assert_eq!(Membership::document_id("acme", "u2"), "acme_u2");
    }

    #[test]
    fn test_status_defaults_to_invited() {
        assert_eq!(MembershipStatus::default(), MembershipStatus::Invited);

        let input: CreateMembership =
            serde_json::from_str(r#"{"orgId":"acme","userId":"u2","invitedBy":"u1"}"#).unwrap();
        assert_eq!(input.status, MembershipStatus::Invited);
    }

    #[tokio::test]
    async fn test_invited_membership_has_no_join_timestamps() {
        let store = MemoryDocumentStore::new();
        let membership = Membership::create(&store, invite("acme", "u2", MembershipStatus::Invited))
            .await
            .unwrap();

        assert!(membership.joined_at.is_none());
        assert!(membership.last_active_at.is_none());

        let doc = store
            .get(Collection::Memberships, "acme_u2")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc.data["status"], "invited");
        assert!(doc.data["joinedAt"].is_null());
        assert!(doc.data["invitedAt"].is_string());
    }

    #[tokio::test]
    async fn test_active_membership_stamps_join() {
        let store = MemoryDocumentStore::new();
        let membership = Membership::create(&store, invite("acme", "u1", MembershipStatus::Active))
            .await
            .unwrap();

        assert_eq!(membership.joined_at, Some(membership.invited_at));
        assert_eq!(membership.last_active_at, Some(membership.invited_at));
    }

    #[tokio::test]
    async fn test_one_membership_per_pair() {
        let store = MemoryDocumentStore::new();
        Membership::create(&store, invite("acme", "u2", MembershipStatus::Invited))
            .await
            .unwrap();

        let err = Membership::create(&store, invite("acme", "u2", MembershipStatus::Active))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn test_list_by_org_and_user() {
        let store = MemoryDocumentStore::new();
        for (org, user) in [("acme", "u1"), ("acme", "u2"), ("globex", "u2")] {
            Membership::create(&store, invite(org, user, MembershipStatus::Invited))
                .await
                .unwrap();
        }

        assert_eq!(Membership::list_for_org(&store, "acme").await.unwrap().len(), 2);
        assert_eq!(Membership::list_for_user(&store, "u2").await.unwrap().len(), 2);
        assert!(Membership::find(&store, "globex", "u1").await.unwrap().is_none());
    }
}
