//! User sign-in, lookup and organization access checks

use super::{is_blank, SyncReport, WorkflowError, WorkflowOutcome, WorkflowResult};
use crate::models::user::{NewUser, User};
use crate::policy::{actions, PolicyClient, ResourceRef, SyncUser};
use crate::store::{DocumentStore, StoreError};

pub const INVALID_CREDENTIALS: &str = "Invalid user credentials";
pub const CREATED: &str = "User created successfully";
pub const ALREADY_EXISTS: &str = "User already exists";
pub const INVALID_EMAIL: &str = "Invalid email";
pub const NOT_FOUND: &str = "User not found";
pub const FOUND: &str = "User found";

/// Records a signed-in identity, once
///
/// The first sign-in writes the user record and mirrors the profile into
/// the policy service; later sign-ins return the stored record unchanged.
pub async fn sign_in(
    store: &dyn DocumentStore,
    policy: &dyn PolicyClient,
    identity: NewUser,
) -> WorkflowResult<User> {
    if is_blank(&identity.uid) {
        return Err(WorkflowError::InvalidInput(INVALID_CREDENTIALS.to_string()));
    }

    if let Some(existing) = User::find(store, &identity.uid).await? {
        tracing::debug!(uid = %existing.uid, "User already exists");
        return Ok(WorkflowOutcome::new(ALREADY_EXISTS, existing));
    }

    let uid = identity.uid.clone();
    let user = match User::create(store, identity).await {
        Ok(user) => user,
        // A concurrent sign-in wrote it first
        Err(StoreError::AlreadyExists { .. }) => {
            let existing = User::find(store, &uid)
                .await?
                .ok_or_else(|| WorkflowError::NotFound(NOT_FOUND.to_string()))?;
            return Ok(WorkflowOutcome::new(ALREADY_EXISTS, existing));
        }
        Err(e) => return Err(e.into()),
    };
    tracing::info!(uid = %user.uid, "User created");

    let mut sync = SyncReport::default();
    sync.run("sync_user", &user.uid, policy.sync_user(profile(&user)))
        .await;

    Ok(WorkflowOutcome::new(CREATED, user).with_sync(sync))
}

/// Policy-service profile for a user; the display name is split on its first space
fn profile(user: &User) -> SyncUser {
    let (first_name, last_name) = match user.display_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => match name.split_once(' ') {
            Some((first, last)) => (Some(first.to_string()), Some(last.trim().to_string())),
            None => (Some(name.to_string()), None),
        },
        _ => (None, None),
    };

    SyncUser {
        key: user.uid.clone(),
        email: user.email.clone(),
        first_name,
        last_name,
        ..SyncUser::default()
    }
}

/// Finds the user registered under `email`
pub async fn find_user_by_email(store: &dyn DocumentStore, email: &str) -> WorkflowResult<User> {
    if is_blank(email) {
        return Err(WorkflowError::InvalidInput(INVALID_EMAIL.to_string()));
    }

    match User::find_by_email(store, email).await? {
        Some(user) => Ok(WorkflowOutcome::new(FOUND, user)),
        None => {
            tracing::debug!(email, "No user with this email");
            Err(WorkflowError::NotFound(NOT_FOUND.to_string()))
        }
    }
}

/// Whether `user_id` may read the organization
pub async fn check_organization_access(
    policy: &dyn PolicyClient,
    user_id: &str,
    org_id: &str,
) -> Result<bool, WorkflowError> {
    if is_blank(user_id) || is_blank(org_id) {
        return Ok(false);
    }

    let allowed = policy
        .check(user_id, actions::READ, &ResourceRef::organization(org_id), None)
        .await?;
    Ok(allowed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{PolicyCall, RecordingPolicyClient};
    use crate::store::MemoryDocumentStore;

    fn ada() -> NewUser {
        NewUser {
            uid: "u1".to_string(),
            display_name: Some("Ada King Lovelace".to_string()),
            email: Some("Ada@Example.com".to_string()),
            photo_url: None,
        }
    }

    #[tokio::test]
    async fn test_sign_in_creates_once_and_syncs() {
        let store = MemoryDocumentStore::new();
        let policy = RecordingPolicyClient::new();

        let first = sign_in(&store, &policy, ada()).await.unwrap();
        assert_eq!(first.message, CREATED);

        let second = sign_in(&store, &policy, ada()).await.unwrap();
        assert_eq!(second.message, ALREADY_EXISTS);
        assert_eq!(second.value, first.value);

        let synced: Vec<_> = policy
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                PolicyCall::SyncUser(user) => Some(user),
                _ => None,
            })
            .collect();
        assert_eq!(synced.len(), 1);
        assert_eq!(synced[0].key, "u1");
        assert_eq!(synced[0].email.as_deref(), Some("ada@example.com"));
        assert_eq!(synced[0].first_name.as_deref(), Some("Ada"));
        assert_eq!(synced[0].last_name.as_deref(), Some("King Lovelace"));
    }

    #[tokio::test]
    async fn test_sign_in_requires_uid() {
        let store = MemoryDocumentStore::new();
        let err = sign_in(&store, &RecordingPolicyClient::new(), NewUser::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), INVALID_CREDENTIALS);
    }

    #[tokio::test]
    async fn test_sync_user_failure_is_reported() {
        let store = MemoryDocumentStore::new();
        let policy = RecordingPolicyClient::new().failing("sync_user");

        let outcome = sign_in(&store, &policy, ada()).await.unwrap();
        assert_eq!(outcome.message, CREATED);
        assert!(!outcome.sync.complete);
    }

    #[tokio::test]
    async fn test_find_user_by_email() {
        let store = MemoryDocumentStore::new();
        sign_in(&store, &RecordingPolicyClient::new(), ada())
            .await
            .unwrap();

        let found = find_user_by_email(&store, "  ADA@example.com").await.unwrap();
        assert_eq!(found.value.uid, "u1");

        let blank = find_user_by_email(&store, " ").await.unwrap_err();
        assert_eq!(blank.to_string(), INVALID_EMAIL);

        let missing = find_user_by_email(&store, "bob@example.com").await.unwrap_err();
        assert_eq!(missing.to_string(), NOT_FOUND);
    }

    #[tokio::test]
    async fn test_organization_access_check() {
        let policy = RecordingPolicyClient::new();
        assert!(check_organization_access(&policy, "u1", "acme").await.unwrap());
        assert_eq!(
            policy.calls(),
            vec![PolicyCall::Check {
                user: "u1".to_string(),
                action: "read".to_string(),
                resource: "Organization:acme".to_string(),
            }]
        );

        assert!(!check_organization_access(&RecordingPolicyClient::denying(), "u1", "acme")
            .await
            .unwrap());
        assert!(!check_organization_access(&policy, "", "acme").await.unwrap());
    }
}
