//! Live feeds backing the dashboard views
//!
//! Each `watch_*` function starts a live query (see [`crate::store::watch`])
//! and returns its [`Subscription`]. Callbacks get the full current list on
//! start and again after every write to the watched collection. Related
//! records (users of members, organizations of memberships) are looked up
//! concurrently and joined before the callback fires.

use crate::models::membership::Membership;
use crate::models::organization::{Organization, OrganizationWithMembers};
use crate::models::task::{Task, TaskWithRelation};
use crate::models::user::User;
use crate::policy::roles;
use crate::store::{
    watch, Collection, DocumentStore, StoreError, StoreResult, Subscription, WatchTarget,
};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Member row shown in an organization's member list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgMember {
    /// User id
    pub id: String,

    /// Display name, falling back to the email
    pub display_name: Option<String>,

    pub email: Option<String>,

    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,

    /// Membership role, `member` unless set
    pub role: String,
}

impl OrgMember {
    fn new(user: User, membership: &Membership) -> Self {
        Self {
            display_name: user.label().map(str::to_string),
            id: user.uid,
            email: user.email,
            photo_url: user.photo_url,
            role: membership
                .role
                .clone()
                .unwrap_or_else(|| roles::MEMBER.to_string()),
        }
    }
}

/// Members of an organization joined with their user records
///
/// Memberships whose user record is missing are left out.
pub async fn org_members(store: &dyn DocumentStore, org_id: &str) -> StoreResult<Vec<OrgMember>> {
    let memberships = Membership::list_for_org(store, org_id).await?;

    let users = join_all(
        memberships
            .iter()
            .map(|membership| User::find(store, &membership.user_id)),
    )
    .await;

    let mut members = Vec::with_capacity(memberships.len());
    for (membership, user) in memberships.iter().zip(users) {
        match user? {
            Some(user) => members.push(OrgMember::new(user, membership)),
            None => {
                tracing::debug!(org_id, user_id = %membership.user_id, "Member has no user record");
            }
        }
    }
    Ok(members)
}

/// Organizations a user belongs to, each with its memberships
///
/// An organization that is missing or fails to load is left out rather
/// than failing the whole list.
pub async fn user_orgs(
    store: &dyn DocumentStore,
    user_id: &str,
) -> StoreResult<Vec<OrganizationWithMembers>> {
    let memberships = Membership::list_for_user(store, user_id).await?;

    let orgs = join_all(
        memberships
            .iter()
            .map(|membership| Organization::with_members(store, &membership.org_id)),
    )
    .await;

    Ok(memberships
        .iter()
        .zip(orgs)
        .filter_map(|(membership, org)| match org {
            Ok(Some(org)) => Some(org),
            Ok(None) => {
                tracing::debug!(org_id = %membership.org_id, "Organization not found");
                None
            }
            Err(e) => {
                tracing::warn!(org_id = %membership.org_id, error = %e, "Failed to load organization");
                None
            }
        })
        .collect())
}

/// Tasks in an organization the user created or is assigned to
pub async fn user_org_tasks(
    store: &dyn DocumentStore,
    user_id: &str,
    org_id: &str,
) -> StoreResult<Vec<TaskWithRelation>> {
    let tasks = Task::list_for_user_in_org(store, org_id, user_id).await?;
    Ok(tasks
        .into_iter()
        .map(|task| TaskWithRelation::for_viewer(task, user_id))
        .collect())
}

/// Live member list of an organization
///
/// An empty `org_id` delivers one empty list and starts nothing.
pub fn watch_org_members<F>(store: Arc<dyn DocumentStore>, org_id: &str, mut callback: F) -> Subscription
where
    F: FnMut(Vec<OrgMember>) + Send + 'static,
{
    if org_id.is_empty() {
        callback(Vec::new());
        return Subscription::inert();
    }

    let org_id = Arc::<str>::from(org_id);
    watch(
        store,
        WatchTarget::Collection(Collection::Memberships),
        move |store| {
            let org_id = Arc::clone(&org_id);
            async move { org_members(store.as_ref(), &org_id).await }
        },
        callback,
    )
}

/// Live list of a user's organizations
///
/// An empty `user_id` starts nothing and delivers nothing.
pub fn watch_user_orgs<F>(store: Arc<dyn DocumentStore>, user_id: &str, callback: F) -> Subscription
where
    F: FnMut(Vec<OrganizationWithMembers>) + Send + 'static,
{
    if user_id.is_empty() {
        return Subscription::inert();
    }

    let user_id = Arc::<str>::from(user_id);
    watch(
        store,
        WatchTarget::Collection(Collection::Memberships),
        move |store| {
            let user_id = Arc::clone(&user_id);
            async move { user_orgs(store.as_ref(), &user_id).await }
        },
        callback,
    )
}

/// Live view of one organization with its memberships
///
/// The callback gets `None` while the organization does not exist.
pub fn watch_org<F>(store: Arc<dyn DocumentStore>, org_id: &str, mut callback: F) -> Subscription
where
    F: FnMut(Option<OrganizationWithMembers>) + Send + 'static,
{
    if org_id.is_empty() {
        return Subscription::inert();
    }

    let org_id = Arc::<str>::from(org_id);
    watch(
        store,
        WatchTarget::Document(Collection::Orgs, org_id.to_string()),
        move |store| {
            let org_id = Arc::clone(&org_id);
            async move {
                let org = Organization::with_members(store.as_ref(), &org_id).await?;
                Ok::<_, StoreError>(org.into_iter().collect::<Vec<_>>())
            }
        },
        move |orgs| callback(orgs.into_iter().next()),
    )
}

/// Live task list of a user within an organization, annotated with `relation`
///
/// Either id empty: starts nothing and delivers nothing.
pub fn watch_user_org_tasks<F>(
    store: Arc<dyn DocumentStore>,
    user_id: &str,
    org_id: &str,
    callback: F,
) -> Subscription
where
    F: FnMut(Vec<TaskWithRelation>) + Send + 'static,
{
    if user_id.is_empty() || org_id.is_empty() {
        return Subscription::inert();
    }

    let user_id = Arc::<str>::from(user_id);
    let org_id = Arc::<str>::from(org_id);
    watch(
        store,
        WatchTarget::Collection(Collection::Tasks),
        move |store| {
            let user_id = Arc::clone(&user_id);
            let org_id = Arc::clone(&org_id);
            async move { user_org_tasks(store.as_ref(), &user_id, &org_id).await }
        },
        callback,
    )
}
