//! Membership creation
//!
//! Rejections are checked in a fixed order, each with its own message:
//! missing ids, an existing membership, a missing user, a missing
//! organization. No permission check precedes membership creation.

use super::{is_blank, user::find_user_by_email, SyncReport, WorkflowError, WorkflowOutcome, WorkflowResult};
use crate::models::membership::{CreateMembership, Membership, MembershipStatus};
use crate::models::organization::Organization;
use crate::models::user::User;
use crate::policy::{roles, PolicyClient, ResourceRef, RoleAssignment};
use crate::store::{DocumentStore, StoreError};

pub const INVALID_DATA: &str = "Invalid membership data";
pub const ALREADY_MEMBER: &str = "User is already a member of this organization";
pub const USER_MISSING: &str = "User does not exist";
pub const ORG_MISSING: &str = "Organization does not exist";
pub const CREATED: &str = "Membership created successfully";

/// Adds a user to an organization
///
/// On success the user is assigned `member` on `Organization:<orgId>`. A
/// failed assignment is reported in the outcome's sync report.
pub async fn create_membership(
    store: &dyn DocumentStore,
    policy: &dyn PolicyClient,
    input: CreateMembership,
) -> WorkflowResult<Membership> {
    if is_blank(&input.org_id) || is_blank(&input.user_id) {
        return Err(WorkflowError::InvalidInput(INVALID_DATA.to_string()));
    }

    if Membership::find(store, &input.org_id, &input.user_id)
        .await?
        .is_some()
    {
        tracing::info!(org_id = %input.org_id, user_id = %input.user_id, "Membership already exists");
        return Err(WorkflowError::Conflict(ALREADY_MEMBER.to_string()));
    }

    if User::find(store, &input.user_id).await?.is_none() {
        return Err(WorkflowError::NotFound(USER_MISSING.to_string()));
    }

    if Organization::find(store, &input.org_id).await?.is_none() {
        return Err(WorkflowError::NotFound(ORG_MISSING.to_string()));
    }

    let membership = match Membership::create(store, input).await {
        Ok(membership) => membership,
        // Lost a race with a concurrent invite
        Err(StoreError::AlreadyExists { .. }) => {
            return Err(WorkflowError::Conflict(ALREADY_MEMBER.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(
        org_id = %membership.org_id,
        user_id = %membership.user_id,
        status = membership.status.as_str(),
        "Membership created"
    );

    let resource = ResourceRef::organization(&membership.org_id);
    let mut sync = SyncReport::default();
    sync.run(
        "assign_role",
        format!("{}@{}", roles::MEMBER, resource),
        policy.assign_role(RoleAssignment::scoped(&membership.user_id, roles::MEMBER, &resource)),
    )
    .await;

    Ok(WorkflowOutcome::new(CREATED, membership).with_sync(sync))
}

/// Resolves `email` to a user and adds them to the organization
pub async fn invite_member_by_email(
    store: &dyn DocumentStore,
    policy: &dyn PolicyClient,
    org_id: &str,
    email: &str,
    invited_by: &str,
    status: MembershipStatus,
    role: Option<String>,
) -> WorkflowResult<Membership> {
    let user = find_user_by_email(store, email).await?.value;

    create_membership(
        store,
        policy,
        CreateMembership {
            org_id: org_id.to_string(),
            user_id: user.uid,
            invited_by: invited_by.to_string(),
            status,
            role,
        },
    )
    .await
}
