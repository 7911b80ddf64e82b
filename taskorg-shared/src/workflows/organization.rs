//! Organization creation
//!
//! Creation is idempotent by name: asking for an organization that already
//! exists returns the stored record untouched and makes no policy calls.

use super::{
    is_blank, membership::create_membership, require_permission, SyncReport, WorkflowError,
    WorkflowOutcome, WorkflowResult,
};
use crate::models::membership::{CreateMembership, MembershipStatus};
use crate::models::organization::Organization;
use crate::policy::{actions, resources, roles, PolicyClient, ResourceInstance, ResourceRef, RoleAssignment};
use crate::store::DocumentStore;
use serde::{Deserialize, Serialize};

pub const INVALID_NAME: &str = "Invalid organization name";
pub const ALREADY_EXISTS: &str = "Organization already exists";
pub const CREATED: &str = "Organization created successfully";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrganization {
    pub name: String,
    /// Requesting user
    pub user_id: String,
}

/// Stored organization plus whether this call created it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrganizationCreated {
    pub organization: Organization,
    pub created: bool,
}

/// Creates an organization and makes the requester its admin
///
/// 1. `check(user, "create", "Organization")`
/// 2. name must be non-blank
/// 3. same name exists: return it, "Organization already exists"
/// 4. write the record under a generated id
/// 5. register `Organization:<id>` with the policy service
/// 6. assign the requester `admin` on `Organization:<id>`
pub async fn create_organization(
    store: &dyn DocumentStore,
    policy: &dyn PolicyClient,
    input: CreateOrganization,
) -> WorkflowResult<OrganizationCreated> {
    require_permission(
        policy,
        &input.user_id,
        actions::CREATE,
        &ResourceRef::kind(resources::ORGANIZATION),
    )
    .await?;

    if is_blank(&input.name) {
        return Err(WorkflowError::InvalidInput(INVALID_NAME.to_string()));
    }
    let name = input.name.trim();

    if let Some(existing) = Organization::find_by_name(store, name).await? {
        tracing::info!(org_id = %existing.id, name, "Organization already exists");
        return Ok(WorkflowOutcome::new(
            ALREADY_EXISTS,
            OrganizationCreated {
                organization: existing,
                created: false,
            },
        ));
    }

    let organization = Organization::create(store, name, &input.user_id).await?;
    let resource = ResourceRef::organization(&organization.id);
    tracing::info!(org_id = %organization.id, name, user_id = %input.user_id, "Organization created");

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
        policy.assign_role(RoleAssignment::scoped(&input.user_id, roles::ADMIN, &resource)),
    )
    .await;

    Ok(WorkflowOutcome::new(
        CREATED,
        OrganizationCreated {
            organization,
            created: true,
        },
    )
    .with_sync(sync))
}

/// Creates an organization and, when it is new, an active membership for
/// the creator
///
/// The two writes are not atomic: if the membership step fails the
/// organization stays in place and the error is returned.
pub async fn create_organization_with_creator(
    store: &dyn DocumentStore,
    policy: &dyn PolicyClient,
    input: CreateOrganization,
) -> WorkflowResult<OrganizationCreated> {
    let user_id = input.user_id.clone();
    let mut outcome = create_organization(store, policy, input).await?;
    if !outcome.value.created {
        return Ok(outcome);
    }

    let membership = create_membership(
        store,
        policy,
        CreateMembership {
            org_id: outcome.value.organization.id.clone(),
            user_id: user_id.clone(),
            invited_by: user_id,
            status: MembershipStatus::Active,
            role: Some(roles::ADMIN.to_string()),
        },
    )
    .await?;

    outcome.sync.absorb(membership.sync);
    Ok(outcome)
}
