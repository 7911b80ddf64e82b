//! Organization endpoints
//!
//! - `POST /v1/orgs` - Create an organization; the creator becomes its admin
//!   and an active member
//! - `GET /v1/orgs/:org_id/access?user=` - Whether a user may read it

use super::ApiResponse;
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use taskorg_shared::models::organization::Organization;
use taskorg_shared::workflows::organization::{
    create_organization_with_creator, CreateOrganization, INVALID_NAME,
};
use taskorg_shared::workflows::user::check_organization_access;
use validator::{Validate, ValidationError};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrgRequest {
    #[validate(
        length(min = 3, max = 20, message = "Must be between 3 and 20 characters"),
        custom(function = "alphanumeric")
    )]
    pub name: String,

    /// Requesting user
    pub user_id: String,
}

#[derive(Debug, Serialize)]
pub struct OrgBody {
    pub org: Organization,
    /// False when an organization with this name already existed
    pub created: bool,
}

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    pub user: String,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub success: bool,
    pub allowed: bool,
}

fn alphanumeric(name: &str) -> Result<(), ValidationError> {
    if name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Ok(());
    }
    let mut err = ValidationError::new("alphanumeric");
    err.message = Some("Only alphanumeric characters are allowed".into());
    Err(err)
}

/// Create-organization endpoint
///
/// ```text
/// POST /v1/orgs
///
/// { "name": "Acme", "userId": "u1" }
/// ```
///
/// Asking for a name that already exists returns that organization with
/// "Organization already exists" and `created: false`.
pub async fn create_org(
    State(state): State<AppState>,
    payload: Result<Json<CreateOrgRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<OrgBody>>> {
    let Json(req) = payload.map_err(|e| ApiError::invalid_body(INVALID_NAME, e))?;
    req.validate()?;

    let outcome = create_organization_with_creator(
        state.store.as_ref(),
        state.policy.as_ref(),
        CreateOrganization {
            name: req.name,
            user_id: req.user_id,
        },
    )
    .await
    .map_err(|e| ApiError::workflow(e, "Failed to create organization"))?;

    Ok(Json(ApiResponse::from_outcome(outcome, |created| OrgBody {
        org: created.organization,
        created: created.created,
    })))
}

pub async fn check_access(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    Query(query): Query<AccessQuery>,
) -> ApiResult<Json<AccessResponse>> {
    let allowed = check_organization_access(state.policy.as_ref(), &query.user, &org_id)
        .await
        .map_err(|e| ApiError::workflow(e, "Failed to check organization access"))?;

    Ok(Json(AccessResponse {
        success: true,
        allowed,
    }))
}
