//! Membership endpoint
//!
//! `POST /v1/orgs/:org_id/members` adds a user to an organization, named
//! either by `userId` or by `email`. When both are given `userId` wins.
//! `role` applies either way.

use super::ApiResponse;
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use taskorg_shared::models::membership::{CreateMembership, Membership, MembershipStatus};
use taskorg_shared::workflows::membership::{create_membership, invite_member_by_email, INVALID_DATA};
use validator::Validate;

const FAILED: &str = "Failed to create membership";

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddMemberRequest {
    pub user_id: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub invited_by: String,

    /// Defaults to `invited`
    #[serde(default)]
    pub status: MembershipStatus,

    /// Label shown in member lists
    pub role: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MembershipBody {
    pub membership: Membership,
}

/// Add-member endpoint
///
/// ```text
/// POST /v1/orgs/acme/members
///
/// { "email": "bob@example.com", "invitedBy": "u1" }
/// ```
///
/// # Errors
///
/// - `400`: neither `userId` nor `email` given, or the body is unreadable
/// - `404`: unknown user or organization
/// - `409`: already a member
pub async fn add_member(
    State(state): State<AppState>,
    Path(org_id): Path<String>,
    payload: Result<Json<AddMemberRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<MembershipBody>>> {
    let Json(req) = payload.map_err(|e| ApiError::invalid_body(INVALID_DATA, e))?;
    req.validate()?;

    let outcome = match (req.user_id, req.email) {
        (Some(user_id), _) => {
            create_membership(
                state.store.as_ref(),
                state.policy.as_ref(),
                CreateMembership {
                    org_id,
                    user_id,
                    invited_by: req.invited_by,
                    status: req.status,
                    role: req.role,
                },
            )
            .await
        }
        (None, Some(email)) => {
            invite_member_by_email(
                state.store.as_ref(),
                state.policy.as_ref(),
                &org_id,
                &email,
                &req.invited_by,
                req.status,
                req.role,
            )
            .await
        }
        (None, None) => return Err(ApiError::BadRequest(INVALID_DATA.to_string())),
    }
    .map_err(|e| ApiError::workflow(e, FAILED))?;

    Ok(Json(ApiResponse::from_outcome(outcome, |membership| {
        MembershipBody { membership }
    })))
}
