//! Policy service proxy
//!
//! Thin pass-through endpoints over the [`PolicyClient`] used by front ends
//! that cannot hold the Permit token themselves.
//!
//! | endpoint | body |
//! |---|---|
//! | `POST /permit/check` | `{user, action, resource, context?}` |
//! | `POST /permit/assign-role` | `{role, user, resource_type?, resource_instance?, tenant?}` |
//! | `POST /permit/create-relationship` | `{subject, relation, object}` |
//! | `POST /permit/create-resource-instance` | `{key, resource, tenant?}` |
//! | `GET /permit/list-resources` | – |
//! | `POST /permit/sync-user` | `{key, email?, first_name?, last_name?, attributes?}` |
//!
//! `check` answers with a bare JSON boolean; the others with
//! `{success, message, data}` where `data` is the service's own response.
//! Any failure, including a body that does not parse, is a plain-text 500.
//!
//! [`PolicyClient`]: taskorg_shared::policy::PolicyClient

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use taskorg_shared::policy::{RelationshipTuple, ResourceInstance, ResourceRef, RoleAssignment, SyncUser};

/// Permission check request
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub user: String,
    pub action: String,
    /// `Type` or `Type:key`
    pub resource: String,
    #[serde(default)]
    pub context: Option<JsonValue>,
}

const FAILED_CHECK: &str = "Failed to check user permission:";
const FAILED_ASSIGN: &str = "Failed to assign role";
const FAILED_RELATIONSHIP: &str = "Failed to create resource relationship";
const FAILED_INSTANCE: &str = "Failed to create resource instance";
const FAILED_SYNC: &str = "Failed to sync user:";

/// Reads the JSON body or fails the way the call itself would
fn body<T>(payload: Result<Json<T>, JsonRejection>, failed: &str) -> ApiResult<T> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::upstream(failed, e.body_text()))
}

/// Proxy success body
#[derive(Debug, Serialize, Deserialize)]
pub struct ProxyResponse {
    pub success: bool,
    pub message: String,
    pub data: JsonValue,
}

impl ProxyResponse {
    fn ok(message: &str, data: JsonValue) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
            data,
        })
    }
}

pub async fn check(
    State(state): State<AppState>,
    payload: Result<Json<CheckRequest>, JsonRejection>,
) -> ApiResult<Json<bool>> {
    let req = body(payload, FAILED_CHECK)?;
    tracing::debug!(user = %req.user, action = %req.action, resource = %req.resource, "Checking permission");

    let resource = ResourceRef::parse(&req.resource).map_err(|e| ApiError::upstream(FAILED_CHECK, e))?;
    let allowed = state
        .policy
        .check(&req.user, &req.action, &resource, req.context)
        .await
        .map_err(|e| ApiError::upstream(FAILED_CHECK, e))?;

    Ok(Json(allowed))
}

pub async fn assign_role(
    State(state): State<AppState>,
    payload: Result<Json<RoleAssignment>, JsonRejection>,
) -> ApiResult<Json<ProxyResponse>> {
    let assignment = body(payload, FAILED_ASSIGN)?;
    tracing::debug!(user = %assignment.user, role = %assignment.role, "Assigning role");

    let data = state
        .policy
        .assign_role(assignment)
        .await
        .map_err(|e| ApiError::upstream(FAILED_ASSIGN, e))?;

    Ok(ProxyResponse::ok("Role assigned successfully", data))
}

pub async fn create_relationship(
    State(state): State<AppState>,
    payload: Result<Json<RelationshipTuple>, JsonRejection>,
) -> ApiResult<Json<ProxyResponse>> {
    let tuple = body(payload, FAILED_RELATIONSHIP)?;
    tracing::debug!(subject = %tuple.subject, relation = %tuple.relation, object = %tuple.object, "Creating relationship");

    let data = state
        .policy
        .create_relationship(tuple)
        .await
        .map_err(|e| ApiError::upstream(FAILED_RELATIONSHIP, e))?;

    Ok(ProxyResponse::ok("Resource relationship created successfully", data))
}

pub async fn create_resource_instance(
    State(state): State<AppState>,
    payload: Result<Json<ResourceInstance>, JsonRejection>,
) -> ApiResult<Json<ProxyResponse>> {
    let instance = body(payload, FAILED_INSTANCE)?;
    tracing::debug!(key = %instance.key, resource = %instance.resource, "Creating resource instance");

    let data = state
        .policy
        .create_resource_instance(instance)
        .await
        .map_err(|e| ApiError::upstream(FAILED_INSTANCE, e))?;

    Ok(ProxyResponse::ok("Resource instance created successfully", data))
}

pub async fn list_resources(State(state): State<AppState>) -> ApiResult<Json<ProxyResponse>> {
    let data = state
        .policy
        .list_resource_instances()
        .await
        .map_err(|e| ApiError::upstream("Failed to list resources", e))?;

    Ok(ProxyResponse::ok("Resources listed successfully", data))
}

pub async fn sync_user(
    State(state): State<AppState>,
    payload: Result<Json<SyncUser>, JsonRejection>,
) -> ApiResult<Json<ProxyResponse>> {
    let user = body(payload, FAILED_SYNC)?;
    tracing::debug!(key = %user.key, "Syncing user");

    let data = state
        .policy
        .sync_user(user)
        .await
        .map_err(|e| ApiError::upstream(FAILED_SYNC, e))?;

    Ok(ProxyResponse::ok("User synced successfully", data))
}
