//! User endpoints
//!
//! - `POST /v1/users` - Record a signed-in identity (first sign-in creates it)
//! - `GET /v1/users/by-email?email=` - Look a user up by email

use super::ApiResponse;
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use taskorg_shared::models::user::{NewUser, User};
use taskorg_shared::workflows::user;
use validator::Validate;

/// Identity claims sent after signing in with the identity provider
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub uid: String,

    #[validate(length(max = 100, message = "Name must be at most 100 characters"))]
    pub display_name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct UserBody {
    pub user: User,
}

/// Sign-in endpoint
///
/// ```text
/// POST /v1/users
///
/// { "uid": "u1", "displayName": "Ada", "email": "ada@example.com", "photoURL": null }
/// ```
///
/// Returns "User created successfully" the first time and "User already
/// exists" afterwards, both with the stored user.
pub async fn sign_in(
    State(state): State<AppState>,
    payload: Result<Json<SignInRequest>, JsonRejection>,
) -> ApiResult<Json<ApiResponse<UserBody>>> {
    let Json(req) = payload.map_err(|e| ApiError::invalid_body(user::INVALID_CREDENTIALS, e))?;
    req.validate()?;

    let outcome = user::sign_in(
        state.store.as_ref(),
        state.policy.as_ref(),
        NewUser {
            uid: req.uid,
            display_name: req.display_name,
            email: req.email,
            photo_url: req.photo_url,
        },
    )
    .await
    .map_err(|e| ApiError::workflow(e, "Failed to create user"))?;

    Ok(Json(ApiResponse::from_outcome(outcome, |user| UserBody { user })))
}

pub async fn find_by_email(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> ApiResult<Json<ApiResponse<UserBody>>> {
    let outcome = user::find_user_by_email(state.store.as_ref(), &query.email)
        .await
        .map_err(|e| ApiError::workflow(e, "Failed to fetch user"))?;

    Ok(Json(ApiResponse::from_outcome(outcome, |user| UserBody { user })))
}
