//! Own-profile handlers.

use axum::{Extension, Json, extract::State};
use gatehouse::{Principal, User, auth::ProfileUpdate};
use serde_json::{Value, json};

use super::{AppState, error::ApiResult, extract::JsonBody};

/// The caller's user view. Never includes the password hash.
pub async fn get_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<Principal>,
) -> ApiResult<Json<User>> {
    Ok(Json(state.accounts.profile(caller.id).await?))
}

/// Update name and/or email. An email change requires re-verification.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(caller): Extension<Principal>,
    JsonBody(update): JsonBody<ProfileUpdate>,
) -> ApiResult<Json<Value>> {
    state.accounts.update_profile(caller.id, update).await?;
    Ok(Json(json!({ "message": "Profile updated" })))
}
