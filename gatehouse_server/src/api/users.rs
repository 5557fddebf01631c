//! User administration handlers. Admin only.

use axum::{Extension, Json, extract::State};
use gatehouse::{Principal, User};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    AppState,
    error::ApiResult,
    extract::{JsonBody, PathId},
};
use crate::logging::log_security_event;

#[derive(Debug, Deserialize)]
pub struct RolePayload {
    pub role: String,
}

/// All users, soft-deleted included
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<User>>> {
    Ok(Json(state.accounts.list_users().await?))
}

pub async fn get_user(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> ApiResult<Json<User>> {
    Ok(Json(state.accounts.get_user(id).await?))
}

/// Change a user's role. Unknown role names are a 400.
pub async fn update_role(
    State(state): State<AppState>,
    Extension(caller): Extension<Principal>,
    PathId(id): PathId,
    JsonBody(payload): JsonBody<RolePayload>,
) -> ApiResult<Json<User>> {
    let user = state.accounts.update_role(id, &payload.role).await?;
    tracing::info!(admin = %caller.id, user = %id, role = %user.role, "Role updated");
    Ok(Json(user))
}

/// Soft-delete a user and revoke all their tokens
pub async fn deactivate_user(
    State(state): State<AppState>,
    Extension(caller): Extension<Principal>,
    PathId(id): PathId,
) -> ApiResult<Json<Value>> {
    state.accounts.deactivate(id).await?;
    log_security_event(
        "user_deactivated",
        Some(&id.to_string()),
        &format!("Deactivated by admin {}", caller.id),
    );
    Ok(Json(json!({ "message": "User deactivated (soft deleted)" })))
}
