//! Content handlers.
//!
//! Reads are open to every authenticated role. Mutation routes sit behind
//! the content-author role gate, and the manager enforces ownership.

use axum::{Extension, Json, extract::State, http::StatusCode};
use gatehouse::{
    Principal,
    content::{Content, ContentPatch, ContentView},
};
use serde::Deserialize;
use serde_json::{Value, json};

use super::{
    AppState,
    error::{ApiError, ApiResult},
    extract::{JsonBody, PathId},
};

#[derive(Debug, Deserialize)]
pub struct CreateContentPayload {
    pub title: Option<String>,
    pub body: Option<String>,
}

pub async fn list_content(State(state): State<AppState>) -> ApiResult<Json<Vec<ContentView>>> {
    Ok(Json(state.content.list().await?))
}

pub async fn get_content(
    State(state): State<AppState>,
    PathId(id): PathId,
) -> ApiResult<Json<Content>> {
    Ok(Json(state.content.get(id).await?))
}

pub async fn create_content(
    State(state): State<AppState>,
    Extension(caller): Extension<Principal>,
    JsonBody(payload): JsonBody<CreateContentPayload>,
) -> ApiResult<(StatusCode, Json<Content>)> {
    let (Some(title), Some(body)) = (payload.title, payload.body) else {
        return Err(ApiError::bad_request("title and body required"));
    };

    let item = state.content.create(&caller, title, body).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn update_content(
    State(state): State<AppState>,
    Extension(caller): Extension<Principal>,
    PathId(id): PathId,
    JsonBody(patch): JsonBody<ContentPatch>,
) -> ApiResult<Json<Content>> {
    Ok(Json(state.content.update(&caller, id, patch).await?))
}

pub async fn delete_content(
    State(state): State<AppState>,
    Extension(caller): Extension<Principal>,
    PathId(id): PathId,
) -> ApiResult<Json<Value>> {
    state.content.delete(&caller, id).await?;
    Ok(Json(json!({ "message": "Content deleted" })))
}
