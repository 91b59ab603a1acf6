//! Raw tool-state rows, for clients that drive the tools themselves.

use super::sessions::owned_session;
use super::{api_error, ApiError};
use crate::extract::AuthUser;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use studydeck_core::ToolStateStore;
use studydeck_types::{ToolKey, ToolKind};
use tracing::debug;
use uuid::Uuid;

#[derive(Serialize)]
pub struct ToolStateResponse {
    pub state: Option<Value>,
}

async fn owned_key(
    state: &AppState,
    auth: &AuthUser,
    session_id: Uuid,
    tool: ToolKind,
) -> Result<ToolKey, ApiError> {
    owned_session(state, auth.user.id, session_id).await?;
    Ok(ToolKey::new(auth.user.id, session_id, tool))
}

pub async fn load(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, tool)): Path<(Uuid, ToolKind)>,
) -> Result<Json<ToolStateResponse>, ApiError> {
    let key = owned_key(&state, &auth, id, tool).await?;
    let saved = state
        .store
        .call(move |store| ToolStateStore::load(store, &key))
        .await
        .map_err(api_error)?;
    Ok(Json(ToolStateResponse { state: saved }))
}

pub async fn save(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, tool)): Path<(Uuid, ToolKind)>,
    Json(body): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let key = owned_key(&state, &auth, id, tool).await?;
    state
        .store
        .call(move |store| ToolStateStore::save(store, &key, &body))
        .await
        .map_err(api_error)?;
    debug!(target: "studydeck::api", "Stored raw tool state for {}", key);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn clear(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path((id, tool)): Path<(Uuid, ToolKind)>,
) -> Result<StatusCode, ApiError> {
    let key = owned_key(&state, &auth, id, tool).await?;
    state
        .store
        .call(move |store| ToolStateStore::clear(store, &key))
        .await
        .map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}
