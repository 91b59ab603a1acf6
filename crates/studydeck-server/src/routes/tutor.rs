//! Tutor chat routes.

use super::sessions::owned_session;
use super::{api_error, ApiError};
use crate::extract::AuthUser;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;
use studydeck_core::{TutorTool, TutorView};
use tokio::sync::Mutex;
use uuid::Uuid;

async fn mount(state: &AppState, user_id: Uuid, session_id: Uuid) -> Result<Arc<Mutex<TutorTool>>, ApiError> {
    let session = owned_session(state, user_id, session_id).await?;
    let tool = TutorTool::mount(
        state.tool_store(),
        state.assistant.clone(),
        user_id,
        session_id,
        session.tutor_context().to_string(),
    )
    .await;
    Ok(state.tools.insert_tutor(user_id, session_id, tool))
}

async fn mounted(state: &AppState, user_id: Uuid, session_id: Uuid) -> Result<Arc<Mutex<TutorTool>>, ApiError> {
    match state.tools.tutor(user_id, session_id) {
        Some(tool) => Ok(tool),
        None => mount(state, user_id, session_id).await,
    }
}

pub async fn open(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TutorView>, ApiError> {
    let tool = mount(&state, auth.user.id, id).await?;
    let view = tool.lock().await.view();
    Ok(Json(view))
}

pub async fn view(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TutorView>, ApiError> {
    let tool = mounted(&state, auth.user.id, id).await?;
    let view = tool.lock().await.view();
    Ok(Json(view))
}

#[derive(Deserialize)]
pub struct SendRequest {
    pub text: String,
}

pub async fn send(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SendRequest>,
) -> Result<Json<TutorView>, ApiError> {
    let tool = mounted(&state, auth.user.id, id).await?;
    let view = tool.lock().await.send(&req.text).await.map_err(api_error)?;
    Ok(Json(view))
}
