//! Flashcard carousel routes.

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
use studydeck_core::{FlashcardsTool, FlashcardsView, NavRequest};
use uuid::Uuid;

async fn mount(state: &AppState, user_id: Uuid, session_id: Uuid) -> Result<Arc<FlashcardsTool>, ApiError> {
    let session = owned_session(state, user_id, session_id).await?;
    let tool = FlashcardsTool::mount(
        state.tool_store(),
        state.assistant.clone(),
        user_id,
        session_id,
        session.study_aids.flashcards,
        state.config.timings(),
    )
    .await;
    Ok(state.tools.insert_flashcards(user_id, session_id, tool))
}

async fn mounted(state: &AppState, user_id: Uuid, session_id: Uuid) -> Result<Arc<FlashcardsTool>, ApiError> {
    match state.tools.flashcards(user_id, session_id) {
        Some(tool) => Ok(tool),
        None => mount(state, user_id, session_id).await,
    }
}

/// Open the deck at the saved card.
pub async fn open(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FlashcardsView>, ApiError> {
    let tool = mount(&state, auth.user.id, id).await?;
    Ok(Json(tool.view()))
}

pub async fn view(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FlashcardsView>, ApiError> {
    let tool = mounted(&state, auth.user.id, id).await?;
    Ok(Json(tool.view()))
}

pub async fn navigate(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<NavRequest>,
) -> Result<Json<FlashcardsView>, ApiError> {
    let tool = mounted(&state, auth.user.id, id).await?;
    tool.navigate(req).map(Json).map_err(api_error)
}

pub async fn flip(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<FlashcardsView>, ApiError> {
    let tool = mounted(&state, auth.user.id, id).await?;
    tool.flip().map(Json).map_err(api_error)
}

#[derive(Deserialize)]
pub struct TranslateRequest {
    #[serde(default)]
    pub language: String,
}

/// Translate the deck, or restore the original with an empty language.
pub async fn translate(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<TranslateRequest>,
) -> Result<Json<FlashcardsView>, ApiError> {
    let tool = mounted(&state, auth.user.id, id).await?;
    tool.translate(&req.language).await.map(Json).map_err(api_error)
}
