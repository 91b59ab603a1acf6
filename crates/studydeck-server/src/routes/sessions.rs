//! Study session routes.

use super::{api_error, ApiError};
use crate::extract::AuthUser;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use studydeck_core::{create_session, GenerateRequest, StudyError};
use studydeck_types::{QuizResult, StudySession};
use tracing::info;
use uuid::Uuid;

/// Fetch a session owned by the caller, or 404.
pub(crate) async fn owned_session(
    state: &AppState,
    user_id: Uuid,
    session_id: Uuid,
) -> Result<StudySession, ApiError> {
    state
        .store
        .call(move |store| store.get_session(user_id, session_id))
        .await
        .map_err(api_error)?
        .ok_or_else(|| api_error(StudyError::SessionNotFound(session_id)))
}

#[derive(Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<StudySession>,
}

pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<SessionListResponse>, ApiError> {
    let user_id = auth.user.id;
    let sessions = state
        .store
        .call(move |store| store.list_sessions(user_id))
        .await
        .map_err(api_error)?;
    Ok(Json(SessionListResponse { sessions }))
}

/// Generate study aids from the submitted material and save them.
pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(req): Json<GenerateRequest>,
) -> Result<(StatusCode, Json<StudySession>), ApiError> {
    let session = create_session(&state.store, state.assistant.as_ref(), auth.user.id, req)
        .await
        .map_err(api_error)?;

    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn get(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<StudySession>, ApiError> {
    owned_session(&state, auth.user.id, id).await.map(Json)
}

#[derive(Deserialize)]
pub struct QuizResultRequest {
    pub score: u32,
    pub total: u32,
}

pub async fn add_quiz_result(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<QuizResultRequest>,
) -> Result<(StatusCode, Json<QuizResult>), ApiError> {
    if req.total == 0 || req.score > req.total {
        return Err(api_error(StudyError::Validation(format!(
            "Invalid quiz score {}/{}",
            req.score, req.total
        ))));
    }
    owned_session(&state, auth.user.id, id).await?;

    let result = QuizResult {
        score: req.score,
        total: req.total,
        date: Utc::now(),
    };
    let stored = result.clone();
    state
        .store
        .call(move |store| store.add_quiz_result(id, &stored))
        .await
        .map_err(api_error)?;

    info!(target: "studydeck::api", "Recorded quiz result {}/{} for session {}", result.score, result.total, id);
    Ok((StatusCode::CREATED, Json(result)))
}
