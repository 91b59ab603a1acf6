//! Quiz tool routes.

use super::sessions::owned_session;
use super::{api_error, ApiError};
use crate::extract::AuthUser;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use studydeck_core::{QuizTool, QuizView};
use studydeck_types::QuizResult;
use tokio::sync::Mutex;
use uuid::Uuid;

async fn mount(state: &AppState, user_id: Uuid, session_id: Uuid) -> Result<Arc<Mutex<QuizTool>>, ApiError> {
    let session = owned_session(state, user_id, session_id).await?;
    let tool = QuizTool::mount(
        state.tool_store(),
        user_id,
        session_id,
        session.study_aids.quiz,
        state.config.timings(),
    )
    .await;
    Ok(state.tools.insert_quiz(user_id, session_id, tool))
}

async fn mounted(state: &AppState, user_id: Uuid, session_id: Uuid) -> Result<Arc<Mutex<QuizTool>>, ApiError> {
    match state.tools.quiz(user_id, session_id) {
        Some(tool) => Ok(tool),
        None => mount(state, user_id, session_id).await,
    }
}

/// Open the quiz, resuming any saved progress.
pub async fn open(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizView>, ApiError> {
    let tool = mount(&state, auth.user.id, id).await?;
    let view = tool.lock().await.view();
    Ok(Json(view))
}

pub async fn view(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizView>, ApiError> {
    let tool = mounted(&state, auth.user.id, id).await?;
    let view = tool.lock().await.view();
    Ok(Json(view))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_index: usize,
    pub option: String,
}

pub async fn answer(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<QuizView>, ApiError> {
    let tool = mounted(&state, auth.user.id, id).await?;
    let view = tool
        .lock()
        .await
        .select_answer(req.question_index, req.option)
        .map_err(api_error)?;
    Ok(Json(view))
}

pub async fn next(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizView>, ApiError> {
    let tool = mounted(&state, auth.user.id, id).await?;
    let view = tool.lock().await.next().map_err(api_error)?;
    Ok(Json(view))
}

pub async fn previous(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizView>, ApiError> {
    let tool = mounted(&state, auth.user.id, id).await?;
    let view = tool.lock().await.previous().map_err(api_error)?;
    Ok(Json(view))
}

#[derive(Serialize)]
pub struct SubmitResponse {
    pub result: QuizResult,
    pub quiz: QuizView,
}

/// Score the attempt and add it to the session's quiz history.
///
/// The attempt is only marked submitted once the result is stored.
pub async fn submit(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<SubmitResponse>, ApiError> {
    let tool = mounted(&state, auth.user.id, id).await?;
    let mut tool = tool.lock().await;
    let store = state.store.clone();
    let result = tool
        .submit_with(|result| async move {
            store
                .call(move |store| store.add_quiz_result(id, &result))
                .await
        })
        .await
        .map_err(api_error)?;

    Ok(Json(SubmitResponse {
        result,
        quiz: tool.view(),
    }))
}

pub async fn restart(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<QuizView>, ApiError> {
    let tool = mounted(&state, auth.user.id, id).await?;
    let view = tool.lock().await.restart();
    Ok(Json(view))
}
