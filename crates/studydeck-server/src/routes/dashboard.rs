//! Dashboard and free-text translation routes.

use super::{api_error, ApiError};
use crate::extract::AuthUser;
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use studydeck_core::{Dashboard, StudyError};

pub async fn get(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<Dashboard>, ApiError> {
    let user_id = auth.user.id;
    let sessions = state
        .store
        .call(move |store| store.list_sessions(user_id))
        .await
        .map_err(api_error)?;
    Ok(Json(Dashboard::build(&sessions, Utc::now().date_naive())))
}

#[derive(Deserialize)]
pub struct TranslateRequest {
    pub text: String,
    pub language: String,
}

#[derive(Serialize)]
pub struct TranslateResponse {
    pub text: String,
}

pub async fn translate(
    State(state): State<Arc<AppState>>,
    _auth: AuthUser,
    Json(req): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    if req.text.trim().is_empty() || req.language.trim().is_empty() {
        return Err(api_error(StudyError::Validation(
            "Text and language are required".into(),
        )));
    }

    let text = state
        .assistant
        .translate_text(&req.text, req.language.trim())
        .await
        .map_err(api_error)?;
    Ok(Json(TranslateResponse { text }))
}
