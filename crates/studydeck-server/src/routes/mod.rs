//! HTTP route handlers.

pub mod auth;
pub mod dashboard;
pub mod flashcards;
pub mod quiz;
pub mod sessions;
pub mod tool_state;
pub mod tutor;

use crate::state::AppState;
use axum::{
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use studydeck_core::StudyError;
use tracing::error;

/// Error response: status plus a plain-text message.
pub type ApiError = (StatusCode, String);

/// Map a core error onto an HTTP status.
pub fn api_error(e: StudyError) -> ApiError {
    let status = match &e {
        StudyError::Validation(_) => StatusCode::BAD_REQUEST,
        StudyError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        StudyError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        StudyError::EmailTaken(_) | StudyError::InvalidTransition { .. } => StatusCode::CONFLICT,
        StudyError::Ai(_) => StatusCode::BAD_GATEWAY,
        _ => {
            error!(target: "studydeck::api", "Internal error: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

/// Run blocking work (password hashing, token lookups) on the blocking pool.
///
/// Store access has its own wrapper, [`studydeck_core::StudyStore::call`].
pub(crate) async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> studydeck_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(StudyError::from)
        .and_then(|result| result)
        .map_err(api_error)
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// All API routes, to be nested under `/api`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Auth
        .route("/auth/signup", post(auth::signup))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        // Sessions
        .route("/sessions", get(sessions::list).post(sessions::create))
        .route("/sessions/{id}", get(sessions::get))
        .route("/sessions/{id}/quiz-results", post(sessions::add_quiz_result))
        // Raw tool state
        .route(
            "/sessions/{id}/tool-state/{tool}",
            get(tool_state::load)
                .put(tool_state::save)
                .delete(tool_state::clear),
        )
        // Quiz
        .route("/sessions/{id}/quiz", get(quiz::view).post(quiz::open))
        .route("/sessions/{id}/quiz/answer", post(quiz::answer))
        .route("/sessions/{id}/quiz/next", post(quiz::next))
        .route("/sessions/{id}/quiz/previous", post(quiz::previous))
        .route("/sessions/{id}/quiz/submit", post(quiz::submit))
        .route("/sessions/{id}/quiz/restart", post(quiz::restart))
        // Flashcards
        .route(
            "/sessions/{id}/flashcards",
            get(flashcards::view).post(flashcards::open),
        )
        .route("/sessions/{id}/flashcards/navigate", post(flashcards::navigate))
        .route("/sessions/{id}/flashcards/flip", post(flashcards::flip))
        .route("/sessions/{id}/flashcards/translate", post(flashcards::translate))
        // Tutor
        .route("/sessions/{id}/tutor", get(tutor::view).post(tutor::open))
        .route("/sessions/{id}/tutor/messages", post(tutor::send))
        // Other routes
        .route("/translate", post(dashboard::translate))
        .route("/dashboard", get(dashboard::get))
        .route("/health", get(health))
}
