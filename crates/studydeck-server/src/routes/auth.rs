//! Account routes.

use super::{blocking, ApiError};
use crate::extract::AuthUser;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use std::sync::Arc;
use studydeck_core::AuthSession;
use studydeck_types::User;
use tracing::info;

#[derive(Deserialize)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Create an account and sign straight into it.
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<AuthSession>), ApiError> {
    let auth = state.auth.clone();
    let session = blocking(move || {
        auth.sign_up(&req.email, &req.password, &req.name)?;
        auth.sign_in_with_password(&req.email, &req.password)
    })
    .await?;

    info!(target: "studydeck::auth", "New account {}", session.user.id);
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<AuthSession>, ApiError> {
    let auth = state.auth.clone();
    let session = blocking(move || auth.sign_in_with_password(&req.email, &req.password)).await?;

    Ok(Json(session))
}

pub async fn logout(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<StatusCode, ApiError> {
    let service = state.auth.clone();
    blocking(move || service.sign_out(&auth.token)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(auth: AuthUser) -> Json<User> {
    Json(auth.user)
}
