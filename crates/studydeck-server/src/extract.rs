//! Request extractors.

use crate::state::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
};
use std::sync::Arc;
use studydeck_types::User;

/// The signed-in user, resolved from a `Bearer` token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())?;

    auth_header
        .strip_prefix("Bearer ")
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = (StatusCode, String);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_token(&parts.headers).ok_or((
            StatusCode::UNAUTHORIZED,
            "Missing bearer token".to_string(),
        ))?;

        let auth = state.auth.clone();
        let lookup = token.clone();
        let user = crate::routes::blocking(move || auth.current_user(&lookup))
            .await?
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Invalid or expired token".to_string(),
            ))?;

        Ok(Self { user, token })
    }
}
