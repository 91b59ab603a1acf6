//! Studydeck server library - HTTP API for AI-generated study aids.
//!
//! This library provides the HTTP routes, mounted tool runtime, and application
//! state for the Studydeck server. It's separated from main.rs to enable
//! integration testing.

pub mod config;
pub mod extract;
pub mod logging;
pub mod routes;
pub mod runtime;
pub mod state;

use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// The full application: API under `/api`, static frontend everywhere else.
pub fn app(state: Arc<AppState>) -> Router {
    let static_dir = state.config.static_dir.clone();

    Router::new()
        .nest("/api", routes::api_router())
        .fallback_service(ServeDir::new(static_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
