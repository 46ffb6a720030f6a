// ABOUTME: Route definitions for the configserver HTTP API.
// ABOUTME: Assembles actuator and environment routes behind the Basic auth and tracing layers.

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::app_state::SharedState;
use crate::auth::{BasicAuthLayer, Credentials};

/// Build the complete Axum router with all routes, the authorization policy, and shared state.
pub fn create_router(state: SharedState, credentials: Credentials) -> Router {
    Router::new()
        .route("/actuator/health", get(api::actuator::health))
        .route("/actuator/info", get(api::actuator::info))
        .route(
            "/{application}/{profiles}",
            get(api::environment::get_environment),
        )
        .route(
            "/{application}/{profiles}/{label}",
            get(api::environment::get_environment_with_label),
        )
        // Explicit fallback so unknown paths also pass through the auth layer.
        .fallback(not_found)
        .layer(BasicAuthLayer::new(credentials))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> (StatusCode, axum::Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        axum::Json(serde_json::json!({ "error": "not found" })),
    )
}
