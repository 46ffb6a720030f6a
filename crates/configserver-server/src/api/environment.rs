// ABOUTME: Environment lookup handlers serving flattened YAML property sources.
// ABOUTME: Maps repository errors onto 400 for bad names and 500 for unreadable files.

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use configserver_core::RepositoryError;

use crate::app_state::SharedState;

/// GET /{application}/{profiles} - Environment for the default label.
pub async fn get_environment(
    State(state): State<SharedState>,
    Path((application, profiles)): Path<(String, String)>,
) -> Response {
    lookup(&state, &application, &profiles, None)
}

/// GET /{application}/{profiles}/{label} - Environment for an explicit label.
pub async fn get_environment_with_label(
    State(state): State<SharedState>,
    Path((application, profiles, label)): Path<(String, String, String)>,
) -> Response {
    lookup(&state, &application, &profiles, Some(&label))
}

fn lookup(state: &SharedState, application: &str, profiles: &str, label: Option<&str>) -> Response {
    match state.repository.find(application, profiles, label) {
        Ok(env) => Json(env).into_response(),
        Err(err @ RepositoryError::InvalidName(_)) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": err.to_string() })),
        )
            .into_response(),
        Err(err) => {
            tracing::error!(
                "failed to resolve environment for {}/{}: {}",
                application,
                profiles,
                err
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": err.to_string() })),
            )
                .into_response()
        }
    }
}
