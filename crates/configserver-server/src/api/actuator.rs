// ABOUTME: Actuator handlers for health and info checks used by load balancers.
// ABOUTME: Both endpoints are exempt from authentication in the auth layer.

use axum::Json;
use axum::extract::State;

use crate::app_state::SharedState;

/// GET /actuator/health - Liveness check.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "UP" }))
}

/// GET /actuator/info - Application name, version, and whether TLS is on.
pub async fn info(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "app": {
            "name": state.app_name,
            "version": env!("CARGO_PKG_VERSION"),
        },
        "tls": state.tls_enabled,
    }))
}
