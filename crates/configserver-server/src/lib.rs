// ABOUTME: HTTP server for configserver: environment API, actuator checks, Basic auth, and TLS.
// ABOUTME: Uses Axum with a tower auth layer; the keystore location is passed in explicitly.

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod routes;
pub mod serve;
pub mod tls;

pub use app_state::{AppState, SharedState};
pub use auth::{BasicAuthLayer, Credentials};
pub use config::{ConfigError, ServerConfig};
pub use routes::create_router;
pub use serve::{resolve_keystore, serve};
pub use tls::{TlsError, load_keystore};
