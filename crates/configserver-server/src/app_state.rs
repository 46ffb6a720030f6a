// ABOUTME: Shared application state for the configserver HTTP server.
// ABOUTME: Holds the property-source repository and the metadata reported by /actuator/info.

use std::path::PathBuf;
use std::sync::Arc;

use configserver_core::Repository;

/// Shared application state accessible by all Axum handlers.
pub struct AppState {
    pub repository: Repository,
    pub app_name: String,
    /// Whether the listener terminates TLS; reported by /actuator/info.
    pub tls_enabled: bool,
}

/// Type alias for the Arc-wrapped state used with Axum's State extractor.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Create state serving property files from `config_dir`.
    pub fn new(config_dir: PathBuf, app_name: impl Into<String>, tls_enabled: bool) -> Self {
        Self {
            repository: Repository::new(config_dir),
            app_name: app_name.into(),
            tls_enabled,
        }
    }
}
