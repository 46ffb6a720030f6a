// ABOUTME: Configuration loading and validation for the configserver process.
// ABOUTME: Reads environment variables, applies defaults, and embeds the keystore SecretSource.

use std::net::SocketAddr;
use std::path::PathBuf;

use configserver_core::SecretSource;
use thiserror::Error;
use ulid::Ulid;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CONFIG_SERVER_BIND is not a valid socket address: {0}")]
    InvalidBind(String),

    #[error("CONFIG_SERVER_USERNAME must not contain ':' (HTTP Basic separator)")]
    InvalidUsername,
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    pub username: String,
    pub password: String,
    /// True when no password was configured and one was generated for this run.
    pub password_generated: bool,
    pub config_dir: PathBuf,
    pub app_name: String,
    /// Pre-provisioned keystore used when nothing is materialized.
    pub tls_keystore: Option<PathBuf>,
    pub keystore: SecretSource,
}

impl ServerConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup` with sensible defaults.
    ///
    /// Environment variables:
    /// - CONFIG_SERVER_BIND: socket address to bind (default: 0.0.0.0:8888)
    /// - CONFIG_SERVER_USERNAME: HTTP Basic user (default: user)
    /// - CONFIG_SERVER_PASSWORD: HTTP Basic password (default: generated per run)
    /// - CONFIG_SERVER_CONFIG_DIR: directory of YAML property files (default: ./config)
    /// - CONFIG_SERVER_APP_NAME: name reported by /actuator/info (default: configserver)
    /// - SERVER_SSL_KEY_STORE: keystore used when KEYSTORE_BASE64 is unset (optional)
    /// - KEYSTORE_BASE64 / KEYSTORE_TEMP_PATH: see [`SecretSource::from_vars`]
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| {
            lookup(key).and_then(|v| {
                let trimmed = v.trim().to_string();
                if trimmed.is_empty() { None } else { Some(trimmed) }
            })
        };

        let bind_str =
            non_empty("CONFIG_SERVER_BIND").unwrap_or_else(|| "0.0.0.0:8888".to_string());
        let bind: SocketAddr = bind_str
            .parse()
            .map_err(|_| ConfigError::InvalidBind(bind_str))?;

        let username = non_empty("CONFIG_SERVER_USERNAME").unwrap_or_else(|| "user".to_string());
        if username.contains(':') {
            return Err(ConfigError::InvalidUsername);
        }

        // Passwords are taken verbatim; surrounding whitespace may be intentional.
        let configured_password = lookup("CONFIG_SERVER_PASSWORD").filter(|p| !p.is_empty());
        let password_generated = configured_password.is_none();
        let password =
            configured_password.unwrap_or_else(|| Ulid::new().to_string().to_lowercase());

        let config_dir = non_empty("CONFIG_SERVER_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("config"));

        let app_name =
            non_empty("CONFIG_SERVER_APP_NAME").unwrap_or_else(|| "configserver".to_string());

        let tls_keystore = non_empty("SERVER_SSL_KEY_STORE").map(PathBuf::from);

        let keystore = SecretSource::from_vars(&lookup);

        Ok(Self {
            bind,
            username,
            password,
            password_generated,
            config_dir,
            app_name,
            tls_keystore,
            keystore,
        })
    }
}
