// ABOUTME: File-backed property-source repository reading YAML files from a single directory.
// ABOUTME: Resolves {application}-{profile} precedence and flattens nested YAML to dotted keys.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value as JsonValue};
use serde_yaml::Value as YamlValue;
use thiserror::Error;

use crate::environment::{Environment, PropertySource};

/// Shared application name whose files apply to every application.
pub const SHARED_APPLICATION: &str = "application";

/// Profile used when the request names none.
pub const DEFAULT_PROFILE: &str = "default";

const EXTENSIONS: [&str; 2] = ["yml", "yaml"];

/// Errors that can occur while resolving an environment.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("invalid name: {0:?}")]
    InvalidName(String),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{} does not contain a YAML mapping at the top level", .path.display())]
    NotAMapping { path: PathBuf },
}

/// Reads property sources from YAML files in one directory.
#[derive(Debug, Clone)]
pub struct Repository {
    dir: PathBuf,
}

impl Repository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Resolve the environment for `application` and a comma-separated profile list.
    ///
    /// Sources are ordered most specific first: later profiles override earlier
    /// ones, profile files override plain files, and application files override
    /// the shared `application.yml`. Missing files are skipped.
    pub fn find(
        &self,
        application: &str,
        profiles: &str,
        label: Option<&str>,
    ) -> Result<Environment, RepositoryError> {
        validate_name(application)?;
        if let Some(label) = label {
            validate_name(label)?;
        }

        let mut profile_list: Vec<String> = profiles
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(String::from)
            .collect();
        if profile_list.is_empty() {
            profile_list.push(DEFAULT_PROFILE.to_string());
        }
        for profile in &profile_list {
            validate_name(profile)?;
        }

        let mut env = Environment::new(
            application,
            profile_list.clone(),
            label.map(String::from),
        );

        for base in candidate_names(application, &profile_list) {
            for ext in EXTENSIONS {
                let path = self.dir.join(format!("{}.{}", base, ext));
                if !path.is_file() {
                    continue;
                }
                let source = load_source(&path)?;
                tracing::debug!(
                    file = %path.display(),
                    keys = source.source.len(),
                    "loaded property source"
                );
                env.property_sources.push(source);
            }
        }

        Ok(env)
    }
}

/// File base names in precedence order, highest first.
fn candidate_names(application: &str, profiles: &[String]) -> Vec<String> {
    let mut apps = vec![application];
    if application != SHARED_APPLICATION {
        apps.push(SHARED_APPLICATION);
    }

    let mut names = Vec::new();
    for profile in profiles.iter().rev() {
        for app in &apps {
            names.push(format!("{}-{}", app, profile));
        }
    }
    for app in &apps {
        names.push(app.to_string());
    }
    names
}

/// Names end up in file paths, so only a conservative character set is allowed.
fn validate_name(name: &str) -> Result<(), RepositoryError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(RepositoryError::InvalidName(name.to_string()))
    }
}

fn load_source(path: &Path) -> Result<PropertySource, RepositoryError> {
    let text = fs::read_to_string(path).map_err(|source| RepositoryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: YamlValue = serde_yaml::from_str(&text).map_err(|source| RepositoryError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut flat = Map::new();
    match doc {
        YamlValue::Null => {}
        YamlValue::Mapping(_) => flatten("", &doc, &mut flat),
        _ => {
            return Err(RepositoryError::NotAMapping {
                path: path.to_path_buf(),
            });
        }
    }

    Ok(PropertySource {
        name: format!("file:{}", path.display()),
        source: flat,
    })
}

/// Flatten nested YAML into `a.b.c` and `list[0]` keys.
pub fn flatten(prefix: &str, value: &YamlValue, out: &mut Map<String, JsonValue>) {
    match value {
        YamlValue::Mapping(map) => {
            for (k, v) in map {
                let key = key_string(k);
                let full = if prefix.is_empty() {
                    key
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten(&full, v, out);
            }
        }
        YamlValue::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(&format!("{}[{}]", prefix, i), item, out);
            }
        }
        YamlValue::Tagged(tagged) => flatten(prefix, &tagged.value, out),
        scalar => {
            out.insert(prefix.to_string(), scalar_to_json(scalar));
        }
    }
}

fn key_string(key: &YamlValue) -> String {
    match key {
        YamlValue::String(s) => s.clone(),
        YamlValue::Bool(b) => b.to_string(),
        YamlValue::Number(n) => n.to_string(),
        YamlValue::Null => "null".to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

fn scalar_to_json(value: &YamlValue) -> JsonValue {
    match value {
        YamlValue::Null => JsonValue::Null,
        YamlValue::Bool(b) => JsonValue::Bool(*b),
        YamlValue::String(s) => JsonValue::String(s.clone()),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::from(i)
            } else if let Some(u) = n.as_u64() {
                JsonValue::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(JsonValue::Number)
                    // NaN and infinities have no JSON number form.
                    .unwrap_or_else(|| JsonValue::String(n.to_string()))
            }
        }
        // Collections are handled by `flatten`.
        _ => JsonValue::Null,
    }
}
