//! Runtime settings for annolist.

use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default maximum number of simultaneous page-fetch connections.
pub const DEFAULT_CONNECTOR_LIMIT: usize = 5;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Synthetic selector substituted for selector-less ("whole canvas")
/// targets so clients can still render a bounded region.
pub const DEFAULT_FAKE_SELECTOR: &str = "xywh=0,0,50,50";

/// Errors that can occur while loading settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Settings for the annotation service client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URI of the annotation service, e.g. `https://elucidate.example.org/`.
    pub service_uri: String,

    /// Maximum simultaneous in-flight page fetches.
    pub connector_limit: usize,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Selector value substituted for selector-less targets, if any.
    pub fake_selector: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service_uri: "http://localhost:8080/".to_string(),
            connector_limit: DEFAULT_CONNECTOR_LIMIT,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            fake_selector: None,
        }
    }
}

impl Settings {
    /// Load settings from an optional TOML file, then apply environment
    /// overrides (`ANNOLIST_SERVICE_URI`, `ANNOLIST_CONNECTOR_LIMIT`,
    /// `ANNOLIST_TIMEOUT_SECS`, `ANNOLIST_FAKE_SELECTOR`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new("annolist.toml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env()?;
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = env::var("ANNOLIST_SERVICE_URI") {
            self.service_uri = value;
        }
        if let Ok(value) = env::var("ANNOLIST_CONNECTOR_LIMIT") {
            self.connector_limit =
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "ANNOLIST_CONNECTOR_LIMIT".to_string(),
                        value,
                    })?;
        }
        if let Ok(value) = env::var("ANNOLIST_TIMEOUT_SECS") {
            self.request_timeout_secs =
                value
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        key: "ANNOLIST_TIMEOUT_SECS".to_string(),
                        value,
                    })?;
        }
        if let Ok(value) = env::var("ANNOLIST_FAKE_SELECTOR") {
            self.fake_selector = if value.is_empty() { None } else { Some(value) };
        }
        Ok(())
    }

    /// Per-request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
