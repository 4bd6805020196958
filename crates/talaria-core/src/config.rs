//! Framework configuration.
//!
//! [`Config`] is plain data: the registry reads it at build time and bakes
//! the values into the frozen serving structures. It deserializes from TOML
//! with every field optional, falling back to the defaults below.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default request body cap: 64 MiB.
const DEFAULT_MAX_BODY_SIZE: usize = 1 << 26;

/// Error loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file `{path}`: {source}")]
    Io {
        /// Path that failed.
        path: String,
        /// Underlying io error.
        #[source]
        source: std::io::Error,
    },
    /// The contents were not valid TOML for [`Config`].
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Whether route patterns and paths match case-sensitively.
    pub router_case_sensitive: bool,
    /// Whether request bodies are read into the context before dispatch.
    pub copy_request_body: bool,
    /// Maximum accepted request body size in bytes; larger bodies get 413.
    pub max_body_size: usize,
    /// Whether mutating controller requests must pass an XSRF token check.
    pub enable_xsrf: bool,
    /// Whether controllers render after the action when nothing was written.
    pub auto_render: bool,
    /// Whether panics in handlers are caught and recovered to a response.
    pub recover_panic: bool,
    /// Whether failure detail is included in the client-visible body.
    pub expose_errors: bool,
    /// Development mode: per-request access log lines.
    pub dev_mode: bool,
    /// Whether a session is acquired for each request.
    pub session_on: bool,
    /// Path prefixes served by the static handler.
    pub static_dirs: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            router_case_sensitive: true,
            copy_request_body: true,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            enable_xsrf: false,
            auto_render: true,
            recover_panic: true,
            expose_errors: false,
            dev_mode: false,
            session_on: false,
            static_dirs: vec!["/static".to_string()],
        }
    }
}

impl Config {
    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// Loads a TOML config file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&contents)?;
        debug!(path = %path.display(), "loaded config");
        Ok(config)
    }
}
