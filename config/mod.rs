/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! Host configuration: which oracle to talk to and how.
//!
//! Resolution order is defaults, then `config.toml` under the platform
//! config directory, then the `GEMINI_API_KEY` / `API_KEY` environment
//! variables. Interaction constants are not configurable.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::oracle::{GeminiOracle, PlaceholderOracle, SuggestionOracle};

pub const DEFAULT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;

/// Environment variables consulted for the API key, highest priority first.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GEMINI_API_KEY", "API_KEY"];

const CONFIG_DIR_NAME: &str = "mindcanvas";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    pub oracle: OracleConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub request_timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl OracleConfig {
    /// The API key, treating blank strings as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(path, error) => write!(f, "cannot read {}: {error}", path.display()),
            Self::Parse(path, error) => write!(f, "cannot parse {}: {error}", path.display()),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(_, error) => Some(error),
            Self::Parse(_, error) => Some(error),
        }
    }
}

impl CanvasConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Read a config file. A missing file yields the defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            },
            Err(error) => return Err(ConfigError::Io(path.to_path_buf(), error)),
        };
        Self::from_toml_str(&text).map_err(|error| ConfigError::Parse(path.to_path_buf(), error))
    }

    /// `<config dir>/mindcanvas/config.toml`, if the platform has a config dir.
    pub fn default_path() -> Option<PathBuf> {
        Some(
            dirs::config_dir()?
                .join(CONFIG_DIR_NAME)
                .join(CONFIG_FILE_NAME),
        )
    }

    /// Full resolution: defaults, config file, then environment.
    ///
    /// An unreadable or invalid file is logged and skipped.
    pub fn load() -> Self {
        let mut config = match Self::default_path() {
            Some(path) => Self::load_from_path(&path).unwrap_or_else(|error| {
                log::warn!("config: {error}; using defaults");
                Self::default()
            }),
            None => Self::default(),
        };
        config.apply_env_overrides_from(|name| std::env::var(name).ok());
        config
    }

    /// Let the first non-blank API key variable override the file.
    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.trim().is_empty());
        if let Some(key) = key {
            self.oracle.api_key = Some(key);
        }
    }
}

/// The oracle the canvas should use: Gemini when a key is configured,
/// otherwise the deterministic placeholder.
pub fn build_oracle(config: &OracleConfig) -> Arc<dyn SuggestionOracle> {
    let Some(api_key) = config.api_key() else {
        log::info!("config: no API key configured, using placeholder oracle");
        return Arc::new(PlaceholderOracle);
    };
    match GeminiOracle::new(
        api_key,
        config.model.clone(),
        config.endpoint.clone(),
        config.request_timeout(),
    ) {
        Ok(oracle) => {
            log::info!("config: using Gemini model {}", oracle.model());
            Arc::new(oracle)
        },
        Err(error) => {
            log::warn!("config: {error}; using placeholder oracle");
            Arc::new(PlaceholderOracle)
        },
    }
}
