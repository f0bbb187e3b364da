//! TOML-based application configuration.
//!
//! Stored at `~/.config/cadence/config.toml`. Every field has a default so
//! a missing or partial file always loads.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;

/// Time-tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Refuse to start a timer while any other session is active.
    #[serde(default = "default_true")]
    pub single_active_session: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            single_active_session: true,
        }
    }
}

/// Output configuration for the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Pretty-print JSON output.
    #[serde(default = "default_true")]
    pub pretty_json: bool,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self { pretty_json: true }
    }
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/cadence/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

fn default_true() -> bool {
    true
}

impl Config {
    fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/cadence"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load the configuration, falling back to defaults when the file does
    /// not exist yet.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::LoadFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        toml::from_str(&raw).map_err(|e| ConfigError::ParseFailed(e.to_string()))
    }

    /// Save the configuration.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let raw = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        std::fs::write(&path, raw).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })
    }

    /// Read a value by dotted key, for the CLI `config get` command.
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "tracker.single_active_session" => {
                Some(self.tracker.single_active_session.to_string())
            }
            "display.pretty_json" => Some(self.display.pretty_json.to_string()),
            _ => None,
        }
    }

    /// Write a value by dotted key, for the CLI `config set` command.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let parse_bool = |value: &str| {
            value.parse::<bool>().map_err(|_| ConfigError::ParseFailed(format!(
                "expected true/false, got '{value}'"
            )))
        };
        match key {
            "tracker.single_active_session" => {
                self.tracker.single_active_session = parse_bool(value)?;
            }
            "display.pretty_json" => {
                self.display.pretty_json = parse_bool(value)?;
            }
            _ => {
                return Err(ConfigError::ParseFailed(format!("unknown key '{key}'")));
            }
        }
        Ok(())
    }

    /// All dotted keys and their current values.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            (
                "tracker.single_active_session",
                self.tracker.single_active_session.to_string(),
            ),
            ("display.pretty_json", self.display.pretty_json.to_string()),
        ]
    }
}
