//! Persisted preference state for keygram.
//!
//! A small JSON file holds the process-wide preferences: where the counter
//! database lives and whether collection is paused. Other commands (and other
//! processes) edit this file; a running agent polls it to pick up changes.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Main configuration for the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backing storage location for the counter database.
    pub database_path: PathBuf,

    /// Whether collection is currently paused.
    pub paused: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            paused: false,
        }
    }
}

/// Default counter database location: a fixed dotfile directory under the
/// user's home.
pub fn default_database_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".keygram")
        .join("keystrokes.db")
}

impl Config {
    /// Load configuration from the default location, falling back to
    /// defaults when no file exists yet.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_path();

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to the default location.
    pub fn save(&self) -> Result<(), ConfigError> {
        let config_path = Self::config_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, content)?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("keygram")
            .join("config.json")
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.paused);
        assert!(config.database_path.ends_with(".keygram/keystrokes.db"));
    }

    #[test]
    fn test_default_database_path_is_dotfile_under_home() {
        // The default location is a fixed `.keygram` dotfile directory
        // directly under the user's home, nothing deeper or elsewhere.
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        assert_eq!(
            default_database_path(),
            home.join(".keygram").join("keystrokes.db")
        );
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = Config {
            database_path: PathBuf::from("/tmp/elsewhere/counts.db"),
            paused: true,
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }
}
