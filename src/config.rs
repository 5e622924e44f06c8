use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

use crate::utils;

/// Current configuration version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Minutes between repeated reminders for the same bill. 0 means every
    /// poll that finds an overdue bill nags again.
    #[serde(default)]
    pub reminder_throttle_minutes: u64,
    /// Seconds between reminder polls in watch mode.
    #[serde(default = "default_poll_seconds")]
    pub reminder_poll_seconds: u64,
    #[serde(default)]
    pub assistant: AssistantSettings,
    #[serde(default = "default_config_version")]
    pub config_version: Option<u32>,
}

/// Hosted-model connection settings. The API key is intentionally absent
/// here; it comes from the environment only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantSettings {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_fast_model")]
    pub fast_model: String,
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            reminder_throttle_minutes: 0,
            reminder_poll_seconds: default_poll_seconds(),
            assistant: AssistantSettings::default(),
            config_version: Some(CURRENT_CONFIG_VERSION),
        }
    }
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            fast_model: default_fast_model(),
            chat_model: default_chat_model(),
        }
    }
}

fn default_database_path() -> String {
    Config::default_database_path_for_profile(utils::Profile::Prod)
}

fn default_poll_seconds() -> u64 {
    60
}

fn default_api_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_fast_model() -> String {
    "gemini-flash-lite-latest".to_string()
}

fn default_chat_model() -> String {
    "gemini-3-pro-preview".to_string()
}

fn default_config_version() -> Option<u32> {
    None
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to write config file: {0}")]
    WriteError(String),
    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Config directory error: {0}")]
    ConfigDirError(String),
}

impl Config {
    /// Load configuration from file, or create default if missing
    /// Uses the provided profile to determine config and database paths
    pub fn load_with_profile(profile: utils::Profile) -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path(profile)?;

        if config_path.exists() {
            let contents = fs::read_to_string(&config_path)
                .map_err(|e| ConfigError::ReadError(e.to_string()))?;
            let mut config: Config = toml::from_str(&contents)?;

            // Ensure database path matches profile (in case config was manually edited)
            config.database_path = Self::default_database_path_for_profile(profile);

            Ok(config)
        } else {
            // Create default config and save it
            let mut config = Config::default();
            config.database_path = Self::default_database_path_for_profile(profile);
            config.save_with_profile(profile)?;
            Ok(config)
        }
    }

    /// Load configuration from file, using production profile
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_profile(utils::Profile::Prod)
    }

    /// Save configuration to file
    pub fn save_with_profile(&mut self, profile: utils::Profile) -> Result<(), ConfigError> {
        // Ensure config version is set before saving
        self.config_version = Some(CURRENT_CONFIG_VERSION);

        let config_path = Self::get_config_path(profile)?;

        // Create parent directory if it doesn't exist
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError(e.to_string()))?;
        }

        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::WriteError(format!("Failed to serialize config: {}", e)))?;

        fs::write(&config_path, toml_string).map_err(|e| ConfigError::WriteError(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn get_config_path(profile: utils::Profile) -> Result<PathBuf, ConfigError> {
        let config_dir = utils::get_config_dir(profile).ok_or_else(|| {
            ConfigError::ConfigDirError("Could not determine config directory".to_string())
        })?;
        Ok(config_dir.join("config.toml"))
    }

    /// Get default database path for a specific profile
    fn default_database_path_for_profile(profile: utils::Profile) -> String {
        if let Some(data_dir) = utils::get_data_dir(profile) {
            data_dir.join("app.db").to_string_lossy().to_string()
        } else {
            // Fallback paths - platform-specific
            #[cfg(target_os = "macos")]
            {
                match profile {
                    utils::Profile::Dev => {
                        "~/Library/Application Support/focuspilot-dev/app.db".to_string()
                    }
                    utils::Profile::Prod => {
                        "~/Library/Application Support/focuspilot/app.db".to_string()
                    }
                }
            }
            #[cfg(not(target_os = "macos"))]
            {
                match profile {
                    utils::Profile::Dev => "~/.local/share/focuspilot-dev/app.db".to_string(),
                    utils::Profile::Prod => "~/.local/share/focuspilot/app.db".to_string(),
                }
            }
        }
    }

    /// Get the expanded database path (with ~ expansion)
    pub fn get_database_path(&self) -> PathBuf {
        utils::expand_path(&self.database_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_reproduce_nagging_reminders() {
        let config = Config::default();
        assert_eq!(config.reminder_throttle_minutes, 0);
        assert_eq!(config.reminder_poll_seconds, 60);
        assert_eq!(config.config_version, Some(CURRENT_CONFIG_VERSION));
    }

    #[test]
    fn partial_config_files_fill_in_defaults() {
        let config: Config = toml::from_str("reminder_throttle_minutes = 30").unwrap();
        assert_eq!(config.reminder_throttle_minutes, 30);
        assert_eq!(config.assistant.fast_model, "gemini-flash-lite-latest");
        assert_eq!(config.assistant.chat_model, "gemini-3-pro-preview");
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = Config::default();
        config.reminder_throttle_minutes = 15;
        let text = toml::to_string_pretty(&config).unwrap();
        let reloaded: Config = toml::from_str(&text).unwrap();
        assert_eq!(reloaded.reminder_throttle_minutes, 15);
        assert_eq!(reloaded.assistant.api_url, config.assistant.api_url);
    }
}
