//! TOML settings file parsing

use crate::config::PluginSettings;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// TOML settings structure
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TomlSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builder: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub management_interface_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_service: Option<HostServiceConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Host network service configuration
#[derive(Debug, Serialize, Deserialize)]
pub struct HostServiceConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_version: Option<String>,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

impl From<&PluginSettings> for TomlSettings {
    fn from(settings: &PluginSettings) -> Self {
        Self {
            builder: Some(settings.builder.as_str().to_string()),
            management_interface_format: Some(settings.management_interface_format.clone()),
            host_service: Some(HostServiceConfig {
                state_file: Some(settings.host_service.state_file.clone()),
                min_version: Some(settings.host_service.min_version.to_string()),
            }),
            logging: Some(LoggingConfig {
                level: Some(settings.logging.level.clone()),
                format: Some(settings.logging.format.as_str().to_string()),
                file: settings.logging.file.clone(),
            }),
        }
    }
}

/// Load settings from TOML file
pub fn load_toml_settings(path: &str) -> Result<TomlSettings, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|_| ConfigError::FileNotFound { path: path.to_string() })?;

    parse_toml_settings(&content)
}

pub fn parse_toml_settings(content: &str) -> Result<TomlSettings, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))
}

/// Apply TOML settings over base settings
pub fn apply_toml_settings(
    mut base: PluginSettings,
    file: TomlSettings,
) -> Result<PluginSettings, ConfigError> {
    if let Some(builder) = file.builder {
        base.builder = builder.parse()?;
    }

    if let Some(format) = file.management_interface_format {
        base.management_interface_format = format;
    }

    if let Some(host_service) = file.host_service {
        if let Some(state_file) = host_service.state_file {
            base.host_service.state_file = state_file;
        }
        if let Some(min_version) = host_service.min_version {
            base.host_service.min_version = min_version.parse()?;
        }
    }

    if let Some(logging) = file.logging {
        if let Some(level) = logging.level {
            base.logging.level = level;
        }
        if let Some(format) = logging.format {
            base.logging.format = format.parse()?;
        }
        if logging.file.is_some() {
            base.logging.file = logging.file;
        }
    }

    Ok(base)
}
