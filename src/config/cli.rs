//! Command-line argument parsing
//!
//! The container runtime normally runs the plugin without arguments; these
//! flags exist for operators debugging an installation.

use crate::config::toml::TomlSettings;
use crate::config::PluginSettings;
use crate::error::ConfigError;
use clap::Parser;

/// Command-line arguments structure
#[derive(Parser, Debug)]
#[command(name = "vpc-eni")]
#[command(about = "CNI plugin attaching containers to an elastic network interface")]
#[command(version)]
pub struct CliArgs {
    /// Settings file path
    #[arg(short, long, help = "Path to TOML settings file")]
    pub settings: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, help = "Set the logging level")]
    pub log_level: Option<String>,

    /// Log format (text, json)
    #[arg(long, help = "Set the log output format")]
    pub log_format: Option<String>,

    /// Print default settings and exit
    #[arg(long, help = "Print default settings in TOML format and exit")]
    pub print_default_settings: bool,
}

impl CliArgs {
    /// Apply CLI arguments over base settings
    pub fn apply_to_settings(&self, mut base: PluginSettings) -> Result<PluginSettings, ConfigError> {
        if let Some(ref level) = self.log_level {
            base.logging.level = level.clone();
        }

        if let Some(ref format) = self.log_format {
            base.logging.format = format.parse()?;
        }

        Ok(base)
    }
}

/// Render default settings in TOML format
pub fn default_settings_toml() -> Result<String, ConfigError> {
    let file = TomlSettings::from(&PluginSettings::default());
    let body = ::toml::to_string_pretty(&file).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
    Ok(format!("# VPC ENI plugin settings\n\n{}", body))
}
