//! Environment variable handling
//!
//! The container runtime passes invocation arguments through `CNI_*`
//! variables; plugin settings may be overridden with `VPC_ENI_*` variables.

use crate::config::PluginSettings;
use crate::error::ConfigError;
use std::str::FromStr;

/// Environment variable prefix for settings overrides
const ENV_PREFIX: &str = "VPC_ENI_";

/// Names a settings file explicitly.
pub const SETTINGS_PATH_VAR: &str = "VPC_ENI_SETTINGS";

/// Lifecycle command requested by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Add,
    Del,
    Version,
}

impl FromStr for Command {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADD" => Ok(Command::Add),
            "DEL" => Ok(Command::Del),
            "VERSION" => Ok(Command::Version),
            other => Err(ConfigError::UnsupportedCommand(other.to_string())),
        }
    }
}

/// Arguments of one plugin invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmdArgs {
    pub command: Command,
    pub container_id: String,
    pub netns: String,
    pub if_name: String,
    pub args: String,
    pub path: String,
    pub stdin_data: Vec<u8>,
}

/// Read invocation arguments from the process environment
pub fn cmd_args_from_env(stdin_data: Vec<u8>) -> Result<CmdArgs, ConfigError> {
    cmd_args_from_lookup(|name| std::env::var(name).ok(), stdin_data)
}

/// Read invocation arguments through an arbitrary lookup
pub fn cmd_args_from_lookup<F>(lookup: F, stdin_data: Vec<u8>) -> Result<CmdArgs, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let required = |name: &str| {
        lookup(name)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnv { name: name.to_string() })
    };

    let command: Command = required("CNI_COMMAND")?.parse()?;

    let (container_id, if_name) = match command {
        Command::Add | Command::Del => (required("CNI_CONTAINERID")?, required("CNI_IFNAME")?),
        Command::Version => (
            lookup("CNI_CONTAINERID").unwrap_or_default(),
            lookup("CNI_IFNAME").unwrap_or_default(),
        ),
    };

    Ok(CmdArgs {
        command,
        container_id,
        netns: lookup("CNI_NETNS").unwrap_or_default(),
        if_name,
        args: lookup("CNI_ARGS").unwrap_or_default(),
        path: lookup("CNI_PATH").unwrap_or_default(),
        stdin_data,
    })
}

/// Apply environment variable settings over base settings
pub fn apply_env_settings<F>(mut base: PluginSettings, lookup: &F) -> Result<PluginSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

    if let Some(builder) = var("BUILDER") {
        base.builder = builder.parse()?;
    }

    if let Some(format) = var("MANAGEMENT_INTERFACE_FORMAT") {
        base.management_interface_format = format;
    }

    if let Some(state_file) = var("STATE_FILE") {
        base.host_service.state_file = state_file;
    }

    if let Some(min_version) = var("MIN_VERSION") {
        base.host_service.min_version = min_version.parse()?;
    }

    if let Some(level) = var("LOG_LEVEL") {
        base.logging.level = level;
    }

    if let Some(format) = var("LOG_FORMAT") {
        base.logging.format = format.parse()?;
    }

    if let Some(file) = var("LOG_FILE") {
        base.logging.file = Some(file);
    }

    Ok(base)
}
