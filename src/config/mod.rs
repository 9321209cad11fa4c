//! Configuration management module
//!
//! Two kinds of configuration reach the plugin:
//!
//! - the per-invocation network configuration, read as JSON from stdin, and
//! - plugin settings, loaded with precedence
//!   CLI arguments > environment variables > TOML file > defaults.

use crate::error::ConfigError;
use crate::host::{HostServiceVersion, DEFAULT_MIN_VERSION};
use crate::network::builder::DEFAULT_MANAGEMENT_INTERFACE_FORMAT;
use crate::network::MacAddress;
use ipnetwork::{IpNetwork, Ipv4Network};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

pub mod cli;
pub mod env;
pub mod toml;

/// Settings file consulted when none is named explicitly.
pub const DEFAULT_SETTINGS_PATH: &str = "/etc/vpc-eni/settings.toml";

/// DNS settings of the network configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(default)]
    pub nameservers: Vec<String>,
    #[serde(default)]
    pub search: Vec<String>,
}

/// Network configuration JSON as handed over on stdin
#[derive(Debug, Deserialize)]
struct NetConfigJson {
    #[serde(rename = "cniVersion", default)]
    cni_version: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    plugin_type: String,
    #[serde(rename = "eniName", default)]
    eni_name: String,
    #[serde(rename = "eniMACAddress", alias = "eniMAC", default)]
    eni_mac_address: String,
    #[serde(rename = "eniIPAddress", alias = "eniIP", default)]
    eni_ip_address: String,
    #[serde(rename = "gatewayIPAddress", default)]
    gateway_ip_address: String,
    #[serde(rename = "noInfraContainer", default)]
    no_infra_container: bool,
    #[serde(rename = "useExistingNetwork", default)]
    use_existing_network: bool,
    #[serde(default)]
    dns: DnsConfig,
}

/// Validated network configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetConfig {
    pub cni_version: String,
    pub name: String,
    pub plugin_type: String,
    pub eni_name: Option<String>,
    pub eni_mac_address: Option<MacAddress>,
    pub eni_ip_address: Option<Ipv4Network>,
    pub gateway_ip_address: Option<Ipv4Addr>,
    pub dns: DnsConfig,
    pub no_infra_container: bool,
    pub use_existing_network: bool,
}

impl NetConfig {
    /// Parse and validate the network configuration for an invocation.
    pub fn parse(stdin_data: &[u8], netns: &str) -> Result<Self, ConfigError> {
        let config: NetConfigJson = serde_json::from_slice(stdin_data)
            .map_err(|e| ConfigError::InvalidFormat(format!("failed to parse network config: {}", e)))?;

        if config.use_existing_network && config.name.is_empty() {
            return Err(missing("name"));
        }

        if !config.use_existing_network {
            if config.eni_name.is_empty() {
                return Err(missing("eniName"));
            }
            if config.eni_mac_address.is_empty() {
                return Err(missing("eniMACAddress"));
            }
            if config.eni_ip_address.is_empty() {
                return Err(missing("eniIPAddress"));
            }
        }

        if config.no_infra_container && netns.is_empty() {
            return Err(missing("netns"));
        }

        let eni_mac_address = non_empty(&config.eni_mac_address)
            .map(|mac| {
                mac.parse::<MacAddress>().map_err(|_| {
                    ConfigError::ValidationError(format!("invalid eniMACAddress {}", mac))
                })
            })
            .transpose()?;

        let eni_ip_address = non_empty(&config.eni_ip_address)
            .map(parse_ipv4_network)
            .transpose()?;

        let gateway_ip_address = non_empty(&config.gateway_ip_address)
            .map(|gw| match gw.parse::<IpAddr>() {
                Ok(IpAddr::V4(ip)) => Ok(ip),
                _ => Err(ConfigError::ValidationError(format!(
                    "invalid gatewayIPAddress {}",
                    gw
                ))),
            })
            .transpose()?;

        let net_config = NetConfig {
            cni_version: config.cni_version,
            name: config.name,
            plugin_type: config.plugin_type,
            eni_name: non_empty(&config.eni_name).map(str::to_string),
            eni_mac_address,
            eni_ip_address,
            gateway_ip_address,
            dns: config.dns,
            no_infra_container: config.no_infra_container,
            use_existing_network: config.use_existing_network,
        };

        debug!("Created NetConfig: {:?}", net_config);
        Ok(net_config)
    }
}

fn missing(field: &str) -> ConfigError {
    ConfigError::MissingRequired {
        field: field.to_string(),
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

fn parse_ipv4_network(value: &str) -> Result<Ipv4Network, ConfigError> {
    match value.parse::<IpNetwork>() {
        Ok(IpNetwork::V4(net)) if value.contains('/') => Ok(net),
        _ => Err(ConfigError::ValidationError(format!(
            "invalid eniIPAddress {}. Must be an IPv4 address in CIDR format (e.g., '10.0.0.5/24')",
            value
        ))),
    }
}

/// Which network builder the plugin runs with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuilderKind {
    HostService,
    Passthrough,
}

impl FromStr for BuilderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "host-service" => Ok(BuilderKind::HostService),
            "passthrough" => Ok(BuilderKind::Passthrough),
            other => Err(ConfigError::InvalidFormat(format!(
                "Invalid builder '{}'. Expected 'host-service' or 'passthrough'",
                other
            ))),
        }
    }
}

impl BuilderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BuilderKind::HostService => "host-service",
            BuilderKind::Passthrough => "passthrough",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ConfigError::InvalidFormat(format!(
                "Invalid log format '{}'. Expected 'text' or 'json'",
                other
            ))),
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingSettings {
    pub level: String,
    pub format: LogFormat,
    /// Append logs here instead of stderr.
    pub file: Option<String>,
}

/// Host network service settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostServiceSettings {
    pub state_file: String,
    pub min_version: HostServiceVersion,
}

/// Main plugin settings structure
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginSettings {
    pub builder: BuilderKind,
    /// Host interface name template; `{}` is replaced by the ENI link name.
    pub management_interface_format: String,
    pub host_service: HostServiceSettings,
    pub logging: LoggingSettings,
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            builder: BuilderKind::HostService,
            management_interface_format: DEFAULT_MANAGEMENT_INTERFACE_FORMAT.to_string(),
            host_service: HostServiceSettings {
                state_file: "/var/lib/vpc-eni/host-state.json".to_string(),
                min_version: DEFAULT_MIN_VERSION,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                format: LogFormat::Text,
                file: None,
            },
        }
    }
}

/// Load plugin settings from every source in precedence order.
pub fn load_settings(cli: &cli::CliArgs) -> Result<PluginSettings, ConfigError> {
    load_settings_with(cli, |name| std::env::var(name).ok())
}

/// Same as [`load_settings`] with an explicit environment lookup.
pub fn load_settings_with<F>(cli: &cli::CliArgs, lookup: F) -> Result<PluginSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let explicit_path = cli.settings.clone().or_else(|| lookup(env::SETTINGS_PATH_VAR));

    let mut settings = PluginSettings::default();
    match explicit_path {
        Some(path) => {
            settings = toml::apply_toml_settings(settings, toml::load_toml_settings(&path)?)?;
        }
        None if Path::new(DEFAULT_SETTINGS_PATH).exists() => {
            settings = toml::apply_toml_settings(
                settings,
                toml::load_toml_settings(DEFAULT_SETTINGS_PATH)?,
            )?;
        }
        None => {}
    }

    let settings = env::apply_env_settings(settings, &lookup)?;
    cli.apply_to_settings(settings)
}
