//! Host network service contract
//!
//! The host network service durably owns virtual networks, endpoints and
//! their attachments. The orchestrators only talk to it through
//! [`HostNetworkService`]; no state is kept between invocations.

use crate::error::{ConfigError, HostServiceError, NetworkError};
use crate::network::mac::MacAddress;
use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

pub mod interface;
pub mod state;
pub mod state_file;

#[cfg(test)]
pub mod memory;

/// Version reported by the host network service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HostServiceVersion {
    pub major: u32,
    pub minor: u32,
}

impl HostServiceVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    pub fn is_at_least(&self, min: &HostServiceVersion) -> bool {
        self.major > min.major || (self.major == min.major && self.minor >= min.minor)
    }
}

/// Oldest host service release the orchestrators support.
pub const DEFAULT_MIN_VERSION: HostServiceVersion = HostServiceVersion::new(7, 2);

impl fmt::Display for HostServiceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for HostServiceVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (major, minor) = s.trim().split_once('.').ok_or_else(|| {
            ConfigError::InvalidFormat(format!("Invalid version '{}'. Expected 'major.minor'", s))
        })?;

        let major = major
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidFormat(format!("Invalid major version: '{}'", major)))?;
        let minor = minor
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidFormat(format!("Invalid minor version: '{}'", minor)))?;

        Ok(Self { major, minor })
    }
}

impl TryFrom<String> for HostServiceVersion {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<HostServiceVersion> for String {
    fn from(version: HostServiceVersion) -> String {
        version.to_string()
    }
}

/// Network type requested from the host service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    /// L2 segment bridged directly onto the backing adapter.
    Transparent,
}

/// Request to create a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRequest {
    pub name: String,
    pub network_type: NetworkType,
    pub adapter_name: Option<String>,
    pub address_prefix: Option<Ipv4Network>,
    pub gateway: Option<Ipv4Addr>,
}

/// Network as recorded by the host service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInfo {
    pub id: String,
    pub name: String,
    pub network_type: NetworkType,
    pub adapter_name: Option<String>,
    pub address_prefix: Option<Ipv4Network>,
    pub gateway: Option<Ipv4Addr>,
}

/// Container an endpoint is bound to when no external namespace is used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerBinding {
    pub container_id: String,
    pub is_infra_container: bool,
    pub infra_container_id: String,
}

/// Request to create an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointRequest {
    pub name: String,
    pub network_name: String,
    /// Comma separated server list.
    pub dns_server_list: String,
    /// Comma separated search suffixes.
    pub dns_suffix: String,
    pub mac_address: Option<MacAddress>,
    pub ip_address: Option<Ipv4Network>,
    pub gateway: Option<Ipv4Addr>,
    /// Externally managed namespace the endpoint lives in.
    pub namespace: Option<String>,
    pub container: Option<ContainerBinding>,
}

/// Endpoint as recorded by the host service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointInfo {
    pub id: String,
    pub name: String,
    pub network_name: String,
    pub ip_address: Ipv4Network,
    pub mac_address: MacAddress,
    pub gateway: Option<Ipv4Addr>,
    pub dns_server_list: String,
    pub dns_suffix: String,
}

/// What an endpoint is attached to
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AttachTarget {
    Container(String),
    Namespace(String),
}

impl fmt::Display for AttachTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachTarget::Container(id) => write!(f, "container {}", id),
            AttachTarget::Namespace(id) => write!(f, "namespace {}", id),
        }
    }
}

/// Host network service trait
#[async_trait]
pub trait HostNetworkService: Send + Sync {
    async fn version(&self) -> Result<HostServiceVersion, HostServiceError>;

    /// Fail unless the service is at least `min`.
    async fn check_version(&self, min: &HostServiceVersion) -> Result<(), NetworkError> {
        let found = self.version().await?;
        tracing::info!("Running on host network service version {}", found);
        if !found.is_at_least(min) {
            return Err(NetworkError::VersionUnsupported {
                found: found.to_string(),
                required: min.to_string(),
            });
        }
        Ok(())
    }

    async fn find_network(&self, name: &str) -> Result<Option<NetworkInfo>, HostServiceError>;

    async fn create_network(&self, request: &NetworkRequest) -> Result<NetworkInfo, HostServiceError>;

    async fn delete_network(&self, id: &str) -> Result<(), HostServiceError>;

    async fn find_endpoint(&self, name: &str) -> Result<Option<EndpointInfo>, HostServiceError>;

    async fn create_endpoint(
        &self,
        request: &EndpointRequest,
    ) -> Result<EndpointInfo, HostServiceError>;

    async fn delete_endpoint(&self, id: &str) -> Result<(), HostServiceError>;

    async fn attach_endpoint(&self, id: &str, target: &AttachTarget)
        -> Result<(), HostServiceError>;

    /// Reports [`HostServiceError::TargetNotFound`] when the target is gone.
    async fn detach_endpoint(&self, id: &str, target: &AttachTarget)
        -> Result<(), HostServiceError>;
}
