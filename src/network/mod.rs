//! Network and endpoint orchestration
//!
//! Each orchestration step takes an immutable request and returns an
//! explicit result; the lifecycle handler threads the fields forward.

use crate::config::{BuilderKind, PluginSettings};
use crate::error::NetworkError;
use crate::host::interface::RtNetlinkInterfaceController;
use crate::host::state_file::StateFileHostService;
use async_trait::async_trait;
use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;
use tracing::info;

pub mod builder;
pub mod endpoint_ops;
pub mod mac;
pub mod namespace;
pub mod network_ops;
pub mod passthrough;

pub use builder::HostServiceBuilder;
pub use mac::MacAddress;
pub use namespace::{Attachment, AttachmentMode};
pub use passthrough::PassthroughBuilder;

/// Pre-provisioned elastic network interface backing a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eni {
    pub link_name: String,
    pub mac_address: MacAddress,
}

/// Description of the network an invocation needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    /// Caller supplied name, used verbatim when `should_exist` is set.
    pub name: String,
    pub eni: Option<Eni>,
    pub ip_address: Option<Ipv4Network>,
    pub gateway: Option<Ipv4Addr>,
    pub dns_servers: Vec<String>,
    pub dns_search: Vec<String>,
    /// The network must already exist; the caller owns its lifecycle.
    pub should_exist: bool,
}

/// Network located or created on the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedNetwork {
    pub name: String,
    pub id: String,
    /// Found rather than created by this invocation.
    pub existed: bool,
    pub gateway: Option<Ipv4Addr>,
    pub dns_servers: Vec<String>,
    pub dns_search: Vec<String>,
}

/// Description of the endpoint for one container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub container_id: String,
    pub netns: String,
    pub ip_address: Option<Ipv4Network>,
    pub mac_address: Option<MacAddress>,
    pub no_infra_container: bool,
}

/// Endpoint attached to the container or namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachedEndpoint {
    pub name: String,
    pub id: String,
    pub attachment: Attachment,
    pub existed: bool,
    pub ip_address: Ipv4Network,
    pub mac_address: MacAddress,
    pub gateway: Option<Ipv4Addr>,
}

/// Outcome of a step whose failure is logged rather than surfaced
#[derive(Debug)]
pub enum BestEffort {
    Completed,
    Logged(NetworkError),
}

impl BestEffort {
    pub fn is_completed(&self) -> bool {
        matches!(self, BestEffort::Completed)
    }
}

impl From<Result<(), NetworkError>> for BestEffort {
    fn from(result: Result<(), NetworkError>) -> Self {
        match result {
            Ok(()) => BestEffort::Completed,
            Err(e) => BestEffort::Logged(e),
        }
    }
}

/// Result of removing an endpoint
#[derive(Debug)]
pub struct EndpointRemoval {
    /// Only set once an infra endpoint is gone; shared and external
    /// namespace endpoints never own the network lifetime.
    pub network_deletable: bool,
    pub outcome: BestEffort,
}

/// Platform network builder
#[async_trait]
pub trait NetworkBuilder: Send + Sync {
    async fn find_or_create_network(&self, spec: &NetworkSpec) -> Result<ResolvedNetwork, NetworkError>;

    /// Not finding the network is not an error.
    async fn delete_network(&self, spec: &NetworkSpec) -> Result<(), NetworkError>;

    async fn find_or_create_endpoint(
        &self,
        network: &ResolvedNetwork,
        spec: &EndpointSpec,
    ) -> Result<AttachedEndpoint, NetworkError>;

    async fn delete_endpoint(&self, network: &NetworkSpec, spec: &EndpointSpec) -> EndpointRemoval;
}

/// Pick the builder for this deployment.
pub fn select_builder(settings: &PluginSettings) -> Box<dyn NetworkBuilder> {
    match settings.builder {
        BuilderKind::HostService => {
            info!(
                "Using host service builder with state file {}",
                settings.host_service.state_file
            );
            Box::new(HostServiceBuilder::new(
                StateFileHostService::new(&settings.host_service.state_file),
                RtNetlinkInterfaceController::new(),
                settings.host_service.min_version,
                settings.management_interface_format.clone(),
            ))
        }
        BuilderKind::Passthrough => {
            info!("Using passthrough builder");
            Box::new(PassthroughBuilder::new())
        }
    }
}
