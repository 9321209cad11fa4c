//! Builder driving the host network service

use crate::error::NetworkError;
use crate::host::interface::InterfaceController;
use crate::host::{HostNetworkService, HostServiceVersion};
use crate::network::{
    AttachedEndpoint, EndpointRemoval, EndpointSpec, NetworkBuilder, NetworkSpec,
    ResolvedNetwork,
};
use async_trait::async_trait;

/// Format of plugin owned network names, filled with the compact ENI MAC.
pub const NETWORK_NAME_PREFIX: &str = "task-br-";

/// Separator between network name and group id in endpoint names.
pub const ENDPOINT_NAME_SEPARATOR: &str = "-ep-";

/// Management interface naming used by Windows hosts.
pub const DEFAULT_MANAGEMENT_INTERFACE_FORMAT: &str = "vEthernet ({})";

/// Network builder backed by a host network service
pub struct HostServiceBuilder<S, I> {
    pub(crate) service: S,
    pub(crate) interfaces: I,
    pub(crate) min_version: HostServiceVersion,
    pub(crate) management_interface_format: String,
}

impl<S, I> HostServiceBuilder<S, I>
where
    S: HostNetworkService,
    I: InterfaceController,
{
    pub fn new(
        service: S,
        interfaces: I,
        min_version: HostServiceVersion,
        management_interface_format: String,
    ) -> Self {
        Self {
            service,
            interfaces,
            min_version,
            management_interface_format,
        }
    }

    /// Name of the host interface bridged onto the given adapter.
    pub(crate) fn management_interface_name(&self, adapter_name: &str) -> String {
        self.management_interface_format.replace("{}", adapter_name)
    }
}

/// Deterministic network name.
///
/// Caller supplied when the network must exist, otherwise derived from the
/// backing ENI's hardware address.
pub fn network_name(spec: &NetworkSpec) -> Result<String, NetworkError> {
    if spec.should_exist {
        if spec.name.is_empty() {
            return Err(NetworkError::InvalidSpec(
                "an existing network must be named".to_string(),
            ));
        }
        return Ok(spec.name.clone());
    }

    let eni = spec.eni.as_ref().ok_or_else(|| {
        NetworkError::InvalidSpec("a plugin owned network needs a backing ENI".to_string())
    })?;
    Ok(format!("{}{}", NETWORK_NAME_PREFIX, eni.mac_address.compact()))
}

/// Deterministic endpoint name within a network.
pub fn endpoint_name(network_name: &str, group_id: &str) -> String {
    format!("{}{}{}", network_name, ENDPOINT_NAME_SEPARATOR, group_id)
}

#[async_trait]
impl<S, I> NetworkBuilder for HostServiceBuilder<S, I>
where
    S: HostNetworkService,
    I: InterfaceController,
{
    async fn find_or_create_network(&self, spec: &NetworkSpec) -> Result<ResolvedNetwork, NetworkError> {
        self.find_or_create_network_impl(spec).await
    }

    async fn delete_network(&self, spec: &NetworkSpec) -> Result<(), NetworkError> {
        self.delete_network_impl(spec).await
    }

    async fn find_or_create_endpoint(
        &self,
        network: &ResolvedNetwork,
        spec: &EndpointSpec,
    ) -> Result<AttachedEndpoint, NetworkError> {
        self.find_or_create_endpoint_impl(network, spec).await
    }

    async fn delete_endpoint(&self, network: &NetworkSpec, spec: &EndpointSpec) -> EndpointRemoval {
        self.delete_endpoint_impl(network, spec).await
    }
}
