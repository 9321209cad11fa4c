//! Find, create and delete the virtual network

use crate::error::{HostServiceError, NetworkError};
use crate::host::interface::InterfaceController;
use crate::host::{HostNetworkService, NetworkInfo, NetworkRequest, NetworkType};
use crate::network::builder::{network_name, HostServiceBuilder};
use crate::network::{NetworkSpec, ResolvedNetwork};
use ipnetwork::Ipv4Network;
use tracing::{error, info, warn};

impl<S, I> HostServiceBuilder<S, I>
where
    S: HostNetworkService,
    I: InterfaceController,
{
    pub(crate) async fn find_or_create_network_impl(
        &self,
        spec: &NetworkSpec,
    ) -> Result<ResolvedNetwork, NetworkError> {
        self.service.check_version(&self.min_version).await?;

        let name = network_name(spec)?;

        if let Some(existing) = self.service.find_network(&name).await? {
            info!("Found existing network {}", name);
            return Ok(resolved(spec, existing, true));
        }

        if spec.should_exist {
            error!("Could not find existing network {}", name);
            return Err(NetworkError::NetworkNotFound { name });
        }

        let request = NetworkRequest {
            name: name.clone(),
            network_type: NetworkType::Transparent,
            adapter_name: spec.eni.as_ref().map(|eni| eni.link_name.clone()),
            address_prefix: spec.ip_address.map(subnet_prefix),
            gateway: spec.gateway,
        };

        info!("Creating network {:?}", request);
        let created = match self.service.create_network(&request).await {
            Ok(created) => created,
            Err(HostServiceError::AlreadyExists { .. }) => {
                // Another invocation for the same ENI got there first.
                warn!("Network {} was created concurrently, reusing it", name);
                let existing = self
                    .service
                    .find_network(&name)
                    .await?
                    .ok_or_else(|| NetworkError::NetworkNotFound { name: name.clone() })?;
                return Ok(resolved(spec, existing, true));
            }
            Err(source) => {
                error!("Failed to create network {}: {}", name, source);
                return Err(NetworkError::CreateFailed {
                    kind: "network",
                    name,
                    source,
                });
            }
        };

        if let Some(eni) = &spec.eni {
            let mgmt_iface = self.management_interface_name(&eni.link_name);
            if let Err(e) = self.interfaces.disable_interface(&mgmt_iface).await {
                error!("Failed to disable management interface {}: {}", mgmt_iface, e);
                if let Err(cleanup) = self.service.delete_network(&created.id).await {
                    error!("Failed to remove network {} after hardening failure: {}", name, cleanup);
                }
                return Err(e);
            }
        }

        Ok(resolved(spec, created, false))
    }

    pub(crate) async fn delete_network_impl(&self, spec: &NetworkSpec) -> Result<(), NetworkError> {
        let name = network_name(spec)?;

        let Some(network) = self.service.find_network(&name).await? else {
            info!("Network {} not found, nothing to delete", name);
            return Ok(());
        };

        info!("Deleting network {} with id {}", name, network.id);
        self.service.delete_network(&network.id).await.map_err(|e| {
            error!("Failed to delete network {}: {}", name, e);
            NetworkError::from(e)
        })
    }
}

fn resolved(spec: &NetworkSpec, info: NetworkInfo, existed: bool) -> ResolvedNetwork {
    ResolvedNetwork {
        name: info.name,
        id: info.id,
        existed,
        gateway: spec.gateway.or(info.gateway),
        dns_servers: spec.dns_servers.clone(),
        dns_search: spec.dns_search.clone(),
    }
}

/// Subnet containing the given interface address.
fn subnet_prefix(address: Ipv4Network) -> Ipv4Network {
    Ipv4Network::new(address.network(), address.prefix()).unwrap_or(address)
}
