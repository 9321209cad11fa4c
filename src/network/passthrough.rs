//! Builder for hosts where the runtime wires the ENI itself
//!
//! Makes no host calls and echoes back the configured addresses.

use crate::error::NetworkError;
use crate::network::builder::{endpoint_name, network_name};
use crate::network::namespace::{classify, AttachmentMode};
use crate::network::{
    AttachedEndpoint, BestEffort, EndpointRemoval, EndpointSpec, NetworkBuilder, NetworkSpec,
    ResolvedNetwork,
};
use async_trait::async_trait;
use tracing::debug;

/// No-op network builder
#[derive(Debug, Default)]
pub struct PassthroughBuilder;

impl PassthroughBuilder {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NetworkBuilder for PassthroughBuilder {
    async fn find_or_create_network(&self, spec: &NetworkSpec) -> Result<ResolvedNetwork, NetworkError> {
        let name = network_name(spec)?;
        debug!("Passthrough network {}", name);
        Ok(ResolvedNetwork {
            id: name.clone(),
            name,
            existed: true,
            gateway: spec.gateway,
            dns_servers: spec.dns_servers.clone(),
            dns_search: spec.dns_search.clone(),
        })
    }

    async fn delete_network(&self, _spec: &NetworkSpec) -> Result<(), NetworkError> {
        Ok(())
    }

    async fn find_or_create_endpoint(
        &self,
        network: &ResolvedNetwork,
        spec: &EndpointSpec,
    ) -> Result<AttachedEndpoint, NetworkError> {
        let attachment = classify(&spec.netns, &spec.container_id, spec.no_infra_container)?;
        let name = endpoint_name(&network.name, &attachment.group_id);

        let ip_address = spec
            .ip_address
            .ok_or_else(|| NetworkError::InvalidSpec(format!("no address for endpoint {}", name)))?;
        let mac_address = spec
            .mac_address
            .ok_or_else(|| NetworkError::InvalidSpec(format!("no MAC for endpoint {}", name)))?;

        Ok(AttachedEndpoint {
            id: name.clone(),
            name,
            attachment,
            existed: true,
            ip_address,
            mac_address,
            gateway: network.gateway,
        })
    }

    async fn delete_endpoint(&self, _network: &NetworkSpec, spec: &EndpointSpec) -> EndpointRemoval {
        match classify(&spec.netns, &spec.container_id, spec.no_infra_container) {
            Ok(attachment) => EndpointRemoval {
                network_deletable: attachment.mode == AttachmentMode::Infra,
                outcome: BestEffort::Completed,
            },
            Err(e) => EndpointRemoval {
                network_deletable: false,
                outcome: BestEffort::Logged(e.into()),
            },
        }
    }
}
