//! Find, create, attach and remove the per-container endpoint

use crate::error::{HostServiceError, NetworkError};
use crate::host::interface::InterfaceController;
use crate::host::{AttachTarget, ContainerBinding, EndpointInfo, EndpointRequest, HostNetworkService};
use crate::network::builder::{endpoint_name, network_name, HostServiceBuilder};
use crate::network::namespace::{classify, Attachment, AttachmentMode};
use crate::network::{
    AttachedEndpoint, BestEffort, EndpointRemoval, EndpointSpec, NetworkSpec, ResolvedNetwork,
};
use tracing::{error, info, warn};

/// Where the endpoint of this invocation gets attached.
fn attach_target(attachment: &Attachment, spec: &EndpointSpec) -> AttachTarget {
    match attachment.mode {
        AttachmentMode::ExternalNamespace => AttachTarget::Namespace(attachment.group_id.clone()),
        AttachmentMode::Infra | AttachmentMode::Shared => {
            AttachTarget::Container(spec.container_id.clone())
        }
    }
}

fn attached(info: EndpointInfo, attachment: Attachment, existed: bool) -> AttachedEndpoint {
    AttachedEndpoint {
        name: info.name,
        id: info.id,
        attachment,
        existed,
        ip_address: info.ip_address,
        mac_address: info.mac_address,
        gateway: info.gateway,
    }
}

impl<S, I> HostServiceBuilder<S, I>
where
    S: HostNetworkService,
    I: InterfaceController,
{
    pub(crate) async fn find_or_create_endpoint_impl(
        &self,
        network: &ResolvedNetwork,
        spec: &EndpointSpec,
    ) -> Result<AttachedEndpoint, NetworkError> {
        let attachment = classify(&spec.netns, &spec.container_id, spec.no_infra_container)?;
        let name = endpoint_name(&network.name, &attachment.group_id);
        let target = attach_target(&attachment, spec);

        if let Some(existing) = self.service.find_endpoint(&name).await? {
            info!("Found existing endpoint {}", name);
            return self.reuse_endpoint(existing, attachment, &target).await;
        }

        if attachment.mode == AttachmentMode::Shared {
            // Only the infra container creates the endpoint of a group.
            error!("Failed to find endpoint {} for container {}", name, spec.container_id);
            return Err(NetworkError::EndpointNotFound { name });
        }

        let request = self.endpoint_request(&name, network, spec, &attachment);

        info!("Creating endpoint {:?}", request);
        let created = match self.service.create_endpoint(&request).await {
            Ok(created) => created,
            Err(HostServiceError::AlreadyExists { .. }) => {
                warn!("Endpoint {} was created concurrently, reusing it", name);
                let existing = self
                    .service
                    .find_endpoint(&name)
                    .await?
                    .ok_or_else(|| NetworkError::EndpointNotFound { name: name.clone() })?;
                return self.reuse_endpoint(existing, attachment, &target).await;
            }
            Err(source) => {
                error!("Failed to create endpoint {}: {}", name, source);
                return Err(NetworkError::CreateFailed {
                    kind: "endpoint",
                    name,
                    source,
                });
            }
        };

        info!("Attaching endpoint {} to {}", created.id, target);
        if let Err(source) = self.service.attach_endpoint(&created.id, &target).await {
            error!("Failed to attach endpoint {}: {}", created.id, source);
            if let Err(cleanup) = self.service.delete_endpoint(&created.id).await {
                error!("Failed to remove unattached endpoint {}: {}", name, cleanup);
            }
            return Err(NetworkError::AttachFailed {
                endpoint: name,
                target: target.to_string(),
                source,
            });
        }

        Ok(attached(created, attachment, false))
    }

    async fn reuse_endpoint(
        &self,
        existing: EndpointInfo,
        attachment: Attachment,
        target: &AttachTarget,
    ) -> Result<AttachedEndpoint, NetworkError> {
        if attachment.mode.is_self_attached() {
            info!("Endpoint {} is already attached to the task", existing.id);
            return Ok(attached(existing, attachment, true));
        }

        // Each container sharing the endpoint needs its own attach.
        info!("Attaching endpoint {} to {}", existing.id, target);
        self.service
            .attach_endpoint(&existing.id, target)
            .await
            .map_err(|source| NetworkError::AttachFailed {
                endpoint: existing.name.clone(),
                target: target.to_string(),
                source,
            })?;

        Ok(attached(existing, attachment, true))
    }

    fn endpoint_request(
        &self,
        name: &str,
        network: &ResolvedNetwork,
        spec: &EndpointSpec,
        attachment: &Attachment,
    ) -> EndpointRequest {
        let (namespace, container) = match attachment.mode {
            AttachmentMode::ExternalNamespace => (Some(attachment.group_id.clone()), None),
            AttachmentMode::Infra | AttachmentMode::Shared => (
                None,
                Some(ContainerBinding {
                    container_id: spec.container_id.clone(),
                    is_infra_container: attachment.mode == AttachmentMode::Infra,
                    infra_container_id: attachment.group_id.clone(),
                }),
            ),
        };

        EndpointRequest {
            name: name.to_string(),
            network_name: network.name.clone(),
            dns_server_list: network.dns_servers.join(","),
            dns_suffix: network.dns_search.join(","),
            mac_address: spec.mac_address,
            ip_address: spec.ip_address,
            gateway: network.gateway,
            namespace,
            container,
        }
    }

    pub(crate) async fn delete_endpoint_impl(
        &self,
        network: &NetworkSpec,
        spec: &EndpointSpec,
    ) -> EndpointRemoval {
        let attachment = match classify(&spec.netns, &spec.container_id, spec.no_infra_container) {
            Ok(attachment) => attachment,
            Err(e) => {
                // Ownership is unknown, so the network must be left alone.
                return EndpointRemoval {
                    network_deletable: false,
                    outcome: BestEffort::Logged(e.into()),
                };
            }
        };

        // Shared and external namespace endpoints outlive this container and
        // keep referencing the network.
        let network_deletable = attachment.mode == AttachmentMode::Infra;
        let outcome = self.remove_endpoint(network, spec, &attachment).await.into();

        EndpointRemoval {
            network_deletable,
            outcome,
        }
    }

    async fn remove_endpoint(
        &self,
        network: &NetworkSpec,
        spec: &EndpointSpec,
        attachment: &Attachment,
    ) -> Result<(), NetworkError> {
        let name = endpoint_name(&network_name(network)?, &attachment.group_id);

        let endpoint = self
            .service
            .find_endpoint(&name)
            .await?
            .ok_or_else(|| NetworkError::EndpointNotFound { name: name.clone() })?;

        let target = attach_target(attachment, spec);
        info!("Detaching endpoint {} from {}", endpoint.id, target);
        match self.service.detach_endpoint(&endpoint.id, &target).await {
            Ok(()) => {}
            Err(HostServiceError::TargetNotFound { .. }) => {
                warn!("{} no longer exists, continuing", target);
            }
            Err(e) => return Err(e.into()),
        }

        if attachment.mode != AttachmentMode::Infra {
            return Ok(());
        }

        info!("Deleting endpoint {} with id {}", name, endpoint.id);
        self.service.delete_endpoint(&endpoint.id).await?;
        Ok(())
    }
}
