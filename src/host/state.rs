//! Durable state model shared by host service implementations

use crate::error::HostServiceError;
use crate::host::{
    AttachTarget, EndpointInfo, EndpointRequest, NetworkInfo, NetworkRequest,
};
use crate::network::mac::MacAddress;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::net::Ipv4Addr;
use uuid::Uuid;

/// Endpoint together with its live attachments
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEndpoint {
    pub info: EndpointInfo,
    #[serde(default)]
    pub attachments: BTreeSet<AttachTarget>,
}

/// Everything the host service knows, keyed by name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostState {
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkInfo>,
    #[serde(default)]
    pub endpoints: BTreeMap<String, StoredEndpoint>,
}

impl HostState {
    pub fn find_network(&self, name: &str) -> Option<NetworkInfo> {
        self.networks.get(name).cloned()
    }

    pub fn create_network(&mut self, request: &NetworkRequest) -> Result<NetworkInfo, HostServiceError> {
        if self.networks.contains_key(&request.name) {
            return Err(HostServiceError::AlreadyExists {
                kind: "network",
                name: request.name.clone(),
            });
        }

        let info = NetworkInfo {
            id: Uuid::new_v4().to_string(),
            name: request.name.clone(),
            network_type: request.network_type,
            adapter_name: request.adapter_name.clone(),
            address_prefix: request.address_prefix,
            gateway: request.gateway,
        };
        self.networks.insert(info.name.clone(), info.clone());
        Ok(info)
    }

    pub fn delete_network(&mut self, id: &str) -> Result<(), HostServiceError> {
        let name = self
            .networks
            .values()
            .find(|n| n.id == id)
            .map(|n| n.name.clone())
            .ok_or_else(|| HostServiceError::NotFound {
                kind: "network",
                name: id.to_string(),
            })?;

        if self.endpoints.values().any(|e| e.info.network_name == name) {
            return Err(HostServiceError::InUse { name });
        }

        self.networks.remove(&name);
        Ok(())
    }

    pub fn find_endpoint(&self, name: &str) -> Option<EndpointInfo> {
        self.endpoints.get(name).map(|e| e.info.clone())
    }

    pub fn create_endpoint(
        &mut self,
        request: &EndpointRequest,
    ) -> Result<EndpointInfo, HostServiceError> {
        if self.endpoints.contains_key(&request.name) {
            return Err(HostServiceError::AlreadyExists {
                kind: "endpoint",
                name: request.name.clone(),
            });
        }

        let network = self
            .networks
            .get(&request.network_name)
            .ok_or_else(|| HostServiceError::NotFound {
                kind: "network",
                name: request.network_name.clone(),
            })?;

        let ip_address = request.ip_address.ok_or_else(|| HostServiceError::MissingAddress {
            name: request.name.clone(),
        })?;

        let gateway = request
            .gateway
            .or(network.gateway)
            .or_else(|| first_host(ip_address.network()));

        let info = EndpointInfo {
            id: Uuid::new_v4().to_string(),
            name: request.name.clone(),
            network_name: request.network_name.clone(),
            ip_address,
            mac_address: request
                .mac_address
                .unwrap_or_else(|| MacAddress::from_ipv4(ip_address.ip())),
            gateway,
            dns_server_list: request.dns_server_list.clone(),
            dns_suffix: request.dns_suffix.clone(),
        };

        self.endpoints.insert(
            info.name.clone(),
            StoredEndpoint {
                info: info.clone(),
                attachments: BTreeSet::new(),
            },
        );
        Ok(info)
    }

    pub fn delete_endpoint(&mut self, id: &str) -> Result<(), HostServiceError> {
        let name = self.endpoint_name_by_id(id)?;
        self.endpoints.remove(&name);
        Ok(())
    }

    /// Attaching twice to the same target is a no-op.
    pub fn attach_endpoint(&mut self, id: &str, target: &AttachTarget) -> Result<(), HostServiceError> {
        let name = self.endpoint_name_by_id(id)?;
        if let Some(endpoint) = self.endpoints.get_mut(&name) {
            endpoint.attachments.insert(target.clone());
        }
        Ok(())
    }

    pub fn detach_endpoint(&mut self, id: &str, target: &AttachTarget) -> Result<(), HostServiceError> {
        let name = self.endpoint_name_by_id(id)?;
        let removed = self
            .endpoints
            .get_mut(&name)
            .map(|e| e.attachments.remove(target))
            .unwrap_or(false);

        if !removed {
            return Err(HostServiceError::TargetNotFound {
                target: target.to_string(),
            });
        }
        Ok(())
    }

    fn endpoint_name_by_id(&self, id: &str) -> Result<String, HostServiceError> {
        self.endpoints
            .values()
            .find(|e| e.info.id == id)
            .map(|e| e.info.name.clone())
            .ok_or_else(|| HostServiceError::NotFound {
                kind: "endpoint",
                name: id.to_string(),
            })
    }
}

/// First usable host of a subnet, the VPC router address.
fn first_host(network: Ipv4Addr) -> Option<Ipv4Addr> {
    u32::from(network).checked_add(1).map(Ipv4Addr::from)
}
