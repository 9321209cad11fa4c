//! ADD and DEL lifecycle handling
//!
//! Sequences the network and endpoint orchestrators and translates their
//! results to and from the invocation protocol.

use crate::config::env::{CmdArgs, Command};
use crate::config::NetConfig;
use crate::error::AppError;
use crate::network::{
    BestEffort, EndpointSpec, Eni, NetworkBuilder, NetworkSpec,
};
use tracing::{error, info};

pub mod result;

use result::{CniResult, Interface, IpConfig, VersionReply, DEFAULT_CNI_VERSION};

/// Reply produced by a successful invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Added(CniResult),
    Deleted,
    Version(VersionReply),
}

/// The plugin, holding the builder selected at start-up
pub struct Plugin {
    builder: Box<dyn NetworkBuilder>,
}

impl Plugin {
    pub fn new(builder: Box<dyn NetworkBuilder>) -> Self {
        Self { builder }
    }

    /// Dispatch one invocation.
    pub async fn run(&self, args: &CmdArgs) -> Result<Reply, AppError> {
        match args.command {
            Command::Add => self.add(args).await.map(Reply::Added),
            Command::Del => self.del(args).await.map(|()| Reply::Deleted),
            Command::Version => Ok(Reply::Version(VersionReply::default())),
        }
    }

    /// ADD command handler.
    pub async fn add(&self, args: &CmdArgs) -> Result<CniResult, AppError> {
        let net_config = parse_config(args)?;

        info!(
            "Executing ADD with netconfig: {:?} ContainerID:{} Netns:{} IfName:{} Args:{}",
            net_config, args.container_id, args.netns, args.if_name, args.args
        );

        let network_spec = network_spec(&net_config);
        let network = self
            .builder
            .find_or_create_network(&network_spec)
            .await
            .inspect_err(|e| error!("Failed to create network: {}", e))?;

        let endpoint = self
            .builder
            .find_or_create_endpoint(&network, &endpoint_spec(&net_config, args))
            .await
            .inspect_err(|e| error!("Failed to create endpoint: {}", e))?;

        let cni_version = if net_config.cni_version.is_empty() {
            DEFAULT_CNI_VERSION.to_string()
        } else {
            net_config.cni_version.clone()
        };

        let result = CniResult {
            cni_version,
            interfaces: vec![Interface {
                name: args.if_name.clone(),
                mac: endpoint.mac_address.to_string(),
                sandbox: args.netns.clone(),
            }],
            ips: vec![IpConfig {
                version: "4".to_string(),
                interface: 0,
                address: endpoint.ip_address,
                gateway: endpoint.gateway.or(network.gateway),
            }],
            dns: net_config.dns.clone(),
        };

        info!("ADD completed: {:?}", result);
        Ok(result)
    }

    /// DEL command handler.
    ///
    /// Endpoint removal is best effort; a network that cannot be removed is
    /// surfaced since it would leak.
    pub async fn del(&self, args: &CmdArgs) -> Result<(), AppError> {
        let net_config = parse_config(args)?;

        info!(
            "Executing DEL with netconfig: {:?} ContainerID:{} Netns:{} IfName:{} Args:{}",
            net_config, args.container_id, args.netns, args.if_name, args.args
        );

        let network_spec = network_spec(&net_config);
        let removal = self
            .builder
            .delete_endpoint(&network_spec, &endpoint_spec(&net_config, args))
            .await;

        if let BestEffort::Logged(e) = &removal.outcome {
            error!("Failed to delete endpoint, ignoring: {}", e);
        }

        if !network_spec.should_exist && removal.network_deletable {
            self.builder
                .delete_network(&network_spec)
                .await
                .inspect_err(|e| error!("Failed to delete network: {}", e))?;
        } else {
            info!("Leaving network in place for other containers");
        }

        info!("Execution of DEL completed");
        Ok(())
    }
}

fn parse_config(args: &CmdArgs) -> Result<NetConfig, AppError> {
    NetConfig::parse(&args.stdin_data, &args.netns).map_err(|e| {
        error!("Failed to parse netconfig from args: {}", e);
        AppError::from(e)
    })
}

fn network_spec(config: &NetConfig) -> NetworkSpec {
    let eni = match (&config.eni_name, config.eni_mac_address) {
        (Some(link_name), Some(mac_address)) => Some(Eni {
            link_name: link_name.clone(),
            mac_address,
        }),
        _ => None,
    };

    NetworkSpec {
        name: config.name.clone(),
        eni,
        ip_address: config.eni_ip_address,
        gateway: config.gateway_ip_address,
        dns_servers: config.dns.nameservers.clone(),
        dns_search: config.dns.search.clone(),
        should_exist: config.use_existing_network,
    }
}

fn endpoint_spec(config: &NetConfig, args: &CmdArgs) -> EndpointSpec {
    EndpointSpec {
        container_id: args.container_id.clone(),
        netns: args.netns.clone(),
        ip_address: config.eni_ip_address,
        mac_address: config.eni_mac_address,
        no_infra_container: config.no_infra_container,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, NetworkError};
    use crate::host::memory::{InMemoryHostService, RecordingInterfaceController};
    use crate::host::{AttachTarget, HostNetworkService, HostServiceVersion};
    use crate::network::builder::DEFAULT_MANAGEMENT_INTERFACE_FORMAT;
    use crate::network::{HostServiceBuilder, PassthroughBuilder};
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    const NETWORK: &str = "task-br-020000000001";

    const CONFIG: &str = r#"{
        "cniVersion": "0.3.1",
        "name": "vpc-eni",
        "type": "vpc-eni",
        "useExistingNetwork": false,
        "eniName": "eni0",
        "eniMAC": "02:00:00:00:00:01",
        "eniIP": "10.0.0.5/24"
    }"#;

    fn plugin() -> (Plugin, Arc<InMemoryHostService>, Arc<RecordingInterfaceController>) {
        let service = Arc::new(InMemoryHostService::new());
        let interfaces = Arc::new(RecordingInterfaceController::new());
        let builder = HostServiceBuilder::new(
            Arc::clone(&service),
            Arc::clone(&interfaces),
            HostServiceVersion::new(7, 2),
            DEFAULT_MANAGEMENT_INTERFACE_FORMAT.to_string(),
        );
        (Plugin::new(Box::new(builder)), service, interfaces)
    }

    fn args(command: Command, container_id: &str, netns: &str, config: &str) -> CmdArgs {
        CmdArgs {
            command,
            container_id: container_id.to_string(),
            netns: netns.to_string(),
            if_name: "eth0".to_string(),
            args: String::new(),
            path: "/opt/cni/bin".to_string(),
            stdin_data: config.as_bytes().to_vec(),
        }
    }

    #[tokio::test]
    async fn test_add_creates_network_and_infra_endpoint() {
        let (plugin, service, interfaces) = plugin();

        let result = plugin.add(&args(Command::Add, "c1", "", CONFIG)).await.unwrap();

        assert_eq!(result.cni_version, "0.3.1");
        assert_eq!(result.interfaces[0].name, "eth0");
        assert_eq!(result.interfaces[0].mac, "02:00:00:00:00:01");
        assert_eq!(result.ips[0].version, "4");
        assert_eq!(result.ips[0].address.to_string(), "10.0.0.5/24");
        assert_eq!(result.ips[0].gateway, Some("10.0.0.1".parse().unwrap()));

        assert!(service.find_network(NETWORK).await.unwrap().is_some());
        assert!(service
            .find_endpoint(&format!("{}-ep-c1", NETWORK))
            .await
            .unwrap()
            .is_some());
        assert_eq!(interfaces.disabled(), vec!["vEthernet (eni0)".to_string()]);
    }

    #[tokio::test]
    async fn test_add_twice_is_idempotent() {
        let (plugin, service, _) = plugin();

        let first = plugin.add(&args(Command::Add, "c1", "", CONFIG)).await.unwrap();
        let second = plugin.add(&args(Command::Add, "c1", "", CONFIG)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(service.count_calls("create_network"), 1);
        assert_eq!(service.count_calls("create_endpoint"), 1);
    }

    #[tokio::test]
    async fn test_shared_container_reuses_network_and_endpoint() {
        let (plugin, service, _) = plugin();
        plugin.add(&args(Command::Add, "c1", "", CONFIG)).await.unwrap();

        let result = plugin
            .add(&args(Command::Add, "c2", "shares-namespace-of:c1", CONFIG))
            .await
            .unwrap();

        assert_eq!(result.ips[0].address.to_string(), "10.0.0.5/24");
        assert_eq!(service.count_calls("create_network"), 1);
        assert_eq!(service.count_calls("create_endpoint"), 1);
        assert_eq!(service.attachments(&format!("{}-ep-c1", NETWORK)).len(), 2);
    }

    #[tokio::test]
    async fn test_del_shared_then_infra() {
        let (plugin, service, _) = plugin();
        plugin.add(&args(Command::Add, "c1", "", CONFIG)).await.unwrap();
        plugin
            .add(&args(Command::Add, "c2", "shares-namespace-of:c1", CONFIG))
            .await
            .unwrap();

        plugin
            .del(&args(Command::Del, "c2", "shares-namespace-of:c1", CONFIG))
            .await
            .unwrap();

        assert_eq!(service.count_calls("delete_network"), 0);
        assert_eq!(service.count_calls("delete_endpoint"), 0);
        assert!(service.find_network(NETWORK).await.unwrap().is_some());

        plugin.del(&args(Command::Del, "c1", "", CONFIG)).await.unwrap();

        assert!(service
            .find_endpoint(&format!("{}-ep-c1", NETWORK))
            .await
            .unwrap()
            .is_none());
        assert!(service.find_network(NETWORK).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_and_del_without_infra_container() {
        let (plugin, service, _) = plugin();
        let netns = "5ae4a4c4-1f2b-4a6e-9a8f-0c2a31f1c0de";
        let config = CONFIG.replace(
            r#""useExistingNetwork": false,"#,
            r#""useExistingNetwork": false, "noInfraContainer": true,"#,
        );
        let endpoint = format!("{}-ep-{}", NETWORK, netns);

        let result = plugin.add(&args(Command::Add, "c1", netns, &config)).await.unwrap();

        assert_eq!(result.interfaces[0].sandbox, netns);
        assert_eq!(
            service.attachments(&endpoint),
            vec![AttachTarget::Namespace(netns.to_string())]
        );

        plugin.del(&args(Command::Del, "c1", netns, &config)).await.unwrap();

        assert!(service.attachments(&endpoint).is_empty());
        assert_eq!(service.count_calls("delete_endpoint"), 0);
        assert_eq!(service.count_calls("delete_network"), 0);
        assert!(service.find_network(NETWORK).await.unwrap().is_some());

        // A repeated DEL finds the namespace already detached.
        plugin.del(&args(Command::Del, "c1", netns, &config)).await.unwrap();
        assert_eq!(service.count_calls("delete_network"), 0);
    }

    #[tokio::test]
    async fn test_add_attach_failure_keeps_network() {
        let (plugin, service, _) = plugin();
        service.fail_attach.store(true, Ordering::SeqCst);

        let result = plugin.add(&args(Command::Add, "c1", "", CONFIG)).await;

        assert!(matches!(
            result,
            Err(AppError::Network(NetworkError::AttachFailed { .. }))
        ));
        assert!(service.find_network(NETWORK).await.unwrap().is_some());
        assert!(service
            .find_endpoint(&format!("{}-ep-c1", NETWORK))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_add_rejects_invalid_config() {
        let (plugin, service, _) = plugin();

        let result = plugin
            .add(&args(Command::Add, "c1", "", r#"{"eniName": "eni0"}"#))
            .await;

        assert!(matches!(
            result,
            Err(AppError::Config(ConfigError::MissingRequired { .. }))
        ));
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn test_del_with_existing_network_leaves_it() {
        let (plugin, service, _) = plugin();
        let config = r#"{"name": "nat", "useExistingNetwork": true, "eniIPAddress": "10.0.0.5/24"}"#;
        service.seed(|state| {
            state
                .create_network(&crate::host::NetworkRequest {
                    name: "nat".to_string(),
                    network_type: crate::host::NetworkType::Transparent,
                    adapter_name: None,
                    address_prefix: None,
                    gateway: None,
                })
                .unwrap();
        });

        let result = plugin.add(&args(Command::Add, "c1", "", config)).await.unwrap();
        assert_eq!(result.ips[0].address.to_string(), "10.0.0.5/24");
        assert_eq!(service.count_calls("create_network"), 0);

        plugin.del(&args(Command::Del, "c1", "", config)).await.unwrap();
        assert_eq!(service.count_calls("delete_network"), 0);
        assert!(service.find_network("nat").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_del_surfaces_network_delete_failure() {
        let (plugin, service, _) = plugin();
        plugin.add(&args(Command::Add, "c1", "", CONFIG)).await.unwrap();
        // A second group keeps the network busy.
        service.seed(|state| {
            state
                .create_endpoint(&crate::host::EndpointRequest {
                    name: format!("{}-ep-other", NETWORK),
                    network_name: NETWORK.to_string(),
                    dns_server_list: String::new(),
                    dns_suffix: String::new(),
                    mac_address: None,
                    ip_address: Some("10.0.0.6/24".parse().unwrap()),
                    gateway: None,
                    namespace: None,
                    container: None,
                })
                .unwrap();
        });

        let result = plugin.del(&args(Command::Del, "c1", "", CONFIG)).await;

        assert!(matches!(
            result,
            Err(AppError::Network(NetworkError::HostService(_)))
        ));
    }

    #[tokio::test]
    async fn test_del_ignores_missing_endpoint() {
        let (plugin, service, _) = plugin();

        plugin.del(&args(Command::Del, "c1", "", CONFIG)).await.unwrap();

        assert_eq!(service.count_calls("delete_network"), 0);
    }

    #[tokio::test]
    async fn test_run_version() {
        let plugin = Plugin::new(Box::new(PassthroughBuilder::new()));
        let reply = plugin.run(&args(Command::Version, "", "", "")).await.unwrap();
        assert!(matches!(reply, Reply::Version(_)));
    }

    #[tokio::test]
    async fn test_run_add_with_passthrough() {
        let plugin = Plugin::new(Box::new(PassthroughBuilder::new()));
        let reply = plugin.run(&args(Command::Add, "c1", "", CONFIG)).await.unwrap();
        match reply {
            Reply::Added(result) => {
                assert_eq!(result.ips[0].address.to_string(), "10.0.0.5/24");
                assert_eq!(result.ips[0].gateway, None);
            }
            other => panic!("unexpected reply {:?}", other),
        }
    }
}
