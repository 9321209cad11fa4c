//! Replies written to stdout for the container runtime

use crate::config::DnsConfig;
use crate::error::AppError;
use ipnetwork::Ipv4Network;
use serde::Serialize;
use std::io::{self, Write};
use std::net::Ipv4Addr;

/// Invocation protocol versions this plugin can answer with.
pub const SUPPORTED_VERSIONS: [&str; 4] = ["0.3.0", "0.3.1", "0.4.0", "1.0.0"];

/// Version used when the network configuration names none.
pub const DEFAULT_CNI_VERSION: &str = "1.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Interface {
    pub name: String,
    pub mac: String,
    pub sandbox: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IpConfig {
    /// Address family tag, always "4".
    pub version: String,
    pub interface: usize,
    pub address: Ipv4Network,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<Ipv4Addr>,
}

/// Result of a successful ADD
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CniResult {
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    pub interfaces: Vec<Interface>,
    pub ips: Vec<IpConfig>,
    #[serde(skip_serializing_if = "is_empty_dns")]
    pub dns: DnsConfig,
}

fn is_empty_dns(dns: &DnsConfig) -> bool {
    dns.nameservers.is_empty() && dns.search.is_empty()
}

/// Reply to a failed invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReply {
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    pub code: u32,
    pub msg: String,
}

impl ErrorReply {
    pub fn from_error(cni_version: &str, error: &AppError) -> Self {
        Self {
            cni_version: cni_version.to_string(),
            code: error.code(),
            msg: error.to_string(),
        }
    }
}

/// Network configuration version, for tagging error replies.
///
/// Falls back to the default when the configuration is missing or does not
/// decode, so that even early failures get a well-formed reply.
pub fn requested_cni_version(stdin_data: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(stdin_data)
        .ok()
        .and_then(|v| v.get("cniVersion").and_then(|v| v.as_str()).map(str::to_string))
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_CNI_VERSION.to_string())
}

/// Write the error reply for a failed invocation as one JSON line.
pub fn write_error_reply<W: Write>(out: &mut W, cni_version: &str, error: &AppError) -> io::Result<()> {
    let reply = ErrorReply::from_error(cni_version, error);
    serde_json::to_writer(&mut *out, &reply)?;
    writeln!(out)
}

/// Reply to VERSION
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionReply {
    #[serde(rename = "cniVersion")]
    pub cni_version: String,
    #[serde(rename = "supportedVersions")]
    pub supported_versions: Vec<String>,
}

impl Default for VersionReply {
    fn default() -> Self {
        Self {
            cni_version: DEFAULT_CNI_VERSION.to_string(),
            supported_versions: SUPPORTED_VERSIONS.iter().map(|v| v.to_string()).collect(),
        }
    }
}
