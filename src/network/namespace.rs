//! Namespace classification
//!
//! Maps the netns reference handed to the plugin onto an attachment mode and
//! the group identifier that names the endpoint shared by that group.

use crate::error::NamespaceError;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{error, info};

/// Prefixes marking a container that joins the netns of another container.
pub const SHARED_NAMESPACE_PREFIXES: [&str; 2] = ["container:", "shares-namespace-of:"];

/// Netns values meaning "no namespace yet".
const INFRA_NAMESPACE_VALUES: [&str; 2] = ["", "none"];

/// How an endpoint is bound to the workload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentMode {
    /// First container of the group; owns the network lifetime.
    Infra,
    /// Container reusing the namespace of an infra container.
    Shared,
    /// Namespace managed outside this plugin.
    ExternalNamespace,
}

impl AttachmentMode {
    /// Whether an existing endpoint needs no further attach call.
    pub fn is_self_attached(&self) -> bool {
        matches!(self, AttachmentMode::Infra | AttachmentMode::ExternalNamespace)
    }
}

/// Result of classifying a netns reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub mode: AttachmentMode,
    pub group_id: String,
}

fn scheme_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // A scheme is two or more word characters; single letters are drive paths.
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.+-]+:").expect("valid regex"))
}

/// Classify a netns reference.
///
/// `no_infra_container` forces external-namespace mode regardless of shape.
pub fn classify(
    netns: &str,
    container_id: &str,
    no_infra_container: bool,
) -> Result<Attachment, NamespaceError> {
    if no_infra_container {
        return Ok(Attachment {
            mode: AttachmentMode::ExternalNamespace,
            group_id: netns.to_string(),
        });
    }

    if INFRA_NAMESPACE_VALUES.contains(&netns) {
        return Ok(Attachment {
            mode: AttachmentMode::Infra,
            group_id: container_id.to_string(),
        });
    }

    for prefix in SHARED_NAMESPACE_PREFIXES {
        if let Some(infra_id) = netns.strip_prefix(prefix) {
            if infra_id.is_empty() {
                error!("Netns {} of container {} names no container", netns, container_id);
                return Err(NamespaceError::EmptyInfraContainerId {
                    netns: netns.to_string(),
                });
            }
            info!("Container {} shares netns of container {}", container_id, infra_id);
            return Ok(Attachment {
                mode: AttachmentMode::Shared,
                group_id: infra_id.to_string(),
            });
        }
    }

    if scheme_pattern().is_match(netns) {
        error!("Failed to parse netns {} of container {}", netns, container_id);
        return Err(NamespaceError::Unparseable {
            netns: netns.to_string(),
            container_id: container_id.to_string(),
        });
    }

    Ok(Attachment {
        mode: AttachmentMode::ExternalNamespace,
        group_id: netns.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_and_none_are_infra() {
        for netns in ["", "none"] {
            let attachment = classify(netns, "c1", false).unwrap();
            assert_eq!(attachment.mode, AttachmentMode::Infra);
            assert_eq!(attachment.group_id, "c1");
        }
    }

    #[test]
    fn test_shared_prefixes() {
        let attachment = classify("shares-namespace-of:c1", "c2", false).unwrap();
        assert_eq!(attachment.mode, AttachmentMode::Shared);
        assert_eq!(attachment.group_id, "c1");

        let attachment = classify("container:abc123", "c2", false).unwrap();
        assert_eq!(attachment.mode, AttachmentMode::Shared);
        assert_eq!(attachment.group_id, "abc123");
    }

    #[test]
    fn test_shared_prefix_without_id_fails() {
        let result = classify("container:", "c2", false);
        assert!(matches!(
            result,
            Err(NamespaceError::EmptyInfraContainerId { .. })
        ));
    }

    #[test]
    fn test_opaque_references_are_external() {
        for netns in [
            "/var/run/netns/task-1",
            "5ae4a4c4-1f2b-4a6e-9a8f-0c2a31f1c0de",
            "C:\\netns\\task",
        ] {
            let attachment = classify(netns, "c1", false).unwrap();
            assert_eq!(attachment.mode, AttachmentMode::ExternalNamespace);
            assert_eq!(attachment.group_id, netns);
        }
    }

    #[test]
    fn test_unknown_scheme_is_unparseable() {
        let result = classify("pid:1234", "c1", false);
        assert_eq!(
            result,
            Err(NamespaceError::Unparseable {
                netns: "pid:1234".to_string(),
                container_id: "c1".to_string(),
            })
        );
    }

    #[test]
    fn test_no_infra_container_forces_external() {
        let attachment = classify("container:c1", "c2", true).unwrap();
        assert_eq!(attachment.mode, AttachmentMode::ExternalNamespace);
        assert_eq!(attachment.group_id, "container:c1");
    }

    #[test]
    fn test_self_attached_modes() {
        assert!(AttachmentMode::Infra.is_self_attached());
        assert!(AttachmentMode::ExternalNamespace.is_self_attached());
        assert!(!AttachmentMode::Shared.is_self_attached());
    }
}
