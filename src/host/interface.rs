//! Host interface control using rtnetlink

use crate::error::NetworkError;
use async_trait::async_trait;
use futures_util::stream::TryStreamExt;
use rtnetlink::{new_connection, LinkUnspec};
use tracing::info;

/// Controls interfaces in the host's root namespace
#[async_trait]
pub trait InterfaceController: Send + Sync {
    /// Administratively disable an interface. A missing interface is an error.
    async fn disable_interface(&self, name: &str) -> Result<(), NetworkError>;
}

/// Interface controller talking rtnetlink to the kernel
pub struct RtNetlinkInterfaceController;

impl RtNetlinkInterfaceController {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RtNetlinkInterfaceController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InterfaceController for RtNetlinkInterfaceController {
    async fn disable_interface(&self, name: &str) -> Result<(), NetworkError> {
        let disable_error = |reason: String| NetworkError::InterfaceDisable {
            name: name.to_string(),
            reason,
        };

        let (connection, handle, _) = new_connection().map_err(|e| disable_error(e.to_string()))?;
        tokio::spawn(connection);

        let link = handle
            .link()
            .get()
            .match_name(name.to_string())
            .execute()
            .try_next()
            .await
            .map_err(|e| disable_error(e.to_string()))?
            .ok_or_else(|| disable_error("interface not found".to_string()))?;

        info!("Disabling management interface {} in the host namespace", name);
        handle
            .link()
            .set(LinkUnspec::new_with_index(link.header.index).down().build())
            .execute()
            .await
            .map_err(|e| disable_error(e.to_string()))
    }
}
