//! In-memory host network service with failure injection

use crate::error::{HostServiceError, NetworkError};
use crate::host::interface::InterfaceController;
use crate::host::state::HostState;
use crate::host::{
    AttachTarget, EndpointInfo, EndpointRequest, HostNetworkService, HostServiceVersion,
    NetworkInfo, NetworkRequest,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Host network service keeping its state in memory
pub struct InMemoryHostService {
    state: Mutex<HostState>,
    calls: Mutex<Vec<String>>,
    version: HostServiceVersion,
    pub fail_attach: AtomicBool,
    /// Next create hits a name collision after another invocation won the race.
    pub race_next_create: AtomicBool,
}

impl InMemoryHostService {
    pub fn new() -> Self {
        Self::with_version(HostServiceVersion::new(9, 2))
    }

    pub fn with_version(version: HostServiceVersion) -> Self {
        Self {
            state: Mutex::new(HostState::default()),
            calls: Mutex::new(Vec::new()),
            version,
            fail_attach: AtomicBool::new(false),
            race_next_create: AtomicBool::new(false),
        }
    }

    /// Calls made so far, e.g. `create_network task-br-…`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn attachments(&self, endpoint_name: &str) -> Vec<AttachTarget> {
        self.state
            .lock()
            .unwrap()
            .endpoints
            .get(endpoint_name)
            .map(|e| e.attachments.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Seed state directly, bypassing call recording.
    pub fn seed(&self, f: impl FnOnce(&mut HostState)) {
        f(&mut self.state.lock().unwrap());
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn take_race(&self) -> bool {
        self.race_next_create.swap(false, Ordering::SeqCst)
    }
}

#[async_trait]
impl HostNetworkService for InMemoryHostService {
    async fn version(&self) -> Result<HostServiceVersion, HostServiceError> {
        Ok(self.version)
    }

    async fn find_network(&self, name: &str) -> Result<Option<NetworkInfo>, HostServiceError> {
        self.record(format!("find_network {}", name));
        Ok(self.state.lock().unwrap().find_network(name))
    }

    async fn create_network(&self, request: &NetworkRequest) -> Result<NetworkInfo, HostServiceError> {
        self.record(format!("create_network {}", request.name));
        let mut state = self.state.lock().unwrap();
        if self.take_race() {
            state.create_network(request)?;
        }
        state.create_network(request)
    }

    async fn delete_network(&self, id: &str) -> Result<(), HostServiceError> {
        self.record(format!("delete_network {}", id));
        self.state.lock().unwrap().delete_network(id)
    }

    async fn find_endpoint(&self, name: &str) -> Result<Option<EndpointInfo>, HostServiceError> {
        self.record(format!("find_endpoint {}", name));
        Ok(self.state.lock().unwrap().find_endpoint(name))
    }

    async fn create_endpoint(
        &self,
        request: &EndpointRequest,
    ) -> Result<EndpointInfo, HostServiceError> {
        self.record(format!("create_endpoint {}", request.name));
        let mut state = self.state.lock().unwrap();
        if self.take_race() {
            state.create_endpoint(request)?;
        }
        state.create_endpoint(request)
    }

    async fn delete_endpoint(&self, id: &str) -> Result<(), HostServiceError> {
        self.record(format!("delete_endpoint {}", id));
        self.state.lock().unwrap().delete_endpoint(id)
    }

    async fn attach_endpoint(
        &self,
        id: &str,
        target: &AttachTarget,
    ) -> Result<(), HostServiceError> {
        self.record(format!("attach_endpoint {} {}", id, target));
        if self.fail_attach.load(Ordering::SeqCst) {
            return Err(HostServiceError::Backend("attach rejected".to_string()));
        }
        self.state.lock().unwrap().attach_endpoint(id, target)
    }

    async fn detach_endpoint(
        &self,
        id: &str,
        target: &AttachTarget,
    ) -> Result<(), HostServiceError> {
        self.record(format!("detach_endpoint {} {}", id, target));
        self.state.lock().unwrap().detach_endpoint(id, target)
    }
}

#[async_trait]
impl<T: HostNetworkService + ?Sized> HostNetworkService for Arc<T> {
    async fn version(&self) -> Result<HostServiceVersion, HostServiceError> {
        (**self).version().await
    }

    async fn find_network(&self, name: &str) -> Result<Option<NetworkInfo>, HostServiceError> {
        (**self).find_network(name).await
    }

    async fn create_network(&self, request: &NetworkRequest) -> Result<NetworkInfo, HostServiceError> {
        (**self).create_network(request).await
    }

    async fn delete_network(&self, id: &str) -> Result<(), HostServiceError> {
        (**self).delete_network(id).await
    }

    async fn find_endpoint(&self, name: &str) -> Result<Option<EndpointInfo>, HostServiceError> {
        (**self).find_endpoint(name).await
    }

    async fn create_endpoint(
        &self,
        request: &EndpointRequest,
    ) -> Result<EndpointInfo, HostServiceError> {
        (**self).create_endpoint(request).await
    }

    async fn delete_endpoint(&self, id: &str) -> Result<(), HostServiceError> {
        (**self).delete_endpoint(id).await
    }

    async fn attach_endpoint(
        &self,
        id: &str,
        target: &AttachTarget,
    ) -> Result<(), HostServiceError> {
        (**self).attach_endpoint(id, target).await
    }

    async fn detach_endpoint(
        &self,
        id: &str,
        target: &AttachTarget,
    ) -> Result<(), HostServiceError> {
        (**self).detach_endpoint(id, target).await
    }
}

/// Interface controller recording what it was asked to disable
pub struct RecordingInterfaceController {
    disabled: Mutex<Vec<String>>,
    pub fail: AtomicBool,
}

impl RecordingInterfaceController {
    pub fn new() -> Self {
        Self {
            disabled: Mutex::new(Vec::new()),
            fail: AtomicBool::new(false),
        }
    }

    pub fn disabled(&self) -> Vec<String> {
        self.disabled.lock().unwrap().clone()
    }
}

#[async_trait]
impl InterfaceController for RecordingInterfaceController {
    async fn disable_interface(&self, name: &str) -> Result<(), NetworkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NetworkError::InterfaceDisable {
                name: name.to_string(),
                reason: "interface not found".to_string(),
            });
        }
        self.disabled.lock().unwrap().push(name.to_string());
        Ok(())
    }
}

#[async_trait]
impl<T: InterfaceController + ?Sized> InterfaceController for Arc<T> {
    async fn disable_interface(&self, name: &str) -> Result<(), NetworkError> {
        (**self).disable_interface(name).await
    }
}
