//! Host network service backed by a JSON state file
//!
//! Every call takes an exclusive `flock` on a sibling lock file, loads the
//! state, applies one change and writes it back through a temp file rename.
//! Concurrent plugin invocations therefore observe each other's changes.

use crate::error::HostServiceError;
use crate::host::state::HostState;
use crate::host::{
    AttachTarget, EndpointInfo, EndpointRequest, HostNetworkService, HostServiceVersion,
    NetworkInfo, NetworkRequest,
};
use async_trait::async_trait;
use nix::fcntl::{Flock, FlockArg};
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::{debug, info};

/// Version reported by the file backed service.
pub const STATE_FILE_SERVICE_VERSION: HostServiceVersion = HostServiceVersion::new(9, 2);

/// File backed host network service
pub struct StateFileHostService {
    path: PathBuf,
}

impl StateFileHostService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".lock");
        PathBuf::from(name)
    }

    fn lock(&self) -> Result<Flock<File>, HostServiceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;

        Flock::lock(file, FlockArg::LockExclusive)
            .map_err(|(_, errno)| HostServiceError::Lock(errno.to_string()))
    }

    fn load(&self) -> Result<HostState, HostServiceError> {
        match fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(HostState::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(HostState::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, state: &HostState) -> Result<(), HostServiceError> {
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn read<R>(&self, f: impl FnOnce(&HostState) -> R) -> Result<R, HostServiceError> {
        let _guard = self.lock()?;
        let state = self.load()?;
        Ok(f(&state))
    }

    fn update<R>(
        &self,
        f: impl FnOnce(&mut HostState) -> Result<R, HostServiceError>,
    ) -> Result<R, HostServiceError> {
        let _guard = self.lock()?;
        let mut state = self.load()?;
        let result = f(&mut state)?;
        self.save(&state)?;
        Ok(result)
    }
}

#[async_trait]
impl HostNetworkService for StateFileHostService {
    async fn version(&self) -> Result<HostServiceVersion, HostServiceError> {
        Ok(STATE_FILE_SERVICE_VERSION)
    }

    async fn find_network(&self, name: &str) -> Result<Option<NetworkInfo>, HostServiceError> {
        self.read(|state| state.find_network(name))
    }

    async fn create_network(&self, request: &NetworkRequest) -> Result<NetworkInfo, HostServiceError> {
        let info = self.update(|state| state.create_network(request))?;
        info!("Created network {} with id {}", info.name, info.id);
        Ok(info)
    }

    async fn delete_network(&self, id: &str) -> Result<(), HostServiceError> {
        self.update(|state| state.delete_network(id))?;
        info!("Deleted network {}", id);
        Ok(())
    }

    async fn find_endpoint(&self, name: &str) -> Result<Option<EndpointInfo>, HostServiceError> {
        self.read(|state| state.find_endpoint(name))
    }

    async fn create_endpoint(
        &self,
        request: &EndpointRequest,
    ) -> Result<EndpointInfo, HostServiceError> {
        let info = self.update(|state| state.create_endpoint(request))?;
        info!("Created endpoint {} with id {}", info.name, info.id);
        Ok(info)
    }

    async fn delete_endpoint(&self, id: &str) -> Result<(), HostServiceError> {
        self.update(|state| state.delete_endpoint(id))?;
        info!("Deleted endpoint {}", id);
        Ok(())
    }

    async fn attach_endpoint(
        &self,
        id: &str,
        target: &AttachTarget,
    ) -> Result<(), HostServiceError> {
        debug!("Attaching endpoint {} to {}", id, target);
        self.update(|state| state.attach_endpoint(id, target))
    }

    async fn detach_endpoint(
        &self,
        id: &str,
        target: &AttachTarget,
    ) -> Result<(), HostServiceError> {
        debug!("Detaching endpoint {} from {}", id, target);
        self.update(|state| state.detach_endpoint(id, target))
    }
}
