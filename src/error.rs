//! Centralized error types and handling

use thiserror::Error;

/// Main application error type
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network operation error: {0}")]
    Network(#[from] NetworkError),

    #[error("Host network service error: {0}")]
    HostService(#[from] HostServiceError),

    #[error("Failed to encode result: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Numeric error code reported to the container runtime.
    ///
    /// Codes below 100 are reserved by the invocation protocol; 100 and
    /// above are plugin specific.
    pub fn code(&self) -> u32 {
        match self {
            AppError::Config(ConfigError::MissingEnv { .. }) => 4,
            AppError::Config(ConfigError::UnsupportedCommand(_)) => 4,
            AppError::Config(ConfigError::InvalidFormat(_)) => 6,
            AppError::Config(_) => 7,
            AppError::Network(NetworkError::Namespace(_)) => 7,
            AppError::Network(NetworkError::InvalidSpec(_)) => 7,
            AppError::Network(NetworkError::VersionUnsupported { .. }) => 101,
            AppError::Network(NetworkError::NetworkNotFound { .. }) => 102,
            AppError::Network(NetworkError::EndpointNotFound { .. }) => 102,
            AppError::Network(NetworkError::CreateFailed { .. }) => 103,
            AppError::Network(NetworkError::AttachFailed { .. }) => 104,
            AppError::Network(NetworkError::InterfaceDisable { .. }) => 105,
            AppError::Network(NetworkError::HostService(_)) | AppError::HostService(_) => 106,
            AppError::Serialization(_) | AppError::Io(_) => 999,
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid configuration format: {0}")]
    InvalidFormat(String),

    #[error("Missing required configuration: {field}")]
    MissingRequired { field: String },

    #[error("Configuration validation error: {0}")]
    ValidationError(String),

    #[error("Missing required environment variable: {name}")]
    MissingEnv { name: String },

    #[error("Unsupported command: {0}")]
    UnsupportedCommand(String),
}

/// Namespace classification errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum NamespaceError {
    #[error("Failed to parse netns {netns} of container {container_id}")]
    Unparseable { netns: String, container_id: String },

    #[error("Netns {netns} does not name the container it shares")]
    EmptyInfraContainerId { netns: String },
}

/// Errors reported by the host network service
#[derive(Debug, Error)]
pub enum HostServiceError {
    #[error("{kind} not found: {name}")]
    NotFound { kind: &'static str, name: String },

    #[error("{kind} already exists: {name}")]
    AlreadyExists { kind: &'static str, name: String },

    #[error("Network {name} still has endpoints")]
    InUse { name: String },

    #[error("Attachment target does not exist: {target}")]
    TargetNotFound { target: String },

    #[error("No IP address supplied for endpoint {name}")]
    MissingAddress { name: String },

    #[error("Failed to lock host state: {0}")]
    Lock(String),

    #[error("Host state IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Host state is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Host network service failure: {0}")]
    Backend(String),
}

/// Network and endpoint orchestration errors
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Host network service {found} is older than the minimum supported version {required}")]
    VersionUnsupported { found: String, required: String },

    #[error("Network not found: {name}")]
    NetworkNotFound { name: String },

    #[error("Endpoint not found: {name}")]
    EndpointNotFound { name: String },

    #[error("Failed to create {kind} {name}: {source}")]
    CreateFailed {
        kind: &'static str,
        name: String,
        #[source]
        source: HostServiceError,
    },

    #[error("Failed to attach endpoint {endpoint} to {target}: {source}")]
    AttachFailed {
        endpoint: String,
        target: String,
        #[source]
        source: HostServiceError,
    },

    #[error("Failed to disable interface {name}: {reason}")]
    InterfaceDisable { name: String, reason: String },

    #[error("Invalid network description: {0}")]
    InvalidSpec(String),

    #[error(transparent)]
    Namespace(#[from] NamespaceError),

    #[error(transparent)]
    HostService(#[from] HostServiceError),
}
