//! Error types for the discovery service

use std::net::SocketAddr;
use thiserror::Error;

/// Result type alias for discovery operations
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors that can occur while starting or stopping discovery.
///
/// Failures inside the running loops never surface here; they are logged
/// and the loop carries on.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Invalid service configuration
    #[error("Invalid discovery configuration: {0}")]
    InvalidConfig(String),

    /// A discovery socket could not be created or bound
    #[error("Failed to bind {role} socket on {addr}: {source}")]
    BindFailed {
        role: SocketRole,
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Discovery service already started
    #[error("Discovery service is already running")]
    AlreadyStarted,

    /// The service was stopped; a new instance is needed to run again
    #[error("Discovery service has been stopped and cannot be restarted")]
    Terminated,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which of the two discovery sockets an error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketRole {
    Announcer,
    Listener,
}

impl std::fmt::Display for SocketRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SocketRole::Announcer => f.write_str("announcer"),
            SocketRole::Listener => f.write_str("listener"),
        }
    }
}
