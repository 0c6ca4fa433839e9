//! API request and response types

use chrono::{DateTime, Utc};
use lanshare_discovery::PeerInfo;
use serde::{Deserialize, Serialize};

// ============================================================================
// Node
// ============================================================================

/// Reply of `GET /api/info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoResponse {
    /// Address this node advertises on the LAN
    pub local_ip: String,

    /// HTTP port of the catalog
    pub port: u16,
}

/// One entry of `GET /api/peers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerEntry {
    pub ip: String,
    pub url: String,
}

impl From<PeerInfo> for PeerEntry {
    fn from(peer: PeerInfo) -> Self {
        Self {
            ip: peer.address,
            url: peer.url,
        }
    }
}

// ============================================================================
// Files
// ============================================================================

/// A regular file in the shared folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,

    /// Size in bytes
    pub size: u64,

    /// Modification time, whole seconds since the Unix epoch
    pub mtime: u64,
}

/// Reply of `GET /api/storage`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageResponse {
    /// Bytes used by the shared files
    pub used: u64,

    /// `used` in binary units, e.g. `"1.50 MB"`
    pub used_human: String,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
