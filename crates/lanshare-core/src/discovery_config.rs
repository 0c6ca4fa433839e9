//! Configuration types for LAN peer discovery

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;

/// Configuration for the UDP broadcast discovery service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Enable peer discovery
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// UDP port announcements are sent to and received on
    #[serde(default = "default_discovery_port")]
    pub discovery_port: u16,

    /// HTTP port advertised in announcements
    #[serde(default = "default_service_port")]
    pub service_port: u16,

    /// Delay between two announcements (milliseconds)
    #[serde(default = "default_announce_interval")]
    pub announce_interval_ms: u64,

    /// Age after which a silent peer is evicted (milliseconds)
    #[serde(default = "default_peer_expiry")]
    pub peer_expiry_ms: u64,

    /// Upper bound on a single blocking receive (milliseconds)
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_ms: u64,

    /// Address the listener socket binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: Ipv4Addr,

    /// Network broadcast address; derived from the local address when unset
    #[serde(default)]
    pub broadcast_addr: Option<Ipv4Addr>,

    /// Prefix length used to derive the network broadcast address
    #[serde(default = "default_subnet_prefix_len")]
    pub subnet_prefix_len: u8,

    /// Address announced for this node; resolved automatically when unset
    #[serde(default)]
    pub local_address: Option<String>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            discovery_port: default_discovery_port(),
            service_port: default_service_port(),
            announce_interval_ms: default_announce_interval(),
            peer_expiry_ms: default_peer_expiry(),
            receive_timeout_ms: default_receive_timeout(),
            bind_addr: default_bind_addr(),
            broadcast_addr: None,
            subnet_prefix_len: default_subnet_prefix_len(),
            local_address: None,
        }
    }
}

impl DiscoveryConfig {
    /// Returns the announce interval as a Duration
    pub fn announce_interval(&self) -> Duration {
        Duration::from_millis(self.announce_interval_ms)
    }

    /// Returns the peer expiry threshold as a Duration
    pub fn peer_expiry(&self) -> Duration {
        Duration::from_millis(self.peer_expiry_ms)
    }

    /// Returns the receive timeout as a Duration
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.discovery_port == 0 {
            return Err("discovery_port cannot be 0".to_string());
        }

        if self.service_port == 0 {
            return Err("service_port cannot be 0".to_string());
        }

        if self.announce_interval_ms == 0 {
            return Err("announce_interval_ms cannot be 0".to_string());
        }

        if self.receive_timeout_ms == 0 {
            return Err("receive_timeout_ms cannot be 0".to_string());
        }

        // A peer must survive at least one missed announcement
        if self.peer_expiry_ms <= self.announce_interval_ms {
            return Err(format!(
                "peer_expiry_ms ({}) must be greater than announce_interval_ms ({})",
                self.peer_expiry_ms, self.announce_interval_ms
            ));
        }

        if self.subnet_prefix_len > 32 {
            return Err(format!(
                "subnet_prefix_len must be between 0 and 32, got {}",
                self.subnet_prefix_len
            ));
        }

        if let Some(address) = &self.local_address {
            if address.is_empty() {
                return Err("local_address cannot be empty".to_string());
            }
            if address.contains(':') {
                return Err(format!(
                    "local_address '{}' cannot contain ':' (field delimiter)",
                    address
                ));
            }
        }

        Ok(())
    }
}

// Default configuration values
fn default_enabled() -> bool {
    true
}

fn default_discovery_port() -> u16 {
    37020
}

fn default_service_port() -> u16 {
    8000
}

fn default_announce_interval() -> u64 {
    5_000
}

fn default_peer_expiry() -> u64 {
    25_000
}

fn default_receive_timeout() -> u64 {
    1_000
}

fn default_bind_addr() -> Ipv4Addr {
    Ipv4Addr::UNSPECIFIED
}

fn default_subnet_prefix_len() -> u8 {
    24
}
