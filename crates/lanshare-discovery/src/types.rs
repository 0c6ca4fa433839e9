//! Types exposed to consumers of the discovery service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A live peer as returned by a registry snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerInfo {
    /// Address the peer announced
    pub address: String,

    /// Catalog URL derived from the address and service port
    pub url: String,

    /// HTTP port the peer advertised
    pub service_port: u16,

    /// Wall-clock time of the latest valid announcement
    pub last_seen_at: DateTime<Utc>,

    /// Number of announcements received since the record was created
    pub seen_count: u64,
}

/// Builds the catalog URL for a peer
pub fn peer_url(address: &str, service_port: u16) -> String {
    format!("http://{}:{}", address, service_port)
}

/// Lifecycle state of the discovery service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    /// Loops are not running
    Stopped,

    /// Announcer and listener are running
    Running,

    /// Cancellation was signalled, loops are being joined
    Stopping,
}

impl ServiceState {
    /// Returns a human-readable description
    pub fn description(&self) -> &str {
        match self {
            ServiceState::Stopped => "Discovery is not running",
            ServiceState::Running => "Announcing and listening",
            ServiceState::Stopping => "Shutting down",
        }
    }
}

/// Point-in-time view of the discovery service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryStatus {
    pub state: ServiceState,
    pub local_address: String,
    pub discovery_port: u16,
    pub service_port: u16,
    pub peer_count: usize,
    pub stats: StatsSnapshot,
}

/// Counters shared by the announcer and listener loops
#[derive(Debug, Default)]
pub struct DiscoveryStats {
    announcements_sent: AtomicU64,
    send_failures: AtomicU64,
    datagrams_received: AtomicU64,
    malformed_datagrams: AtomicU64,
    self_announcements: AtomicU64,
    peers_registered: AtomicU64,
}

impl DiscoveryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_sent(&self) {
        self.announcements_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_send_failure(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_received(&self) {
        self.datagrams_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed_datagrams.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_self_announcement(&self) {
        self.self_announcements.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_new_peer(&self) {
        self.peers_registered.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of every counter
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            announcements_sent: self.announcements_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            malformed_datagrams: self.malformed_datagrams.load(Ordering::Relaxed),
            self_announcements: self.self_announcements.load(Ordering::Relaxed),
            peers_registered: self.peers_registered.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`DiscoveryStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub announcements_sent: u64,
    pub send_failures: u64,
    pub datagrams_received: u64,
    pub malformed_datagrams: u64,
    pub self_announcements: u64,
    pub peers_registered: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_url() {
        assert_eq!(peer_url("192.168.1.100", 8000), "http://192.168.1.100:8000");
    }

    #[test]
    fn test_stats_snapshot() {
        let stats = DiscoveryStats::new();
        stats.record_sent();
        stats.record_sent();
        stats.record_malformed();
        stats.record_new_peer();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.announcements_sent, 2);
        assert_eq!(snapshot.malformed_datagrams, 1);
        assert_eq!(snapshot.peers_registered, 1);
        assert_eq!(snapshot.datagrams_received, 0);
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&ServiceState::Running).unwrap();
        assert_eq!(json, "\"running\"");
    }
}
