//! In-memory table of known peers with lazy expiry

use crate::types::{peer_url, PeerInfo};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Last known state of one peer, keyed by its announced address
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub address: String,
    pub service_port: u16,

    /// Receipt time of the latest valid announcement; never moves backwards
    pub last_seen_at: Instant,

    /// Wall-clock counterpart of `last_seen_at`, for display only
    pub last_seen_wall: DateTime<Utc>,

    pub first_seen_at: DateTime<Utc>,
    pub seen_count: u64,
}

impl PeerRecord {
    fn new(address: &str, service_port: u16, now: Instant) -> Self {
        let wall = Utc::now();
        Self {
            address: address.to_string(),
            service_port,
            last_seen_at: now,
            last_seen_wall: wall,
            first_seen_at: wall,
            seen_count: 1,
        }
    }

    fn refresh(&mut self, service_port: u16, now: Instant) {
        // Out-of-order calls must not move the record back in time
        if now >= self.last_seen_at {
            self.last_seen_at = now;
            self.last_seen_wall = Utc::now();
        }
        self.service_port = service_port;
        self.seen_count += 1;
    }

    fn is_live(&self, now: Instant, expiry: Duration) -> bool {
        now.saturating_duration_since(self.last_seen_at) < expiry
    }

    fn to_info(&self) -> PeerInfo {
        PeerInfo {
            address: self.address.clone(),
            url: peer_url(&self.address, self.service_port),
            service_port: self.service_port,
            last_seen_at: self.last_seen_wall,
            seen_count: self.seen_count,
        }
    }
}

/// Result of [`PeerRegistry::touch`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchOutcome {
    /// First announcement from this address (or first since eviction)
    Inserted,
    /// Existing record refreshed
    Refreshed,
}

/// Peer table shared by the listener (writer) and the query path.
///
/// A single mutex guards the whole map; LAN peer counts are small.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: Mutex<HashMap<String, PeerRecord>>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or refreshes the record for `address`.
    pub fn touch(&self, address: &str, service_port: u16, now: Instant) -> TouchOutcome {
        let mut peers = self.peers.lock();
        match peers.get_mut(address) {
            Some(record) => {
                record.refresh(service_port, now);
                TouchOutcome::Refreshed
            }
            None => {
                peers.insert(
                    address.to_string(),
                    PeerRecord::new(address, service_port, now),
                );
                TouchOutcome::Inserted
            }
        }
    }

    /// Returns the live peers sorted by address.
    ///
    /// This is a side-effecting read: every record whose age has reached
    /// `expiry` is deleted from the registry during the call.
    pub fn snapshot(&self, now: Instant, expiry: Duration) -> Vec<PeerInfo> {
        let mut peers = self.peers.lock();
        peers.retain(|_, record| record.is_live(now, expiry));

        let mut live: Vec<PeerInfo> = peers.values().map(PeerRecord::to_info).collect();
        live.sort_by(|a, b| a.address.cmp(&b.address));
        live
    }

    /// Returns a copy of the record for `address`, expired or not
    pub fn get(&self, address: &str) -> Option<PeerRecord> {
        self.peers.lock().get(address).cloned()
    }

    /// Number of records, including ones not yet evicted
    pub fn len(&self) -> usize {
        self.peers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.lock().is_empty()
    }

    pub fn clear(&self) {
        self.peers.lock().clear();
    }
}
