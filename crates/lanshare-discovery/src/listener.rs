//! Reception of announcements and registry refresh

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result, SocketRole};
use crate::protocol::{Announcement, MAX_DATAGRAM_SIZE};
use crate::registry::{PeerRegistry, TouchOutcome};
use crate::types::DiscoveryStats;
use socket2::{Domain, Protocol, Socket, Type};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Pause after a receive error so a persistent failure cannot spin the loop
const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// What happened to a single received datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatagramOutcome {
    /// New peer recorded
    Registered,
    /// Known peer refreshed
    Refreshed,
    /// Our own announcement, ignored
    SelfAnnouncement,
    /// Not a valid announcement, dropped
    Malformed,
}

/// Receives announcements on the discovery port
pub struct Listener {
    socket: UdpSocket,
    registry: Arc<PeerRegistry>,
    local_address: String,
    receive_timeout: Duration,
    stats: Arc<DiscoveryStats>,
}

impl Listener {
    /// Binds the discovery port with address reuse enabled.
    pub fn bind(
        config: &DiscoveryConfig,
        registry: Arc<PeerRegistry>,
        local_address: String,
        stats: Arc<DiscoveryStats>,
    ) -> Result<Self> {
        let bind_addr = SocketAddr::from((config.bind_addr, config.discovery_port));
        let socket = bind_reusable(bind_addr).map_err(|source| DiscoveryError::BindFailed {
            role: SocketRole::Listener,
            addr: bind_addr,
            source,
        })?;

        Ok(Self {
            socket,
            registry,
            local_address,
            receive_timeout: config.receive_timeout(),
            stats,
        })
    }

    /// Address the socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receives until `cancel` fires. The socket is closed when this returns.
    pub async fn run(self, cancel: CancellationToken) {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];

        info!(
            address = %self.local_address,
            timeout_ms = self.receive_timeout.as_millis() as u64,
            "Listener started"
        );

        loop {
            let received = tokio::select! {
                _ = cancel.cancelled() => break,
                received = tokio::time::timeout(
                    self.receive_timeout,
                    self.socket.recv_from(&mut buffer),
                ) => received,
            };

            match received {
                // Idle period, check for cancellation and wait again
                Err(_elapsed) => continue,
                Ok(Ok((len, source))) => {
                    self.stats.record_received();
                    let outcome = handle_datagram(
                        &buffer[..len],
                        &self.local_address,
                        &self.registry,
                        &self.stats,
                        Instant::now(),
                    );
                    trace!(source = %source, ?outcome, "Datagram processed");
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Discovery receive failed");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        debug!("Listener stopped");
    }
}

/// Validates one datagram and refreshes the registry.
///
/// Self-filtering compares the address claimed in the announcement, not the
/// packet's transport source.
pub fn handle_datagram(
    datagram: &[u8],
    local_address: &str,
    registry: &PeerRegistry,
    stats: &DiscoveryStats,
    now: Instant,
) -> DatagramOutcome {
    let announcement = match Announcement::decode(datagram) {
        Ok(announcement) => announcement,
        Err(e) => {
            stats.record_malformed();
            trace!(error = %e, len = datagram.len(), "Dropping malformed datagram");
            return DatagramOutcome::Malformed;
        }
    };

    if announcement.address == local_address {
        stats.record_self_announcement();
        return DatagramOutcome::SelfAnnouncement;
    }

    match registry.touch(&announcement.address, announcement.service_port, now) {
        TouchOutcome::Inserted => {
            stats.record_new_peer();
            info!(
                peer = %announcement.address,
                port = announcement.service_port,
                "Discovered peer"
            );
            DatagramOutcome::Registered
        }
        TouchOutcome::Refreshed => DatagramOutcome::Refreshed,
    }
}

fn bind_reusable(addr: SocketAddr) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;

    // Quick restarts and several nodes on one host share the port
    socket.set_reuse_address(true)?;
    socket.set_broadcast(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;

    UdpSocket::from_std(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: &str = "10.0.0.1";

    fn fixture() -> (PeerRegistry, DiscoveryStats) {
        (PeerRegistry::new(), DiscoveryStats::new())
    }

    #[test]
    fn test_valid_announcement_registers_peer() {
        let (registry, stats) = fixture();
        let now = Instant::now();

        let outcome = handle_datagram(b"PEER:10.0.0.2:8000", LOCAL, &registry, &stats, now);
        assert_eq!(outcome, DatagramOutcome::Registered);

        let outcome = handle_datagram(b"PEER:10.0.0.2:8000", LOCAL, &registry, &stats, now);
        assert_eq!(outcome, DatagramOutcome::Refreshed);

        let peers = registry.snapshot(now, Duration::from_secs(25));
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].url, "http://10.0.0.2:8000");
        assert_eq!(stats.snapshot().peers_registered, 1);
    }

    #[test]
    fn test_self_announcement_ignored() {
        let (registry, stats) = fixture();

        for _ in 0..5 {
            let outcome =
                handle_datagram(b"PEER:10.0.0.1:8000", LOCAL, &registry, &stats, Instant::now());
            assert_eq!(outcome, DatagramOutcome::SelfAnnouncement);
        }

        assert!(registry.is_empty());
        assert_eq!(stats.snapshot().self_announcements, 5);
    }

    #[test]
    fn test_malformed_datagrams_do_not_mutate_registry() {
        let (registry, stats) = fixture();
        let datagrams: [&[u8]; 6] = [
            b"",
            b"HELLO:10.0.0.2:8000",
            b"PEER:10.0.0.2",
            b"PEER:",
            b"\xff\xfe\x00\x01",
            b"PEER:10.0.0.2:notaport",
        ];

        for datagram in datagrams {
            let outcome = handle_datagram(datagram, LOCAL, &registry, &stats, Instant::now());
            assert_eq!(outcome, DatagramOutcome::Malformed);
        }

        assert!(registry.is_empty());
        assert_eq!(stats.snapshot().malformed_datagrams, 6);
    }

    #[tokio::test]
    async fn test_listener_receives_unicast_and_stops() {
        let registry = Arc::new(PeerRegistry::new());
        let stats = Arc::new(DiscoveryStats::new());
        let config = DiscoveryConfig {
            discovery_port: 47012,
            receive_timeout_ms: 200,
            ..Default::default()
        };

        let listener =
            Listener::bind(&config, registry.clone(), LOCAL.to_string(), stats.clone()).unwrap();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(listener.run(cancel.clone()));

        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(b"garbage", ("127.0.0.1", config.discovery_port))
            .await
            .unwrap();
        sender
            .send_to(b"PEER:10.0.0.7:8000", ("127.0.0.1", config.discovery_port))
            .await
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(3);
        while registry.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(registry.get("10.0.0.7").is_some());
        assert_eq!(registry.len(), 1);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("listener did not observe cancellation")
            .unwrap();

        // Port released once the loop has exited
        std::net::UdpSocket::bind(("0.0.0.0", config.discovery_port)).unwrap();
    }
}
