//! Periodic presence broadcast

use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result, SocketRole};
use crate::protocol::Announcement;
use crate::types::DiscoveryStats;
use ipnetwork::Ipv4Network;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Sends an announcement to every broadcast target once per interval
pub struct Announcer {
    socket: UdpSocket,
    payload: Vec<u8>,
    targets: Vec<SocketAddr>,
    interval: Duration,
    stats: Arc<DiscoveryStats>,
}

impl Announcer {
    /// Binds the sending socket with broadcast enabled.
    pub async fn bind(
        config: &DiscoveryConfig,
        announcement: &Announcement,
        stats: Arc<DiscoveryStats>,
    ) -> Result<Self> {
        let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0));
        let bind_failed = |source| DiscoveryError::BindFailed {
            role: SocketRole::Announcer,
            addr: bind_addr,
            source,
        };

        let socket = UdpSocket::bind(bind_addr).await.map_err(bind_failed)?;
        socket.set_broadcast(true).map_err(bind_failed)?;

        let targets = broadcast_targets(config, &announcement.address);
        debug!(targets = ?targets, "Announcement targets");

        Ok(Self {
            socket,
            payload: announcement.encode(),
            targets,
            interval: config.announce_interval(),
            stats,
        })
    }

    /// Addresses each announcement is sent to
    pub fn targets(&self) -> &[SocketAddr] {
        &self.targets
    }

    /// Announces until `cancel` fires. The socket is closed when this returns.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Announcer started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.announce_once().await,
            }
        }

        debug!("Announcer stopped");
    }

    async fn announce_once(&self) {
        for target in &self.targets {
            match self.socket.send_to(&self.payload, target).await {
                Ok(bytes) => {
                    self.stats.record_sent();
                    trace!(target = %target, bytes, "Announcement sent");
                }
                // No broadcast-capable interface, transient socket errors:
                // try again on the next tick
                Err(e) => {
                    self.stats.record_send_failure();
                    warn!(target = %target, error = %e, "Failed to send announcement");
                }
            }
        }
    }
}

/// Computes the send targets: the network broadcast address followed by the
/// limited broadcast address `255.255.255.255`, without duplicates.
///
/// The network broadcast address is the configured override, or the
/// broadcast address of `local_address`'s subnet when it is an IPv4 address.
pub fn broadcast_targets(config: &DiscoveryConfig, local_address: &str) -> Vec<SocketAddr> {
    let network = config.broadcast_addr.or_else(|| {
        match local_address.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) if !ip.is_loopback() => {
                Ipv4Network::new(ip, config.subnet_prefix_len)
                    .ok()
                    .map(|net| net.broadcast())
            }
            _ => None,
        }
    });

    let mut targets = Vec::with_capacity(2);
    for ip in network.into_iter().chain(std::iter::once(Ipv4Addr::BROADCAST)) {
        let target = SocketAddr::V4(SocketAddrV4::new(ip, config.discovery_port));
        // Without a network target (loopback fallback, override equal to the
        // limited broadcast) only 255.255.255.255 remains. A second send to
        // it would reach the same sockets and just refresh peers twice.
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets
}
