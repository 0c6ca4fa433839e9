//! Resolution of this node's LAN-facing address

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use tracing::{debug, warn};

/// Non-routable destination used to ask the OS which interface it would pick.
/// Connecting a datagram socket sends nothing on the wire.
const PROBE_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::new(10, 254, 254, 254)), 1);

/// Address reported when the probe fails (no network, sandbox)
pub const FALLBACK_ADDR: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Determines the outbound-facing LAN address, falling back to loopback.
///
/// Never fails: any error while probing degrades to [`FALLBACK_ADDR`].
pub fn resolve_local_address() -> IpAddr {
    match probe_outbound_address() {
        Ok(addr) if !addr.is_unspecified() => {
            debug!(address = %addr, "Resolved local address");
            addr
        }
        Ok(addr) => {
            warn!(address = %addr, "Probe returned an unspecified address, using loopback");
            FALLBACK_ADDR
        }
        Err(e) => {
            warn!(error = %e, "Failed to resolve local address, using loopback");
            FALLBACK_ADDR
        }
    }
}

fn probe_outbound_address() -> io::Result<IpAddr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect(PROBE_ADDR)?;
    Ok(socket.local_addr()?.ip())
}
