//! LAN peer discovery over UDP broadcast
//!
//! Every node periodically broadcasts a small text announcement
//! (`PEER:<address>:<port>`) and listens for the announcements of others,
//! building a live peer list that forgets silent peers.
//!
//! # Architecture
//!
//! The discovery service runs two background tasks sharing one registry:
//! 1. The announcer broadcasts this node's address and HTTP port every interval
//! 2. The listener validates received datagrams and refreshes the registry
//! 3. Queries evict peers that have been silent for longer than the expiry
//!    threshold; there is no separate sweep task
//!
//! Both tasks observe a shared cancellation token, so `stop` returns only
//! once both sockets are closed.
//!
//! # Example
//!
//! ```no_run
//! use lanshare_discovery::{DiscoveryConfig, DiscoveryService};
//!
//! #[tokio::main]
//! async fn main() -> lanshare_discovery::Result<()> {
//!     let service = DiscoveryService::new(DiscoveryConfig::default())?;
//!     service.start().await?;
//!
//!     for peer in service.query_peers() {
//!         println!("{} -> {}", peer.address, peer.url);
//!     }
//!
//!     service.stop().await
//! }
//! ```

pub mod address;
pub mod announcer;
pub mod config;
pub mod error;
pub mod listener;
pub mod protocol;
pub mod registry;
pub mod service;
pub mod types;

pub use address::resolve_local_address;
pub use config::DiscoveryConfig;
pub use error::{DiscoveryError, Result};
pub use protocol::Announcement;
pub use registry::PeerRegistry;
pub use service::DiscoveryService;
pub use types::{DiscoveryStatus, PeerInfo, ServiceState, StatsSnapshot};
