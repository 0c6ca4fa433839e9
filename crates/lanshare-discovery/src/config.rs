//! Configuration types for peer discovery
//!
//! Re-exports configuration from lanshare-core so the binary can load it
//! together with the rest of the application settings

pub use lanshare_core::discovery_config::DiscoveryConfig;
