//! # LanShare Core
//!
//! Configuration and error types shared by the LanShare crates.
//!
//! - **Configuration**: YAML files with environment variable overrides for
//!   discovery, the HTTP catalog, storage and logging.
//! - **Errors**: `thiserror` based error types for configuration failures.
//!
//! ## Example
//!
//! ```
//! use lanshare_core::config::AppConfig;
//!
//! let config = AppConfig::default();
//! assert_eq!(config.discovery.discovery_port, 37020);
//! assert!(config.validate().is_ok());
//! ```

pub mod config;
pub mod discovery_config;
pub mod error;

pub use config::AppConfig;
pub use discovery_config::DiscoveryConfig;
pub use error::{ConfigError, LanShareError, Result};
