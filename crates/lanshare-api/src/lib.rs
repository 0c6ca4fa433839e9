//! LanShare API - HTTP file catalog for a LAN node
//!
//! Serves the shared folder of this node to browsers on the LAN, together
//! with the peer list maintained by `lanshare-discovery`.
//!
//! # Features
//!
//! - File listing, upload, streamed download and delete
//! - Storage usage in human-readable units
//! - Live peer list and discovery status
//! - Embedded browser UI
//!
//! # Example
//!
//! ```no_run
//! use lanshare_api::ServerBuilder;
//! use lanshare_core::config::ApiConfig;
//! use lanshare_discovery::{DiscoveryConfig, DiscoveryService};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let discovery = Arc::new(DiscoveryService::new(DiscoveryConfig::default())?);
//!     let server = ServerBuilder::new(ApiConfig::default(), discovery)
//!         .upload_dir("uploads")
//!         .build()?;
//!
//!     server.run(lanshare_api::shutdown_signal()).await
//! }
//! ```

pub mod catalog;
pub mod middleware;
pub mod rest;
pub mod static_files;
pub mod types;

pub use catalog::{human_readable_size, CatalogError, FileCatalog};
pub use middleware::cors_layer;
pub use rest::{ApiError, ApiState};

use axum::{extract::DefaultBodyLimit, Router};
use lanshare_core::config::ApiConfig;
use lanshare_discovery::DiscoveryService;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

// ============================================================================
// Router
// ============================================================================

/// Assembles every route with the configured layers
pub fn create_router(state: ApiState, config: &ApiConfig) -> Router {
    let mut app = Router::new()
        .merge(rest::create_rest_router(state))
        .merge(static_files::create_static_router())
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http());

    if config.cors {
        app = app.layer(cors_layer());
    }

    app
}

// ============================================================================
// Server
// ============================================================================

pub struct ServerBuilder {
    config: ApiConfig,
    discovery: Arc<DiscoveryService>,
    upload_dir: PathBuf,
}

impl ServerBuilder {
    pub fn new(config: ApiConfig, discovery: Arc<DiscoveryService>) -> Self {
        Self {
            config,
            discovery,
            upload_dir: PathBuf::from("uploads"),
        }
    }

    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    pub fn build(self) -> anyhow::Result<Server> {
        self.config.validate()?;

        Ok(Server {
            config: self.config,
            discovery: self.discovery,
            catalog: Arc::new(FileCatalog::new(self.upload_dir)),
        })
    }
}

pub struct Server {
    config: ApiConfig,
    discovery: Arc<DiscoveryService>,
    catalog: Arc<FileCatalog>,
}

impl Server {
    /// Serves until `shutdown` resolves, then drains in-flight requests
    pub async fn run<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.catalog.ensure_root().await?;
        info!(path = %self.catalog.root().display(), "Sharing folder");

        let state = ApiState::new(self.discovery.clone(), self.catalog.clone());
        let app = create_router(state, &self.config);

        let listener = tokio::net::TcpListener::bind(self.config.bind_address()).await?;
        info!(addr = %listener.local_addr()?, "API server listening");
        info!(
            "Server running at http://{}:{}",
            self.discovery.local_address(),
            self.config.port
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

/// Resolves on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl-C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
