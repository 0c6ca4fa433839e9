//! Discovery service lifecycle: owns the registry and the two loops

use crate::address::resolve_local_address;
use crate::announcer::Announcer;
use crate::config::DiscoveryConfig;
use crate::error::{DiscoveryError, Result};
use crate::listener::Listener;
use crate::protocol::Announcement;
use crate::registry::PeerRegistry;
use crate::types::{DiscoveryStats, DiscoveryStatus, PeerInfo, ServiceState};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

enum Lifecycle {
    /// Constructed, never started
    Idle,
    Running {
        cancel: CancellationToken,
        tasks: Vec<JoinHandle<()>>,
    },
    /// Loops cancelled; `done` fires once both are joined
    Stopping {
        done: CancellationToken,
    },
    /// Stopped after running; terminal
    Stopped,
}

/// Announces this node and tracks peers on the local network.
///
/// `start` binds both sockets before spawning either loop, so the service is
/// either fully running or not running at all. `stop` signals cancellation
/// and waits for both loops to exit and release their sockets. A stopped
/// service cannot be restarted.
pub struct DiscoveryService {
    config: DiscoveryConfig,
    local_address: String,
    registry: Arc<PeerRegistry>,
    stats: Arc<DiscoveryStats>,
    lifecycle: Arc<Mutex<Lifecycle>>,
}

impl DiscoveryService {
    /// Creates a new discovery service and resolves the local address once.
    pub fn new(config: DiscoveryConfig) -> Result<Self> {
        config.validate().map_err(DiscoveryError::InvalidConfig)?;

        let local_address = match &config.local_address {
            Some(address) => address.clone(),
            None => resolve_local_address().to_string(),
        };

        info!(
            enabled = config.enabled,
            address = %local_address,
            port = config.discovery_port,
            "Discovery service created"
        );

        Ok(Self {
            config,
            local_address,
            registry: Arc::new(PeerRegistry::new()),
            stats: Arc::new(DiscoveryStats::new()),
            lifecycle: Arc::new(Mutex::new(Lifecycle::Idle)),
        })
    }

    /// Creates a service announcing `local_address` instead of the resolved one
    pub fn with_local_address(
        config: DiscoveryConfig,
        local_address: impl Into<String>,
    ) -> Result<Self> {
        Self::new(DiscoveryConfig {
            local_address: Some(local_address.into()),
            ..config
        })
    }

    /// Starts the announcer and listener.
    ///
    /// # Errors
    ///
    /// `BindFailed` when either socket cannot be set up, `AlreadyStarted`
    /// while running, `Terminated` after `stop`.
    pub async fn start(&self) -> Result<()> {
        self.ensure_idle()?;

        if !self.config.enabled {
            info!("Discovery service is disabled in configuration");
            return Ok(());
        }

        info!("Starting discovery service");

        let announcement = Announcement::new(self.local_address.clone(), self.config.service_port);
        let listener = Listener::bind(
            &self.config,
            Arc::clone(&self.registry),
            self.local_address.clone(),
            Arc::clone(&self.stats),
        )?;
        let announcer =
            Announcer::bind(&self.config, &announcement, Arc::clone(&self.stats)).await?;

        let mut lifecycle = self.lifecycle.lock();
        // A concurrent start may have won while the sockets were being bound
        if !matches!(*lifecycle, Lifecycle::Idle) {
            return Err(DiscoveryError::AlreadyStarted);
        }

        self.registry.clear();
        let cancel = CancellationToken::new();
        let tasks = vec![
            tokio::spawn(announcer.run(cancel.clone())),
            tokio::spawn(listener.run(cancel.clone())),
        ];
        *lifecycle = Lifecycle::Running { cancel, tasks };

        info!(
            address = %self.local_address,
            port = self.config.discovery_port,
            "Discovery service started successfully"
        );
        Ok(())
    }

    fn ensure_idle(&self) -> Result<()> {
        match *self.lifecycle.lock() {
            Lifecycle::Idle => Ok(()),
            Lifecycle::Running { .. } | Lifecycle::Stopping { .. } => {
                Err(DiscoveryError::AlreadyStarted)
            }
            Lifecycle::Stopped => Err(DiscoveryError::Terminated),
        }
    }

    /// Stops both loops and waits for them to exit. Calling it again, or on a
    /// service that never started, is a no-op.
    ///
    /// Concurrent callers all return only once both sockets are released.
    /// The join runs in its own task, so dropping this future does not leave
    /// the service stuck in `Stopping`.
    pub async fn stop(&self) -> Result<()> {
        let done = {
            let mut lifecycle = self.lifecycle.lock();
            match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
                Lifecycle::Running { cancel, tasks } => {
                    info!("Stopping discovery service");
                    let done = CancellationToken::new();
                    *lifecycle = Lifecycle::Stopping { done: done.clone() };
                    cancel.cancel();
                    tokio::spawn(join_loops(
                        tasks,
                        Arc::clone(&self.lifecycle),
                        Arc::clone(&self.registry),
                        done.clone(),
                    ));
                    done
                }
                Lifecycle::Stopping { done } => {
                    *lifecycle = Lifecycle::Stopping { done: done.clone() };
                    done
                }
                other => {
                    *lifecycle = other;
                    return Ok(());
                }
            }
        };

        done.cancelled().await;
        Ok(())
    }

    /// Returns the current lifecycle state
    pub fn state(&self) -> ServiceState {
        match *self.lifecycle.lock() {
            Lifecycle::Running { .. } => ServiceState::Running,
            Lifecycle::Stopping { .. } => ServiceState::Stopping,
            Lifecycle::Idle | Lifecycle::Stopped => ServiceState::Stopped,
        }
    }

    /// Returns whether the service is running
    pub fn is_running(&self) -> bool {
        self.state() == ServiceState::Running
    }

    /// Returns the live peers, sorted by address.
    ///
    /// Expired peers are evicted as a side effect. Returns an empty list
    /// unless the service is running. Never blocks on network I/O.
    pub fn query_peers(&self) -> Vec<PeerInfo> {
        if !self.is_running() {
            return Vec::new();
        }
        self.registry
            .snapshot(Instant::now(), self.config.peer_expiry())
    }

    /// Address this node announces and filters out of the peer list
    pub fn local_address(&self) -> &str {
        &self.local_address
    }

    /// Returns the configuration the service was built with
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Returns the loop counters
    pub fn stats(&self) -> &DiscoveryStats {
        &self.stats
    }

    /// Summarizes state, identity, live peer count and counters
    pub fn status(&self) -> DiscoveryStatus {
        DiscoveryStatus {
            state: self.state(),
            local_address: self.local_address.clone(),
            discovery_port: self.config.discovery_port,
            service_port: self.config.service_port,
            peer_count: self.query_peers().len(),
            stats: self.stats.snapshot(),
        }
    }
}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        if let Lifecycle::Running { cancel, .. } = &*self.lifecycle.lock() {
            warn!("Discovery service dropped while still running");
            // Loops exit on their own and close their sockets
            cancel.cancel();
            debug!("Cancellation signalled from drop");
        }
    }
}

/// Waits for both loops, then marks the service stopped and wakes every
/// pending `stop` caller
async fn join_loops(
    tasks: Vec<JoinHandle<()>>,
    lifecycle: Arc<Mutex<Lifecycle>>,
    registry: Arc<PeerRegistry>,
    done: CancellationToken,
) {
    for task in tasks {
        if let Err(e) = task.await {
            warn!(error = %e, "Discovery task ended abnormally");
        }
    }

    registry.clear();
    *lifecycle.lock() = Lifecycle::Stopped;
    info!("Discovery service stopped");
    done.cancel();
}
