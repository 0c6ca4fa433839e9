use anyhow::{Context, Result};
use clap::Parser;
use lanshare_api::ServerBuilder;
use lanshare_core::config::{AppConfig, LogFormat, LoggingConfig};
use lanshare_discovery::DiscoveryService;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// LanShare - share a folder with every node on the local network
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "lanshare.yaml")]
    config: PathBuf,

    /// Override HTTP bind host
    #[arg(long)]
    host: Option<String>,

    /// Override HTTP port (also advertised to peers)
    #[arg(short, long, env = "LANSHARE_PORT")]
    port: Option<u16>,

    /// Override shared folder
    #[arg(long)]
    upload_dir: Option<PathBuf>,

    /// Override UDP discovery port
    #[arg(long)]
    discovery_port: Option<u16>,

    /// Address to announce instead of the detected one
    #[arg(long)]
    advertise_address: Option<String>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Serve files without announcing or listening for peers
    #[arg(long)]
    no_discovery: bool,
}

impl Args {
    fn apply(self, config: &mut AppConfig) {
        if let Some(host) = self.host {
            config.api.host = host;
        }
        if let Some(port) = self.port {
            config.api.port = port;
        }
        if let Some(dir) = self.upload_dir {
            config.storage.upload_dir = dir;
        }
        if let Some(port) = self.discovery_port {
            config.discovery.discovery_port = port;
        }
        if let Some(address) = self.advertise_address {
            config.discovery.local_address = Some(address);
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.no_discovery {
            config.discovery.enabled = false;
        }

        // Peers reach our catalog on the HTTP port
        config.discovery.service_port = config.api.port;
    }
}

fn init_tracing(logging: &LoggingConfig) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    match logging.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::from_config_builder(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.logging);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting LanShare");

    let discovery = Arc::new(
        DiscoveryService::new(config.discovery.clone())
            .context("Failed to create discovery service")?,
    );
    discovery
        .start()
        .await
        .context("Failed to start peer discovery")?;

    let server = ServerBuilder::new(config.api.clone(), discovery.clone())
        .upload_dir(config.storage.upload_dir.clone())
        .build()?;

    let served = server.run(lanshare_api::shutdown_signal()).await;
    if let Err(e) = &served {
        error!(error = %e, "API server failed");
    }

    info!("Stopping peer discovery");
    discovery.stop().await?;
    info!("Shutdown complete");

    served
}
