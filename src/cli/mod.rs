//! Command-line interface for otelhub.
//!
//! Run `otelhub` to start the OTLP receivers and the query bridge with
//! sensible defaults.

use crate::core::config::ConfigBuilder;
use crate::core::{Config, OtelHubError, Result};
use crate::service::MetricService;
use clap::Parser;
use futures::StreamExt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// OTLP metrics host with live discovery and value subscriptions
#[derive(Parser, Debug)]
#[command(name = "otelhub")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// GRPC port for the OTLP receiver
    #[arg(long, env = "OTELHUB_GRPC_PORT")]
    pub grpc_port: Option<u16>,

    /// HTTP port for the OTLP receiver
    #[arg(long, env = "OTELHUB_HTTP_PORT")]
    pub http_port: Option<u16>,

    /// HTTP port for the query bridge
    #[arg(long, env = "OTELHUB_API_PORT")]
    pub api_port: Option<u16>,

    /// Intake queue capacity in batches
    #[arg(long, env = "OTELHUB_QUEUE_CAPACITY")]
    pub queue_capacity: Option<usize>,

    /// Configuration file path (default: ~/.config/otelhub/config.yaml)
    #[arg(short, long, env = "OTELHUB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, env = "OTELHUB_DEBUG")]
    pub debug: bool,

    /// Log every discovered metric id
    #[arg(long)]
    pub watch: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Config file
    /// 3. Defaults (lowest priority)
    pub async fn load_config(&self) -> Result<Config> {
        let mut builder = ConfigBuilder::new();

        if let Some(path) = self.config_path() {
            let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
                OtelHubError::config(format!("Failed to read config file {:?}: {}", path, e))
            })?;
            builder = builder.from_yaml(&content)?;
        }

        self.build_config_from_args(builder)
    }

    /// Config file to read: `--config`, else the default location if it exists.
    pub fn config_path(&self) -> Option<PathBuf> {
        match &self.config {
            Some(path) => Some(path.clone()),
            None => dirs::config_dir()
                .map(|d| d.join("otelhub").join("config.yaml"))
                .filter(|path| path.exists()),
        }
    }

    fn build_config_from_args(&self, mut builder: ConfigBuilder) -> Result<Config> {
        if let Some(port) = self.grpc_port {
            builder = builder.grpc_port(port);
        }
        if let Some(port) = self.http_port {
            builder = builder.http_port(port);
        }
        if let Some(port) = self.api_port {
            builder = builder.api_port(port);
        }
        if let Some(capacity) = self.queue_capacity {
            builder = builder.queue_capacity(capacity);
        }

        builder.debug(self.debug).build()
    }

    /// Initialize logging. `RUST_LOG` wins, then `--debug`, then `default_level`.
    pub fn init_logging(&self, default_level: &str) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let level = if self.debug { "debug" } else { default_level };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .compact(),
            )
            .try_init()
            .map_err(|e| OtelHubError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute the otelhub application.
pub async fn execute(cli: Cli) -> Result<()> {
    let config = cli.load_config().await?;
    cli.init_logging(config.logging.level.as_str())?;
    if let Some(path) = cli.config_path() {
        tracing::info!("Loaded configuration from: {:?}", path);
    }

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  GRPC port: {}", config.server.grpc_port);
        println!("  HTTP port: {}", config.server.http_port);
        println!("  API port: {}", config.server.api_port);
        println!("  Queue capacity: {}", config.ingestion.queue_capacity);
        println!("  Points per series: {}", config.ingestion.stream_capacity);
        return Ok(());
    }

    run(config, cli.watch).await
}

async fn run(config: Config, watch: bool) -> Result<()> {
    let service = Arc::new(MetricService::new(&config.ingestion));
    let consumer = service.start();
    let shutdown = CancellationToken::new();

    let bind = config.server.bind_address;
    let grpc_addr = SocketAddr::new(bind, config.server.grpc_port);
    let http_addr = SocketAddr::new(bind, config.server.http_port);
    let api_addr = SocketAddr::new(bind, config.server.api_port);

    let grpc = tokio::spawn(crate::receiver::start_grpc(
        Arc::clone(&service),
        grpc_addr,
        shutdown.clone(),
    ));
    let http = tokio::spawn(crate::receiver::http::start_http(
        Arc::clone(&service),
        http_addr,
        shutdown.clone(),
    ));
    let api = tokio::spawn(crate::api::start_server(
        Arc::clone(&service),
        config.api.clone(),
        api_addr,
        shutdown.clone(),
    ));

    if watch {
        tokio::spawn(watch_discoveries(Arc::clone(&service), shutdown.clone()));
    }

    tracing::info!("otelhub running");
    tracing::info!("  GRPC receiver on {}", grpc_addr);
    tracing::info!("  HTTP receiver on {}", http_addr);
    tracing::info!("  Query bridge on {}", api_addr);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal, stopping...");

    shutdown.cancel();
    for (name, handle) in [("GRPC", grpc), ("HTTP", http), ("API", api)] {
        if let Err(e) = handle.await? {
            tracing::error!(
                category = e.category(),
                recoverable = e.is_recoverable(),
                "{} server error: {}",
                name,
                e
            );
        }
    }

    service.shutdown();
    consumer.await?;

    let stats = service.stats();
    tracing::info!(
        "Processed {} batches ({} dropped)",
        stats.processed,
        stats.dropped
    );
    Ok(())
}

/// Log metric ids as resources and metrics appear.
async fn watch_discoveries(service: Arc<MetricService>, shutdown: CancellationToken) {
    let mut known = std::collections::HashSet::new();
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));

    loop {
        tokio::select! {
            () = shutdown.cancelled() => return,
            _ = ticker.tick() => {},
        }

        for key in service.resource_keys() {
            if !known.insert(key.clone()) {
                continue;
            }
            tracing::info!("Resource connected: {}", key);

            let mut ids = service.subscribe_metric_ids(&key);
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = shutdown.cancelled() => return,
                        next = ids.next() => match next {
                            Some(id) => tracing::info!("Metric discovered: {}", id),
                            None => return,
                        },
                    }
                }
            });
        }
    }
}
