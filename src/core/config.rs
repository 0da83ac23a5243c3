//! Configuration management for otelhub.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - CLI argument overrides
//! - Validation and defaults

use crate::core::{OtelHubError, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Number of batches the intake queue holds before dropping the oldest.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Number of points retained per time series.
pub const DEFAULT_STREAM_CAPACITY: usize = 300;

/// Complete configuration for otelhub
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Ingestion configuration
    pub ingestion: IngestionConfig,
    /// Query bridge configuration
    pub api: ApiConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Debug mode
    #[serde(skip)]
    pub debug: bool,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address for all listeners
    pub bind_address: IpAddr,
    /// GRPC port for the OTLP receiver
    pub grpc_port: u16,
    /// HTTP port for the OTLP receiver
    pub http_port: u16,
    /// HTTP port for the query and subscription bridge
    pub api_port: u16,
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Intake queue capacity in batches
    pub queue_capacity: usize,
    /// Points retained per time series
    pub stream_capacity: usize,
    /// Replay already known metric ids to new discovery subscribers
    pub replay_existing_ids: bool,
}

/// Query bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Enable permissive CORS headers
    pub enable_cors: bool,
    /// Interval between SSE keep-alive comments
    #[serde(with = "humantime_serde")]
    pub keep_alive: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_address: IpAddr::from([0, 0, 0, 0]),
            grpc_port: 4317,
            http_port: 4318,
            api_port: 4319,
        }
    }
}

impl Default for IngestionConfig {
    fn default() -> Self {
        IngestionConfig {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            stream_capacity: DEFAULT_STREAM_CAPACITY,
            replay_existing_ids: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig {
            enable_cors: true,
            keep_alive: Duration::from_secs(15),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let ports = [
            ("grpc_port", self.server.grpc_port),
            ("http_port", self.server.http_port),
            ("api_port", self.server.api_port),
        ];
        for (i, (name, port)) in ports.iter().enumerate() {
            for (other, other_port) in &ports[i + 1..] {
                if port == other_port {
                    return Err(OtelHubError::config(format!(
                        "{} and {} must be different: both set to {}",
                        name, other, port
                    )));
                }
            }
        }

        if self.ingestion.queue_capacity == 0 {
            return Err(OtelHubError::config("queue_capacity must be greater than 0"));
        }

        if self.ingestion.stream_capacity == 0 {
            return Err(OtelHubError::config("stream_capacity must be greater than 0"));
        }

        Ok(())
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)
            .map_err(|e| OtelHubError::config(format!("Failed to parse YAML config: {}", e)))?;
        Ok(self)
    }

    /// Set GRPC port
    pub fn grpc_port(mut self, port: u16) -> Self {
        self.config.server.grpc_port = port;
        self
    }

    /// Set HTTP port
    pub fn http_port(mut self, port: u16) -> Self {
        self.config.server.http_port = port;
        self
    }

    /// Set query bridge port
    pub fn api_port(mut self, port: u16) -> Self {
        self.config.server.api_port = port;
        self
    }

    /// Set intake queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.ingestion.queue_capacity = capacity;
        self
    }

    /// Set per-series point capacity
    pub fn stream_capacity(mut self, capacity: usize) -> Self {
        self.config.ingestion.stream_capacity = capacity;
        self
    }

    /// Enable or disable discovery replay
    pub fn replay_existing_ids(mut self, replay: bool) -> Self {
        self.config.ingestion.replay_existing_ids = replay;
        self
    }

    /// Set debug mode
    pub fn debug(mut self, debug: bool) -> Self {
        self.config.debug = debug;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}
