use thiserror::Error;

#[derive(Error, Debug)]
pub enum OtelHubError {
    #[error("OTLP protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metric not found: {0}")]
    MetricNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("GRPC transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("Async task join error: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Network error: {0}")]
    Network(String),
}

/// Result type alias for otelhub operations
pub type Result<T> = std::result::Result<T, OtelHubError>;

impl OtelHubError {
    /// Creates a new protocol error
    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::Protocol(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Transport(_))
    }

    /// Returns the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Protocol(_) => "protocol",
            Self::Config(_) => "config",
            Self::MetricNotFound(_) | Self::ResourceNotFound(_) => "not_found",
            Self::Io(_) => "io",
            Self::Transport(_) | Self::Network(_) => "network",
            Self::Join(_) => "async",
        }
    }
}
