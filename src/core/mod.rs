//! Core configuration and error handling for otelhub.

#![warn(missing_docs)]

pub mod config;
pub mod error;

// Re-export commonly used types
pub use config::{Config, ConfigBuilder};
pub use error::{OtelHubError, Result};
