//! otelhub - OTLP metrics host with live discovery and value subscriptions.
//!
//! otelhub receives OpenTelemetry metric exports over GRPC and HTTP, keeps a
//! bounded history per time series, and lets a presentation layer query
//! metrics or subscribe to newly discovered metric ids and incoming values.
//!
//! # Features
//!
//! - **OTLP Receivers**: GRPC (port 4317) and HTTP (port 4318)
//! - **Non-blocking Intake**: bounded queue that drops the oldest batch under overload
//! - **Bounded History**: fixed-size ring buffer per attribute set
//! - **Live Feeds**: metric-id discovery and per-metric value streams
//!
//! # Architecture
//!
//! - `receiver`: OTLP protocol endpoints
//! - `ingest`: intake queue and the single consumer applying batches
//! - `metrics`: resource registry, metrics and their series
//! - `subscription`: discovery and value subscribers
//! - `service`: per-session facade tying the pieces together
//! - `api`: query and SSE bridge for the presentation layer
//! - `cli`: command-line interface
//!
//! # Example
//!
//! ```no_run
//! use otelhub_lib::core::config::IngestionConfig;
//! use otelhub_lib::metrics::MetricId;
//! use otelhub_lib::MetricService;
//!
//! #[tokio::main]
//! async fn main() {
//!     let service = MetricService::new(&IngestionConfig::default());
//!     let _consumer = service.start();
//!
//!     let id = MetricId::new("checkout", "http", "request.count");
//!     println!("{:?}", service.get_current_point(&id));
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod api;
pub mod cli;
pub mod core;
pub mod ingest;
pub mod metrics;
pub mod receiver;
pub mod service;
pub mod subscription;

// Re-export core types for convenience
pub use crate::core::{Config, Result};
pub use crate::service::MetricService;
