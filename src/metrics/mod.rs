//! Metric registry: resources, metrics and their per-series ring buffers.
//!
//! The tree is `ResourceRegistry -> Resource -> Metric -> MetricStream`.
//! Every level is append-only for the lifetime of a session.

pub mod attributes;
pub mod metric;
pub mod registry;
pub mod stream;
pub mod types;

pub use attributes::{resource_key, AttributeSetHash};
pub use metric::Metric;
pub use registry::{Resource, ResourceRegistry};
pub use stream::MetricStream;
pub use types::{
    MetricDetails, MetricId, MetricPoint, MetricType, MetricValueEvent, PointValue, ResourceKey,
};
