//! Core metric types shared by the registry, the pipeline and the query surface.

use opentelemetry_proto::tonic::metrics::v1::metric::Data;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies a resource: `service.instance.id`, else `service.name`, else `"Unknown"`.
pub type ResourceKey = String;

/// Fully qualified metric identity: resource, instrumentation scope and metric name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricId {
    /// Owning resource
    pub resource_key: ResourceKey,
    /// Instrumentation scope name, empty when the export carried no scope
    pub scope_name: String,
    /// Metric name as exported
    pub metric_name: String,
}

impl MetricId {
    pub fn new(
        resource_key: impl Into<ResourceKey>,
        scope_name: impl Into<String>,
        metric_name: impl Into<String>,
    ) -> Self {
        Self {
            resource_key: resource_key.into(),
            scope_name: scope_name.into(),
            metric_name: metric_name.into(),
        }
    }
}

impl fmt::Display for MetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.resource_key, self.scope_name, self.metric_name)
    }
}

/// Metric kind, fixed when the metric is first observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    Gauge,
    Sum,
    Histogram,
    Other,
}

impl MetricType {
    /// Classify an OTLP metric payload.
    pub fn from_data(data: Option<&Data>) -> Self {
        match data {
            Some(Data::Gauge(_)) => MetricType::Gauge,
            Some(Data::Sum(_)) => MetricType::Sum,
            Some(Data::Histogram(_)) => MetricType::Histogram,
            _ => MetricType::Other,
        }
    }

    /// Whether points of this type are kept in a stream.
    pub fn is_stored(self) -> bool {
        matches!(self, MetricType::Gauge | MetricType::Sum)
    }
}

/// Numeric value of a gauge or sum point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PointValue {
    /// Integer value
    Long(i64),
    /// Floating-point value
    Double(f64),
}

/// A single observation, timestamped in seconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// Seconds since the Unix epoch
    pub timestamp: i64,
    /// Observed value
    pub value: PointValue,
}

impl MetricPoint {
    pub fn new(timestamp: i64, value: PointValue) -> Self {
        Self { timestamp, value }
    }

    pub fn long(timestamp: i64, value: i64) -> Self {
        Self::new(timestamp, PointValue::Long(value))
    }

    pub fn double(timestamp: i64, value: f64) -> Self {
        Self::new(timestamp, PointValue::Double(value))
    }
}

/// Static description of a metric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDetails {
    /// Identity the details belong to
    pub id: MetricId,
    /// Description from the first export
    pub description: String,
    /// Unit from the first export
    pub unit: String,
}

/// A value push delivered to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricValueEvent {
    /// Identity the point was appended to
    pub id: MetricId,
    /// The appended point
    pub point: MetricPoint,
}
