//! A named, typed metric and its per-attribute-set streams.

use crate::metrics::{
    attributes::AttributeSetHash,
    stream::MetricStream,
    types::{MetricDetails, MetricId, MetricPoint, MetricType},
};
use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use std::sync::Arc;

/// One metric within a resource.
///
/// Type, description and unit are fixed at creation. Streams are added on
/// first sight of an attribute set and never removed.
pub struct Metric {
    id: MetricId,
    metric_type: MetricType,
    description: String,
    unit: String,
    stream_capacity: usize,
    streams: DashMap<AttributeSetHash, Arc<MetricStream>>,
    last_written: ArcSwapOption<MetricStream>,
}

impl Metric {
    pub fn new(
        id: MetricId,
        metric_type: MetricType,
        description: impl Into<String>,
        unit: impl Into<String>,
        stream_capacity: usize,
    ) -> Self {
        Self {
            id,
            metric_type,
            description: description.into(),
            unit: unit.into(),
            stream_capacity,
            streams: DashMap::new(),
            last_written: ArcSwapOption::empty(),
        }
    }

    pub fn id(&self) -> &MetricId {
        &self.id
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn details(&self) -> MetricDetails {
        MetricDetails {
            id: self.id.clone(),
            description: self.description.clone(),
            unit: self.unit.clone(),
        }
    }

    /// Get or create the stream for an attribute set.
    pub fn stream(&self, hash: AttributeSetHash) -> Arc<MetricStream> {
        let entry = self
            .streams
            .entry(hash)
            .or_insert_with(|| Arc::new(MetricStream::new(self.stream_capacity)));
        Arc::clone(entry.value())
    }

    /// Look up an existing stream without creating it.
    pub fn get_stream(&self, hash: AttributeSetHash) -> Option<Arc<MetricStream>> {
        self.streams.get(&hash).map(|entry| Arc::clone(entry.value()))
    }

    /// Append a point to the stream for `hash`.
    ///
    /// Returns false without touching any state when this metric's type is not stored.
    pub fn append(&self, hash: AttributeSetHash, point: MetricPoint) -> bool {
        if !self.metric_type.is_stored() {
            return false;
        }

        let stream = self.stream(hash);
        stream.append(point);
        self.last_written.store(Some(stream));
        true
    }

    /// Current point of the most recently written stream.
    pub fn current_point(&self) -> Option<MetricPoint> {
        self.last_written.load_full()?.current_point()
    }

    /// Retained history of the most recently written stream, oldest first.
    pub fn history(&self) -> Vec<MetricPoint> {
        self.last_written
            .load_full()
            .map(|stream| stream.snapshot())
            .unwrap_or_default()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}
