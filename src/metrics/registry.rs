//! Resource tree: registry of resources, each owning its metrics.
//!
//! All maps here are append-only. Get-or-create goes through DashMap's entry
//! API so concurrent callers for the same key observe a single instance.

use crate::metrics::{
    metric::Metric,
    types::{MetricId, MetricType, ResourceKey},
};
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;

/// One telemetry-emitting process or service instance.
pub struct Resource {
    key: ResourceKey,
    stream_capacity: usize,
    metrics: DashMap<MetricId, Arc<Metric>>,
}

impl Resource {
    pub fn new(key: impl Into<ResourceKey>, stream_capacity: usize) -> Self {
        Self {
            key: key.into(),
            stream_capacity,
            metrics: DashMap::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get or create a metric. The returned flag is true only for the call that created it.
    ///
    /// `observed_type`, `description` and `unit` are only used on creation.
    pub fn get_or_add_metric(
        &self,
        id: MetricId,
        observed_type: MetricType,
        description: &str,
        unit: &str,
    ) -> (Arc<Metric>, bool) {
        if let Some(existing) = self.metrics.get(&id) {
            return (Arc::clone(existing.value()), false);
        }

        match self.metrics.entry(id) {
            Entry::Occupied(entry) => (Arc::clone(entry.get()), false),
            Entry::Vacant(entry) => {
                let metric = Arc::new(Metric::new(
                    entry.key().clone(),
                    observed_type,
                    description,
                    unit,
                    self.stream_capacity,
                ));
                entry.insert(Arc::clone(&metric));
                (metric, true)
            },
        }
    }

    pub fn get_metric(&self, id: &MetricId) -> Option<Arc<Metric>> {
        self.metrics.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Identities of all metrics seen so far, sorted.
    pub fn metric_ids(&self) -> Vec<MetricId> {
        let mut ids: Vec<MetricId> = self.metrics.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }
}

/// Session-wide map from resource key to resource.
pub struct ResourceRegistry {
    resources: DashMap<ResourceKey, Arc<Resource>>,
    stream_capacity: usize,
}

impl ResourceRegistry {
    pub fn new(stream_capacity: usize) -> Self {
        Self {
            resources: DashMap::new(),
            stream_capacity,
        }
    }

    /// Get or create the resource for `key`; concurrent callers share one instance.
    pub fn get_or_add(&self, key: &str) -> Arc<Resource> {
        if let Some(existing) = self.resources.get(key) {
            return Arc::clone(existing.value());
        }

        let entry = self
            .resources
            .entry(key.to_string())
            .or_insert_with(|| {
                tracing::debug!("New resource registered: {}", key);
                Arc::new(Resource::new(key, self.stream_capacity))
            });
        Arc::clone(entry.value())
    }

    pub fn get(&self, key: &str) -> Option<Arc<Resource>> {
        self.resources.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Resolve a metric through its resource.
    pub fn metric(&self, id: &MetricId) -> Option<Arc<Metric>> {
        self.get(&id.resource_key)?.get_metric(id)
    }

    /// All resource keys, sorted.
    pub fn keys(&self) -> Vec<ResourceKey> {
        let mut keys: Vec<ResourceKey> = self.resources.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
