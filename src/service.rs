//! Session-scoped metric service.
//!
//! One `MetricService` is built per connection. It owns the resource
//! registry, the subscription hub and the ingestion pipeline, and exposes
//! the query and subscription surface used by the presentation side.

use crate::core::config::IngestionConfig;
use crate::ingest::{ExportBatch, IngestionPipeline, PipelineStats};
use crate::metrics::{MetricDetails, MetricId, MetricPoint, ResourceKey, ResourceRegistry};
use crate::subscription::{MetricIdStream, MetricValueStream, SubscriptionHub, SubscriptionStats};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Per-session entry point for ingestion, queries and subscriptions.
pub struct MetricService {
    registry: Arc<ResourceRegistry>,
    hub: Arc<SubscriptionHub>,
    pipeline: Arc<IngestionPipeline>,
    lifetime: CancellationToken,
    replay_existing_ids: bool,
}

impl MetricService {
    pub fn new(config: &IngestionConfig) -> Self {
        let registry = Arc::new(ResourceRegistry::new(config.stream_capacity));
        let hub = Arc::new(SubscriptionHub::new());
        let pipeline = Arc::new(IngestionPipeline::new(
            Arc::clone(&registry),
            Arc::clone(&hub),
            config.queue_capacity,
        ));

        Self {
            registry,
            hub,
            pipeline,
            lifetime: CancellationToken::new(),
            replay_existing_ids: config.replay_existing_ids,
        }
    }

    /// Spawn the ingestion consumer. It stops when the service shuts down.
    pub fn start(&self) -> JoinHandle<()> {
        tracing::info!("Starting metric ingestion");
        self.pipeline.spawn(self.lifetime.child_token())
    }

    /// Stop the consumer and end every subscription scoped to this service.
    pub fn shutdown(&self) {
        self.lifetime.cancel();
    }

    /// Token cancelled when the service shuts down; subscription lifetimes may nest under it.
    pub fn lifetime(&self) -> &CancellationToken {
        &self.lifetime
    }

    /// Hand a decoded export to the pipeline. Never blocks.
    pub fn send(&self, batch: ExportBatch) {
        self.pipeline.enqueue(batch);
    }

    pub fn get_metric_details(&self, id: &MetricId) -> Option<MetricDetails> {
        self.registry.metric(id).map(|metric| metric.details())
    }

    pub fn get_current_point(&self, id: &MetricId) -> Option<MetricPoint> {
        self.registry.metric(id)?.current_point()
    }

    /// Retained points of the series last written for `id`, oldest first.
    pub fn history(&self, id: &MetricId) -> Vec<MetricPoint> {
        self.registry
            .metric(id)
            .map(|metric| metric.history())
            .unwrap_or_default()
    }

    pub fn subscribe_metric_ids(&self, resource_key: &str) -> MetricIdStream {
        let registry = Arc::clone(&self.registry);
        let replay = self.replay_existing_ids;
        self.hub.subscribe_metric_ids(resource_key, move || {
            if !replay {
                return Vec::new();
            }
            registry
                .get(resource_key)
                .map(|resource| resource.metric_ids())
                .unwrap_or_default()
        })
    }

    pub fn subscribe_metric_values(&self, id: MetricId, lifetime: CancellationToken) -> MetricValueStream {
        self.hub.subscribe_to_values(id, lifetime)
    }

    /// Whether a live value subscription exists for `id`.
    pub fn is_subscribed(&self, id: &MetricId) -> bool {
        self.hub.is_subscribed(id)
    }

    pub fn resource_keys(&self) -> Vec<ResourceKey> {
        self.registry.keys()
    }

    pub fn metric_ids(&self, resource_key: &str) -> Vec<MetricId> {
        self.registry
            .get(resource_key)
            .map(|resource| resource.metric_ids())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> PipelineStats {
        self.pipeline.stats()
    }

    pub fn subscription_stats(&self) -> SubscriptionStats {
        self.hub.stats()
    }

    pub fn registry(&self) -> &Arc<ResourceRegistry> {
        &self.registry
    }
}

impl Drop for MetricService {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}
