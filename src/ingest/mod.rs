//! Ingestion pipeline: intake queue plus the single consumer that applies
//! export batches to the resource tree.
//!
//! Batches are applied strictly in enqueue order by one task, so every
//! mutation of a given series happens on that task. Queries from other tasks
//! read the tree concurrently.

pub mod queue;

use crate::metrics::{
    resource_key, AttributeSetHash, Metric, MetricId, MetricPoint, MetricType, PointValue,
    ResourceRegistry,
};
use crate::subscription::SubscriptionHub;
use opentelemetry_proto::tonic::{
    collector::metrics::v1::ExportMetricsServiceRequest,
    metrics::v1::{metric::Data, number_data_point, NumberDataPoint},
};
use queue::BatchQueue;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// One decoded OTLP metrics export.
pub type ExportBatch = ExportMetricsServiceRequest;

/// Operational counters for the pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Batches accepted by `enqueue`
    pub enqueued: u64,
    /// Batches discarded to make room for newer ones
    pub dropped: u64,
    /// Batches applied by the consumer
    pub processed: u64,
    /// Batches currently waiting
    pub queued: usize,
}

/// What applying one batch changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Resource blocks visited
    pub resources: usize,
    /// Metric blocks visited
    pub metrics: usize,
    /// Metrics created by this batch
    pub discovered: usize,
    /// Points appended to streams
    pub points: usize,
    /// Value pushes delivered to subscribers
    pub pushed: usize,
}

pub struct IngestionPipeline {
    queue: BatchQueue<ExportBatch>,
    registry: Arc<ResourceRegistry>,
    hub: Arc<SubscriptionHub>,
    processed: AtomicU64,
    overloaded: AtomicBool,
}

impl IngestionPipeline {
    pub fn new(registry: Arc<ResourceRegistry>, hub: Arc<SubscriptionHub>, queue_capacity: usize) -> Self {
        Self {
            queue: BatchQueue::new(queue_capacity),
            registry,
            hub,
            processed: AtomicU64::new(0),
            overloaded: AtomicBool::new(false),
        }
    }

    /// Accept a batch without blocking. Under overload the oldest queued batch is lost.
    pub fn enqueue(&self, batch: ExportBatch) {
        if self.queue.push(batch) && !self.overloaded.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                "Ingestion queue full (capacity {}), dropping oldest batches",
                self.queue.capacity()
            );
        }
    }

    /// Start the consumer loop on the current runtime.
    pub fn spawn(self: &Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        let pipeline = Arc::clone(self);
        tokio::spawn(async move { pipeline.run(shutdown).await })
    }

    /// Drain the queue until `shutdown` is cancelled. Cancellation is a normal stop.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::debug!("Ingestion consumer started");
        loop {
            let batch = tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                batch = self.queue.pop() => batch,
            };

            let summary = self.apply(&batch);
            self.processed.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                resources = summary.resources,
                metrics = summary.metrics,
                discovered = summary.discovered,
                points = summary.points,
                pushed = summary.pushed,
                "Applied metrics batch"
            );

            if self.queue.is_empty() && self.overloaded.swap(false, Ordering::Relaxed) {
                tracing::info!(
                    "Ingestion queue drained, {} batches dropped so far",
                    self.queue.total_dropped()
                );
            }
        }
        tracing::debug!("Ingestion consumer stopped");
    }

    /// Route one batch into the resource tree and notify subscribers.
    pub fn apply(&self, batch: &ExportBatch) -> BatchSummary {
        let mut summary = BatchSummary::default();

        for resource_metrics in &batch.resource_metrics {
            let key = resource_key(resource_metrics.resource.as_ref());
            let resource = self.registry.get_or_add(&key);
            summary.resources += 1;

            for scope_metrics in &resource_metrics.scope_metrics {
                let scope_name = scope_metrics
                    .scope
                    .as_ref()
                    .map(|scope| scope.name.as_str())
                    .unwrap_or_default();

                for otlp_metric in &scope_metrics.metrics {
                    let id = MetricId::new(key.as_str(), scope_name, otlp_metric.name.as_str());
                    let (metric, created) = resource.get_or_add_metric(
                        id,
                        MetricType::from_data(otlp_metric.data.as_ref()),
                        &otlp_metric.description,
                        &otlp_metric.unit,
                    );
                    summary.metrics += 1;

                    if created {
                        tracing::debug!("Discovered metric {} ({:?})", metric.id(), metric.metric_type());
                        self.hub.metric_discovered(metric.id());
                        summary.discovered += 1;
                    }

                    self.apply_data_points(&metric, otlp_metric.data.as_ref(), &mut summary);
                }
            }
        }

        summary
    }

    fn apply_data_points(&self, metric: &Metric, data: Option<&Data>, summary: &mut BatchSummary) {
        // Points are routed by the type fixed at creation, not by this export's tag.
        let data_points = match (metric.metric_type(), data) {
            (MetricType::Gauge, Some(Data::Gauge(gauge))) => &gauge.data_points,
            (MetricType::Sum, Some(Data::Sum(sum))) => &sum.data_points,
            _ => return,
        };

        for data_point in data_points {
            let Some(point) = to_metric_point(data_point) else {
                continue;
            };

            metric.append(AttributeSetHash::of(&data_point.attributes), point);
            summary.points += 1;
            summary.pushed += self.hub.publish(metric.id(), point);
        }
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            enqueued: self.queue.total_pushed(),
            dropped: self.queue.total_dropped(),
            processed: self.processed.load(Ordering::Relaxed),
            queued: self.queue.len(),
        }
    }
}

/// Convert a numeric data point; points without a value are skipped.
fn to_metric_point(data_point: &NumberDataPoint) -> Option<MetricPoint> {
    let value = match data_point.value.as_ref()? {
        number_data_point::Value::AsInt(v) => PointValue::Long(*v),
        number_data_point::Value::AsDouble(v) => PointValue::Double(*v),
    };
    let seconds = i64::try_from(data_point.time_unix_nano / 1_000_000_000).unwrap_or(i64::MAX);
    Some(MetricPoint::new(seconds, value))
}
