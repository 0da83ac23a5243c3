//! Common test utilities and fixtures.

#![allow(dead_code)]

use opentelemetry_proto::tonic::{
    collector::metrics::v1::ExportMetricsServiceRequest,
    common::v1::{any_value::Value, AnyValue, InstrumentationScope, KeyValue},
    metrics::v1::{
        metric::Data, number_data_point, Gauge, Histogram, HistogramDataPoint, Metric,
        NumberDataPoint, ResourceMetrics, ScopeMetrics, Sum,
    },
    resource::v1::Resource,
};
use otelhub_lib::core::config::IngestionConfig;
use otelhub_lib::MetricService;
use std::sync::Arc;
use std::time::Duration;

/// Nanoseconds per second, for OTLP timestamps.
pub const NANOS: u64 = 1_000_000_000;

pub fn kv(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(Value::StringValue(value.to_string())),
        }),
    }
}

/// Numeric data point at `seconds` with an integer value.
pub fn long_point(seconds: u64, value: i64, attributes: Vec<KeyValue>) -> NumberDataPoint {
    NumberDataPoint {
        attributes,
        start_time_unix_nano: 0,
        time_unix_nano: seconds * NANOS,
        value: Some(number_data_point::Value::AsInt(value)),
        exemplars: vec![],
        flags: 0,
    }
}

/// Numeric data point at `seconds` with a floating value.
pub fn double_point(seconds: u64, value: f64, attributes: Vec<KeyValue>) -> NumberDataPoint {
    NumberDataPoint {
        value: Some(number_data_point::Value::AsDouble(value)),
        ..long_point(seconds, 0, attributes)
    }
}

pub fn sum(name: &str, points: Vec<NumberDataPoint>) -> Metric {
    Metric {
        name: name.to_string(),
        description: format!("{} description", name),
        unit: "1".to_string(),
        metadata: vec![],
        data: Some(Data::Sum(Sum {
            data_points: points,
            aggregation_temporality: 2,
            is_monotonic: true,
        })),
    }
}

pub fn gauge(name: &str, points: Vec<NumberDataPoint>) -> Metric {
    Metric {
        name: name.to_string(),
        description: format!("{} description", name),
        unit: "ms".to_string(),
        metadata: vec![],
        data: Some(Data::Gauge(Gauge { data_points: points })),
    }
}

pub fn histogram(name: &str) -> Metric {
    Metric {
        name: name.to_string(),
        description: String::new(),
        unit: "ms".to_string(),
        metadata: vec![],
        data: Some(Data::Histogram(Histogram {
            data_points: vec![HistogramDataPoint {
                count: 2,
                sum: Some(10.0),
                time_unix_nano: NANOS,
                ..Default::default()
            }],
            aggregation_temporality: 2,
        })),
    }
}

/// Builder for export batches carrying a single resource.
pub struct TestBatchBuilder {
    resource_attributes: Vec<KeyValue>,
    scopes: Vec<ScopeMetrics>,
}

impl TestBatchBuilder {
    pub fn new(service_name: &str) -> Self {
        Self {
            resource_attributes: vec![kv("service.name", service_name)],
            scopes: Vec::new(),
        }
    }

    pub fn resource_attribute(mut self, key: &str, value: &str) -> Self {
        self.resource_attributes.push(kv(key, value));
        self
    }

    pub fn scope(mut self, name: &str, metrics: Vec<Metric>) -> Self {
        self.scopes.push(ScopeMetrics {
            scope: Some(InstrumentationScope {
                name: name.to_string(),
                ..Default::default()
            }),
            metrics,
            schema_url: String::new(),
        });
        self
    }

    pub fn build(self) -> ExportMetricsServiceRequest {
        ExportMetricsServiceRequest {
            resource_metrics: vec![ResourceMetrics {
                resource: Some(Resource {
                    attributes: self.resource_attributes,
                    dropped_attributes_count: 0,
                }),
                scope_metrics: self.scopes,
                schema_url: String::new(),
            }],
        }
    }
}

/// One sum data point for `service/scope/name`.
pub fn single_sum(service: &str, scope: &str, name: &str, seconds: u64, value: i64) -> ExportMetricsServiceRequest {
    TestBatchBuilder::new(service)
        .scope(scope, vec![sum(name, vec![long_point(seconds, value, vec![])])])
        .build()
}

pub fn service() -> Arc<MetricService> {
    service_with(IngestionConfig::default())
}

pub fn service_with(config: IngestionConfig) -> Arc<MetricService> {
    Arc::new(MetricService::new(&config))
}

/// Poll until `condition` holds or two seconds pass.
pub async fn wait_for<F>(mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
