//! OpenTelemetry metrics receivers.
//!
//! GRPC (OTLP `MetricsService`) and HTTP (`POST /v1/metrics`, protobuf)
//! transports. Both only decode and hand batches to the metric service;
//! they never wait for ingestion.

pub mod http;

use crate::core::{OtelHubError, Result};
use crate::service::MetricService;
use opentelemetry_proto::tonic::collector::metrics::v1::{
    metrics_service_server::{MetricsService, MetricsServiceServer},
    ExportMetricsServiceRequest, ExportMetricsServiceResponse,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::{transport::Server, Request, Response, Status};

/// Create a metrics service server for GRPC
pub fn create_metrics_service_server(
    service: Arc<MetricService>,
) -> MetricsServiceServer<OtlpMetricsReceiver> {
    MetricsServiceServer::new(OtlpMetricsReceiver::new(service))
}

/// OTLP metrics receiver feeding the ingestion queue
pub struct OtlpMetricsReceiver {
    service: Arc<MetricService>,
}

impl OtlpMetricsReceiver {
    /// Create new metrics receiver
    pub fn new(service: Arc<MetricService>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl MetricsService for OtlpMetricsReceiver {
    async fn export(
        &self,
        request: Request<ExportMetricsServiceRequest>,
    ) -> std::result::Result<Response<ExportMetricsServiceResponse>, Status> {
        let batch = request.into_inner();
        tracing::debug!("Received {} resource metrics via gRPC", batch.resource_metrics.len());

        self.service.send(batch);

        Ok(Response::new(ExportMetricsServiceResponse {
            partial_success: None,
        }))
    }
}

/// Serve OTLP/gRPC until `shutdown` is cancelled.
pub async fn start_grpc(
    service: Arc<MetricService>,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    tracing::info!("GRPC OTLP receiver binding to {}", addr);

    Server::builder()
        .add_service(create_metrics_service_server(service))
        .serve_with_shutdown(addr, shutdown.cancelled_owned())
        .await
        .map_err(|e| {
            tracing::error!("GRPC server error: {} (binding to {})", e, addr);
            OtelHubError::from(e)
        })?;

    tracing::info!("GRPC server stopped gracefully");
    Ok(())
}
