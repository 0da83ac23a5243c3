//! HTTP OTLP receiver implementation.
//!
//! Implements the OTLP/HTTP metrics endpoint (`POST /v1/metrics`) with
//! protobuf payloads.

use crate::core::{OtelHubError, Result};
use crate::service::MetricService;
use axum::{
    body::Bytes,
    extract::State,
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use prost::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// HTTP OTLP server state.
#[derive(Clone)]
pub struct HttpOtelState {
    pub service: Arc<MetricService>,
}

/// Create HTTP router for OTLP endpoints.
pub fn create_http_router(service: Arc<MetricService>) -> Router {
    let state = HttpOtelState { service };

    Router::new()
        .route("/v1/metrics", post(handle_metrics_v1))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve OTLP/HTTP until `shutdown` is cancelled.
pub async fn start_http(
    service: Arc<MetricService>,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| OtelHubError::network(format!("Failed to bind to {}: {}", addr, e)))?;
    tracing::info!("HTTP OTLP receiver listening on {}", addr);

    axum::serve(listener, create_http_router(service))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

/// Handle OTLP metrics export requests.
async fn handle_metrics_v1(
    State(state): State<HttpOtelState>,
    headers: HeaderMap,
    body: Bytes,
) -> std::result::Result<impl IntoResponse, HttpError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/x-protobuf");

    if !(content_type.contains("application/x-protobuf")
        || content_type.contains("application/octet-stream"))
    {
        return Err(HttpError::UnsupportedMediaType(content_type.to_string()));
    }

    let batch = ExportMetricsServiceRequest::decode(body.as_ref())
        .map_err(|e| OtelHubError::protocol(format!("Failed to parse protobuf: {}", e)))?;
    tracing::debug!(
        "Received {} resource metrics via HTTP ({} bytes)",
        batch.resource_metrics.len(),
        body.len()
    );

    state.service.send(batch);

    Ok(Json(serde_json::json!({
        "partialSuccess": null
    })))
}

/// Health check endpoint.
async fn health_check(State(state): State<HttpOtelState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "otelhub-http-receiver",
        "ingestion": state.service.stats(),
    }))
}

/// HTTP error types.
#[derive(Debug)]
pub enum HttpError {
    BadRequest(String),
    UnsupportedMediaType(String),
}

impl From<OtelHubError> for HttpError {
    fn from(err: OtelHubError) -> Self {
        tracing::warn!(category = err.category(), "Rejected OTLP export: {}", err);
        HttpError::BadRequest(err.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            HttpError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            HttpError::UnsupportedMediaType(content_type) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                format!("Unsupported content type: {}", content_type),
            ),
        };

        let body = Json(serde_json::json!({
            "error": error_message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}
