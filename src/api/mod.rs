//! HTTP bridge between the metric service and the presentation layer.
//!
//! Request/response queries are plain JSON endpoints. Live feeds are
//! Server-Sent-Events streams whose subscription lifetime ends when the
//! client disconnects.

use crate::core::config::ApiConfig;
use crate::core::{OtelHubError, Result};
use crate::metrics::{MetricId, MetricValueEvent};
use crate::service::MetricService;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
    routing::get,
    Router,
};
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

/// API server state.
#[derive(Clone)]
struct ApiState {
    service: Arc<MetricService>,
    keep_alive: Duration,
}

/// Identifies one metric in query strings. `scope` may be empty.
#[derive(Debug, Deserialize)]
struct MetricQuery {
    resource: String,
    #[serde(default)]
    scope: String,
    name: String,
}

impl From<MetricQuery> for MetricId {
    fn from(query: MetricQuery) -> Self {
        MetricId::new(query.resource, query.scope, query.name)
    }
}

/// Discovery feed payload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MetricIdEvent {
    scope_name: String,
    metric_name: String,
}

/// Details response.
#[derive(Debug, Serialize)]
struct DetailsResponse {
    description: String,
    unit: String,
}

/// Error response.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    code: u16,
}

/// Build the bridge router.
pub fn create_api_router(service: Arc<MetricService>, config: &ApiConfig) -> Router {
    let state = ApiState {
        service,
        keep_alive: config.keep_alive,
    };

    let mut app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/resources", get(list_resources_handler))
        .route("/api/resources/:resource/metrics", get(list_metrics_handler))
        .route("/api/resources/:resource/metric-ids", get(metric_ids_feed_handler))
        .route("/api/metric/details", get(details_handler))
        .route("/api/metric/current", get(current_point_handler))
        .route("/api/metric/history", get(history_handler))
        .route("/api/metric/values", get(values_feed_handler))
        .with_state(state);

    if config.enable_cors {
        app = app.layer(CorsLayer::permissive());
    }

    app
}

/// Start the API server.
pub async fn start_server(
    service: Arc<MetricService>,
    config: ApiConfig,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    let app = create_api_router(service, &config);

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| OtelHubError::network(format!("Failed to bind to {}: {}", addr, e)))?;
    tracing::info!("Starting API server on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;
    Ok(())
}

/// GET /health
async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "resources": state.service.resource_keys().len(),
        "ingestion": state.service.stats(),
        "subscriptions": state.service.subscription_stats(),
    }))
}

/// GET /api/resources
async fn list_resources_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.service.resource_keys())
}

/// GET /api/resources/:resource/metrics
async fn list_metrics_handler(
    State(state): State<ApiState>,
    Path(resource): Path<String>,
) -> Response {
    if state.service.registry().get(&resource).is_none() {
        return not_found(&OtelHubError::ResourceNotFound(resource));
    }
    Json(state.service.metric_ids(&resource)).into_response()
}

/// GET /api/metric/details
async fn details_handler(
    State(state): State<ApiState>,
    Query(query): Query<MetricQuery>,
) -> Response {
    let id = MetricId::from(query);
    match state.service.get_metric_details(&id) {
        Some(details) => Json(DetailsResponse {
            description: details.description,
            unit: details.unit,
        })
        .into_response(),
        None => not_found(&OtelHubError::MetricNotFound(id.to_string())),
    }
}

/// GET /api/metric/current
async fn current_point_handler(
    State(state): State<ApiState>,
    Query(query): Query<MetricQuery>,
) -> Response {
    let id = MetricId::from(query);
    match state.service.get_current_point(&id) {
        Some(point) => Json(point).into_response(),
        None => not_found(&OtelHubError::MetricNotFound(id.to_string())),
    }
}

/// GET /api/metric/history
async fn history_handler(
    State(state): State<ApiState>,
    Query(query): Query<MetricQuery>,
) -> Response {
    let id = MetricId::from(query);
    if state.service.get_metric_details(&id).is_none() {
        return not_found(&OtelHubError::MetricNotFound(id.to_string()));
    }
    Json(state.service.history(&id)).into_response()
}

/// GET /api/resources/:resource/metric-ids (SSE)
async fn metric_ids_feed_handler(
    State(state): State<ApiState>,
    Path(resource): Path<String>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let events = state.service.subscribe_metric_ids(&resource).map(|id| {
        Event::default().event("metric-id").json_data(MetricIdEvent {
            scope_name: id.scope_name,
            metric_name: id.metric_name,
        })
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(state.keep_alive))
}

/// GET /api/metric/values (SSE)
///
/// The subscription lives until the client disconnects or the service shuts down.
async fn values_feed_handler(
    State(state): State<ApiState>,
    Query(query): Query<MetricQuery>,
) -> Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>> {
    let id = MetricId::from(query);
    let lifetime = state.service.lifetime().child_token();
    let guard = lifetime.clone().drop_guard();

    let events = state
        .service
        .subscribe_metric_values(id.clone(), lifetime)
        .map(move |point| {
            let _held_until_disconnect = &guard;
            Event::default().event("value").json_data(MetricValueEvent {
                id: id.clone(),
                point,
            })
        });

    Sse::new(events).keep_alive(KeepAlive::new().interval(state.keep_alive))
}

fn not_found(err: &OtelHubError) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: err.to_string(),
            code: 404,
        }),
    )
        .into_response()
}
