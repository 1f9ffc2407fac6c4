//! HTTP surface for the Ingest Orchestrator (§6): `POST /webhook` (aliased at
//! `/api/v2/webhook` for alertmanager-compatible callers), `GET /healthz`,
//! `GET /metrics`. Grounded on `fc-platform/src/event/api.rs`'s
//! `OpenApiRouter` + `routes!` convention and `bin/fc-platform-server`'s
//! split-router / Swagger-UI assembly.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio_util::sync::CancellationToken;
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use ah_store::AlertStore;

use crate::error::{IngestError, Result};
use crate::model::{HealthResponse, HealthState, IngestBatchRequest, IngestResponse};
use crate::orchestrator::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub store: Arc<dyn AlertStore>,
    pub metrics_handle: PrometheusHandle,
}

/// Ingest a batch of alerts (§4.H).
///
/// Runs each alert through upsert, classification, silence evaluation, and
/// publish fanout, then folds the per-alert outcomes into one batch status.
/// `200` when every alert succeeded, `207` on a mixed batch, `502` when every
/// alert failed.
#[utoipa::path(
    post,
    path = "/webhook",
    tag = "ingest",
    operation_id = "postWebhook",
    request_body = IngestBatchRequest,
    responses(
        (status = 200, description = "All alerts ingested successfully", body = IngestResponse),
        (status = 207, description = "Mixed per-alert outcomes", body = IngestResponse),
        (status = 400, description = "Empty or oversized batch"),
        (status = 502, description = "Every alert in the batch failed", body = IngestResponse),
    ),
)]
pub async fn webhook(State(state): State<AppState>, Json(req): Json<IngestBatchRequest>) -> Result<Response> {
    if req.alerts.is_empty() {
        return Err(IngestError::EmptyBatch);
    }
    const MAX_BATCH_SIZE: usize = 1000;
    if req.alerts.len() > MAX_BATCH_SIZE {
        return Err(IngestError::BatchTooLarge(req.alerts.len(), MAX_BATCH_SIZE));
    }

    let cancel = CancellationToken::new();
    let details = state.orchestrator.ingest(&cancel, req.alerts).await;
    let response = IngestResponse::from_details(details);
    let status = response.http_status();
    Ok((status, Json(response)).into_response())
}

/// Liveness/readiness probe (§6): `200` when the alert store answers, `503`
/// otherwise.
#[utoipa::path(
    get,
    path = "/healthz",
    tag = "ingest",
    operation_id = "getHealthz",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is unhealthy", body = HealthResponse),
    ),
)]
pub async fn healthz(State(state): State<AppState>) -> Response {
    let now = chrono::Utc::now();
    match state.store.get_alert_stats().await {
        Ok(_) => (StatusCode::OK, Json(HealthResponse { status: HealthState::Healthy, time: now })).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "healthz probe failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(HealthResponse { status: HealthState::Unhealthy, time: now })).into_response()
        }
    }
}

/// Prometheus text-format metrics (§6), rendered from the process-wide
/// recorder installed once at binary start.
pub async fn metrics(State(state): State<AppState>) -> Response {
    (StatusCode::OK, state.metrics_handle.render()).into_response()
}

pub fn ingest_router(state: AppState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(webhook))
        .routes(routes!(healthz))
        .with_state(state)
}

/// Assembles the full service router: the OpenAPI-collected ingest routes,
/// the alertmanager-compatible `/api/v2/webhook` alias, the plain `/metrics`
/// endpoint, and the Swagger UI.
pub fn app_router(state: AppState) -> axum::Router {
    let (router, mut openapi) = ingest_router(state.clone()).split_for_parts();

    openapi.info.title = "Alert History Service API".to_string();
    openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
    openapi.info.description = Some("Alert ingest, classification, and publishing fanout".to_string());

    let extra = axum::Router::new()
        .route("/api/v2/webhook", axum::routing::post(webhook))
        .route("/metrics", axum::routing::get(metrics))
        .with_state(state);

    axum::Router::new()
        .merge(router)
        .merge(extra)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", openapi))
}
