//! GET /prometheus - process counters in Prometheus text format

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Shared state for the exposition endpoint
#[derive(Clone, Default)]
pub struct MetricsState {
    handle: Option<PrometheusHandle>,
}

impl std::fmt::Debug for MetricsState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsState")
            .field("handle", &self.handle.is_some())
            .finish()
    }
}

impl MetricsState {
    /// State without a recorder; the endpoint answers 503
    pub fn new() -> Self {
        Self { handle: None }
    }

    pub fn with_handle(handle: PrometheusHandle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

pub async fn prometheus_metrics(State(state): State<Arc<MetricsState>>) -> Response {
    match &state.handle {
        Some(handle) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            "Prometheus recorder not installed",
        )
            .into_response(),
    }
}
