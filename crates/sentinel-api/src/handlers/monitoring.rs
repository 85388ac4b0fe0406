//! Monitoring handlers
//!
//! - GET /logs?limit=50&status= - recent predictions, newest first
//! - GET /drift - input drift report
//! - GET /reference - reference statistics summary

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use price_sentinel_detection::DriftDetector;
use price_sentinel_storage::{LogQuery, LogStatus, PredictionLog, ReferenceStatistics};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::SuccessResponse;

/// Default number of entries returned by `/logs`
pub const DEFAULT_LOGS_LIMIT: usize = 50;

/// Shared state for monitoring handlers
#[derive(Debug, Clone)]
pub struct MonitoringState {
    pub log: Arc<PredictionLog>,
    pub reference: Arc<ReferenceStatistics>,
    pub detector: DriftDetector,
}

impl MonitoringState {
    pub fn new(
        log: Arc<PredictionLog>,
        reference: Arc<ReferenceStatistics>,
        detector: DriftDetector,
    ) -> Self {
        Self {
            log,
            reference,
            detector,
        }
    }
}

/// Query of `/logs`. `limit` is kept raw so that a malformed value falls
/// back to the default instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogsParams {
    pub limit: Option<String>,
    pub status: Option<String>,
}

impl LogsParams {
    pub fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(DEFAULT_LOGS_LIMIT)
    }
}

/// GET /logs
#[instrument(skip(state))]
pub async fn get_logs(
    State(state): State<Arc<MonitoringState>>,
    Query(params): Query<LogsParams>,
) -> impl IntoResponse {
    let limit = params.limit();

    let result = match params.status.as_deref().filter(|s| !s.is_empty()) {
        None => state.log.query(limit, None),
        Some(raw) => match raw.parse::<LogStatus>() {
            Ok(status) => state.log.query(limit, Some(status)),
            // No entry can carry an unknown status
            Err(_) => LogQuery {
                logs: Vec::new(),
                summary: state.log.summary(),
            },
        },
    };

    debug!(returned = result.logs.len(), total = result.summary.total_requests, "Logs queried");
    (StatusCode::OK, Json(SuccessResponse::new(result)))
}

/// GET /drift
#[instrument(skip(state))]
pub async fn get_drift(State(state): State<Arc<MonitoringState>>) -> Response {
    match state.detector.analyze(&state.log, &state.reference) {
        Some(report) => (StatusCode::OK, Json(SuccessResponse::new(report))).into_response(),
        None => {
            let payload = state.detector.insufficient(&state.log);
            (StatusCode::OK, Json(SuccessResponse::new(payload))).into_response()
        }
    }
}

/// GET /reference
#[instrument(skip(state))]
pub async fn get_reference(State(state): State<Arc<MonitoringState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(SuccessResponse::new(state.reference.as_ref().clone())),
    )
}
