//! Health check handlers
//!
//! - GET /health - service summary
//! - GET /health/live - process is up
//! - GET /health/ready - at least one model can serve predictions

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Readiness probe; `Err` carries the reason
pub type ReadinessCheck = Arc<dyn Fn() -> Result<(), String> + Send + Sync>;

/// Shared state for health handlers
#[derive(Clone)]
pub struct HealthState {
    version: String,
    started_at: Instant,
    readiness: ReadinessCheck,
}

impl fmt::Debug for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HealthState")
            .field("version", &self.version)
            .field("started_at", &self.started_at)
            .finish()
    }
}

impl HealthState {
    pub fn new(version: String, readiness: ReadinessCheck) -> Self {
        Self {
            version,
            started_at: Instant::now(),
            readiness,
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub message: Option<String>,
}

/// GET /health
pub async fn health(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let (status, message) = match (state.readiness)() {
        Ok(()) => ("healthy", None),
        Err(reason) => ("degraded", Some(reason)),
    };
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: status.to_string(),
            version: state.version.clone(),
            uptime_secs: state.uptime_secs(),
            message,
        }),
    )
}

/// GET /health/live
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /health/ready
pub async fn readiness(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    match (state.readiness)() {
        Ok(()) => (StatusCode::OK, "READY".to_string()),
        Err(reason) => (StatusCode::SERVICE_UNAVAILABLE, reason),
    }
}
