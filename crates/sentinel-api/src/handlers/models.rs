//! Model handlers
//!
//! - GET /metrics - offline training metrics, read from disk per request
//! - GET /models - loaded models with their accuracy status

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use price_sentinel_models::{registry::LOW_ACCURACY_R2, AccuracyStatus, ModelRegistry, ModelSlot};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::{ErrorResponse, SuccessResponse};

/// Shared state for model handlers
#[derive(Debug, Clone)]
pub struct ModelsState {
    pub registry: Arc<ModelRegistry>,
    /// Training metrics file, re-read on every request
    pub metrics_path: PathBuf,
}

impl ModelsState {
    pub fn new(registry: Arc<ModelRegistry>, metrics_path: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            metrics_path: metrics_path.into(),
        }
    }
}

/// One loaded model as shown to operators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub slot: ModelSlot,
    pub name: String,
    pub kind: String,
    pub r2: Option<f64>,
    pub mape: Option<f64>,
    pub accuracy_status: AccuracyStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub models: Vec<ModelInfo>,
    pub low_accuracy_threshold: f64,
    pub last_updated: Option<String>,
}

/// GET /metrics
#[instrument(skip(state))]
pub async fn training_metrics(State(state): State<Arc<ModelsState>>) -> Response {
    let content = match tokio::fs::read_to_string(&state.metrics_path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Metrics not found")),
            )
                .into_response();
        }
        Err(e) => {
            warn!(
                path = %state.metrics_path.display(),
                error = %e,
                "Failed to read training metrics"
            );
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response();
        }
    };

    match serde_json::from_str::<Value>(&content) {
        Ok(metrics) => (StatusCode::OK, Json(SuccessResponse::new(metrics))).into_response(),
        Err(e) => {
            warn!(
                path = %state.metrics_path.display(),
                error = %e,
                "Training metrics are not valid JSON"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(e.to_string())),
            )
                .into_response()
        }
    }
}

/// GET /models
#[instrument(skip(state))]
pub async fn list_models(State(state): State<Arc<ModelsState>>) -> impl IntoResponse {
    let models = state
        .registry
        .descriptors()
        .map(|d| ModelInfo {
            slot: d.slot,
            name: d.name.clone(),
            kind: d.regressor.kind().to_string(),
            r2: d.r2,
            mape: d.mape,
            accuracy_status: d.accuracy_status(),
        })
        .collect();

    let response = ModelsResponse {
        models,
        low_accuracy_threshold: LOW_ACCURACY_R2,
        last_updated: state
            .registry
            .training_metrics()
            .and_then(|m| m.last_updated.clone()),
    };

    (StatusCode::OK, Json(SuccessResponse::new(response)))
}
