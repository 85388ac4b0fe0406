//! Prediction handlers
//!
//! - GET / - liveness banner
//! - POST /predict - price estimate

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use price_sentinel_inference::{InferenceOrchestrator, PredictError};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::instrument;

use crate::ErrorResponse;

/// Shared state for the predict endpoint
#[derive(Debug, Clone)]
pub struct PredictState {
    pub orchestrator: InferenceOrchestrator,
}

impl PredictState {
    pub fn new(orchestrator: InferenceOrchestrator) -> Self {
        Self { orchestrator }
    }
}

/// Body of a 400 for absent features
#[derive(Debug, Clone, Serialize)]
pub struct MissingFeaturesResponse {
    pub error: String,
    pub missing: Vec<&'static str>,
}

/// HTTP mapping of [`PredictError`]
#[derive(Debug)]
pub struct PredictFailure(pub PredictError);

impl IntoResponse for PredictFailure {
    fn into_response(self) -> Response {
        let err = self.0;
        match &err {
            PredictError::MissingFeatures(_) => (
                StatusCode::BAD_REQUEST,
                Json(MissingFeaturesResponse {
                    error: err.to_string(),
                    missing: err.missing_names(),
                }),
            )
                .into_response(),
            PredictError::Validation(_) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(err.to_string()))).into_response()
            }
            PredictError::ModelUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new(err.to_string())),
            )
                .into_response(),
            PredictError::Inference(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new(err.to_string())),
            )
                .into_response(),
        }
    }
}

/// GET /
pub async fn home() -> &'static str {
    "House Price Prediction API is Up!"
}

/// POST /predict
///
/// The body is taken raw so that unparseable JSON is still logged.
#[instrument(skip(state, body), fields(body_len = body.len()))]
pub async fn predict(State(state): State<Arc<PredictState>>, body: Bytes) -> Response {
    let raw: Value = match serde_json::from_slice(&body) {
        Ok(raw) => raw,
        Err(e) => {
            let err = state
                .orchestrator
                .record_unparseable(format!("Invalid JSON body: {}", e));
            return PredictFailure(err).into_response();
        }
    };

    match state.orchestrator.handle_predict(&raw) {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => PredictFailure(err).into_response(),
    }
}
