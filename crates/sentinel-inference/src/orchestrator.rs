//! Prediction orchestrator.
//!
//! Every call to [`InferenceOrchestrator::handle_predict`] appends exactly
//! one entry to the prediction log, success or failure.

use crate::error::PredictError;
use crate::validator::FieldValidator;
use price_sentinel_core::features::FeatureVector;
use price_sentinel_models::{ModelRegistry, PredictionDetails};
use price_sentinel_storage::{LogEntry, PredictionLog};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Successful prediction payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub status: String,
    pub prediction: f64,
    pub model_used: String,
    pub details: PredictionDetails,
}

/// Parses, validates, predicts and logs.
#[derive(Debug, Clone)]
pub struct InferenceOrchestrator {
    registry: Arc<ModelRegistry>,
    validator: FieldValidator,
    log: Arc<PredictionLog>,
}

impl InferenceOrchestrator {
    pub fn new(
        registry: Arc<ModelRegistry>,
        validator: FieldValidator,
        log: Arc<PredictionLog>,
    ) -> Self {
        info!(
            models_loaded = registry.len(),
            validation_enforced = validator.is_enforced(),
            log_capacity = log.capacity(),
            "Creating inference orchestrator"
        );
        Self {
            registry,
            validator,
            log,
        }
    }

    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    pub fn log(&self) -> &Arc<PredictionLog> {
        &self.log
    }

    /// Handle one prediction request body.
    pub fn handle_predict(&self, raw: &Value) -> Result<PredictionResult, PredictError> {
        let Some(object) = raw.as_object() else {
            return Err(self.reject(
                Map::new(),
                PredictError::Inference("Request body must be a JSON object".to_string()),
            ));
        };

        let features = match FeatureVector::from_json(object) {
            Ok(features) => features,
            Err(e) => return Err(self.reject(object.clone(), e.into())),
        };

        if let Err(message) = self.validator.validate(&features) {
            return Err(self.reject(object.clone(), PredictError::Validation(message)));
        }

        let selection = match self.registry.predict_best(&features) {
            Ok(selection) => selection,
            Err(e) => return Err(self.reject(object.clone(), e.into())),
        };

        self.log.append(LogEntry::success(features, &selection));
        ::metrics::counter!("price_sentinel_predictions_total", "status" => "success").increment(1);
        debug!(
            prediction = selection.value,
            model = %selection.model_used,
            switched = selection.details.switched,
            "Prediction served"
        );

        Ok(PredictionResult {
            status: "success".to_string(),
            prediction: selection.value,
            model_used: selection.model_used,
            details: selection.details,
        })
    }

    /// Log a request whose body could not be parsed at all
    pub fn record_unparseable(&self, message: impl Into<String>) -> PredictError {
        self.reject(Map::new(), PredictError::Inference(message.into()))
    }

    fn reject(&self, input: Map<String, Value>, error: PredictError) -> PredictError {
        match &error {
            PredictError::ModelUnavailable | PredictError::Inference(_) => {
                warn!(kind = error.kind(), error = %error, "Prediction failed")
            }
            _ => debug!(kind = error.kind(), error = %error, "Prediction rejected"),
        }
        self.log.append(LogEntry::failure(input, error.to_string()));
        ::metrics::counter!(
            "price_sentinel_predictions_total",
            "status" => "error",
            "kind" => error.kind()
        )
        .increment(1);
        error
    }
}
