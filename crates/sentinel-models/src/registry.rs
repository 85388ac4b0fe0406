//! Dual-model registry and the accuracy-based switching rule.
//!
//! Model 1 is the primary, model 2 the backup. Every loaded model is run on
//! each request so callers can audit both raw predictions; the returned
//! value comes from the model chosen by [`select_model`].

use crate::artifact::{ModelArtifact, Regressor};
use crate::training::{ModelMetrics, TrainingMetrics};
use price_sentinel_core::{config::ModelsConfig, features::FeatureVector};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// r2 below which a model is flagged as low accuracy in the admin view
pub const LOW_ACCURACY_R2: f64 = 0.65;

/// Errors raised while serving a prediction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// No trained model is loaded
    #[error("No trained model is available")]
    ModelUnavailable,

    /// A model produced an unusable value
    #[error("Model '{model}' returned a non-finite prediction")]
    NonFinitePrediction { model: String },
}

/// Registry position of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelSlot {
    #[serde(rename = "model1")]
    Primary,
    #[serde(rename = "model2")]
    Secondary,
}

impl ModelSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSlot::Primary => "model1",
            ModelSlot::Secondary => "model2",
        }
    }

    fn default_name(&self) -> &'static str {
        match self {
            ModelSlot::Primary => "Model 1",
            ModelSlot::Secondary => "Model 2",
        }
    }
}

/// Choose which model's prediction to return.
///
/// With both models present the secondary wins only when its r2 is strictly
/// greater; ties and unknown (NaN) metrics favour the primary. A lone model is
/// used unconditionally, whatever its r2.
pub fn select_model(
    primary_r2: f64,
    secondary_r2: f64,
    primary_present: bool,
    secondary_present: bool,
) -> Option<ModelSlot> {
    match (primary_present, secondary_present) {
        (true, true) if secondary_r2 > primary_r2 => Some(ModelSlot::Secondary),
        (true, true) if secondary_r2.is_finite() && primary_r2.is_nan() => {
            Some(ModelSlot::Secondary)
        }
        (true, _) => Some(ModelSlot::Primary),
        (false, true) => Some(ModelSlot::Secondary),
        (false, false) => None,
    }
}

/// Accuracy bucket shown to operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccuracyStatus {
    Optimal,
    LowAccuracy,
    Unknown,
}

impl AccuracyStatus {
    pub fn from_r2(r2: Option<f64>) -> Self {
        match r2 {
            Some(r2) if r2 >= LOW_ACCURACY_R2 => AccuracyStatus::Optimal,
            Some(r2) if r2.is_finite() => AccuracyStatus::LowAccuracy,
            _ => AccuracyStatus::Unknown,
        }
    }
}

/// A loaded model with its offline metrics. Immutable after load.
#[derive(Debug, Clone)]
pub struct ModelDescriptor {
    pub slot: ModelSlot,
    pub name: String,
    pub regressor: Arc<dyn Regressor>,
    pub r2: Option<f64>,
    pub mape: Option<f64>,
}

impl ModelDescriptor {
    pub fn new(slot: ModelSlot, name: impl Into<String>, regressor: Arc<dyn Regressor>) -> Self {
        Self {
            slot,
            name: name.into(),
            regressor,
            r2: None,
            mape: None,
        }
    }

    pub fn with_metrics(mut self, r2: f64, mape: f64) -> Self {
        self.r2 = Some(r2);
        self.mape = Some(mape);
        self
    }

    pub fn accuracy_status(&self) -> AccuracyStatus {
        AccuracyStatus::from_r2(self.r2)
    }

    fn r2_or_nan(&self) -> f64 {
        self.r2.unwrap_or(f64::NAN)
    }
}

/// One model's contribution to a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelOutcome {
    pub name: String,
    pub prediction: f64,
    pub r2: Option<f64>,
}

/// Per-model breakdown returned with every prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionDetails {
    pub model1: Option<ModelOutcome>,
    pub model2: Option<ModelOutcome>,
    /// True when the backup model's prediction was returned
    pub switched: bool,
}

/// Result of [`ModelRegistry::predict_best`]
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub value: f64,
    pub model_used: String,
    pub slot: ModelSlot,
    pub details: PredictionDetails,
}

/// Holds up to two trained regressors.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    primary: Option<ModelDescriptor>,
    secondary: Option<ModelDescriptor>,
    training_metrics: Option<TrainingMetrics>,
}

impl ModelRegistry {
    /// Build a registry from already loaded descriptors
    pub fn new(primary: Option<ModelDescriptor>, secondary: Option<ModelDescriptor>) -> Self {
        Self {
            primary,
            secondary,
            training_metrics: None,
        }
    }

    /// Load both artifacts and the training metrics.
    ///
    /// Missing or broken files are not fatal: the affected slot stays empty
    /// and a warning is logged.
    pub fn load(config: &ModelsConfig) -> Self {
        let training_metrics = match TrainingMetrics::load(&config.metrics_path) {
            Ok(metrics) => Some(metrics),
            Err(e) => {
                warn!(
                    path = %config.metrics_path.display(),
                    error = %e,
                    "Training metrics unavailable, model accuracy unknown"
                );
                None
            }
        };

        let primary = load_descriptor(
            ModelSlot::Primary,
            &config.primary_path,
            training_metrics.as_ref().and_then(|m| m.model1.as_ref()),
        );
        let secondary = load_descriptor(
            ModelSlot::Secondary,
            &config.secondary_path,
            training_metrics.as_ref().and_then(|m| m.model2.as_ref()),
        );

        let registry = Self {
            primary,
            secondary,
            training_metrics,
        };

        if registry.is_empty() {
            warn!("No model loaded, predictions will be rejected until models are trained");
        } else {
            info!(models_loaded = registry.len(), "Model registry ready");
        }

        registry
    }

    pub fn primary(&self) -> Option<&ModelDescriptor> {
        self.primary.as_ref()
    }

    pub fn secondary(&self) -> Option<&ModelDescriptor> {
        self.secondary.as_ref()
    }

    /// Loaded descriptors, primary first
    pub fn descriptors(&self) -> impl Iterator<Item = &ModelDescriptor> {
        self.primary.iter().chain(self.secondary.iter())
    }

    pub fn len(&self) -> usize {
        self.descriptors().count()
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_none()
    }

    /// Metrics file contents captured at load time
    pub fn training_metrics(&self) -> Option<&TrainingMetrics> {
        self.training_metrics.as_ref()
    }

    /// Predict with every loaded model and return the selected one.
    pub fn predict_best(&self, features: &FeatureVector) -> Result<Selection, RegistryError> {
        let slot = select_model(
            self.primary.as_ref().map_or(f64::NAN, ModelDescriptor::r2_or_nan),
            self.secondary.as_ref().map_or(f64::NAN, ModelDescriptor::r2_or_nan),
            self.primary.is_some(),
            self.secondary.is_some(),
        )
        .ok_or(RegistryError::ModelUnavailable)?;

        let model1 = self.primary.as_ref().map(|d| run(d, features)).transpose()?;
        let model2 = self.secondary.as_ref().map(|d| run(d, features)).transpose()?;

        let chosen = match slot {
            ModelSlot::Primary => model1.as_ref(),
            ModelSlot::Secondary => model2.as_ref(),
        }
        .ok_or(RegistryError::ModelUnavailable)?;

        let selection = Selection {
            value: chosen.prediction,
            model_used: chosen.name.clone(),
            slot,
            details: PredictionDetails {
                switched: slot == ModelSlot::Secondary,
                model1,
                model2,
            },
        };

        debug!(
            model = selection.slot.as_str(),
            switched = selection.details.switched,
            prediction = selection.value,
            "Model selected"
        );
        ::metrics::counter!(
            "price_sentinel_model_selection_total",
            "model" => selection.slot.as_str()
        )
        .increment(1);

        Ok(selection)
    }
}

fn run(
    descriptor: &ModelDescriptor,
    features: &FeatureVector,
) -> Result<ModelOutcome, RegistryError> {
    let prediction = descriptor.regressor.predict(features);
    if !prediction.is_finite() {
        return Err(RegistryError::NonFinitePrediction {
            model: descriptor.name.clone(),
        });
    }
    Ok(ModelOutcome {
        name: descriptor.name.clone(),
        prediction,
        r2: descriptor.r2,
    })
}

fn load_descriptor(
    slot: ModelSlot,
    path: &Path,
    metrics: Option<&ModelMetrics>,
) -> Option<ModelDescriptor> {
    let artifact = match ModelArtifact::load(path) {
        Ok(artifact) => artifact,
        Err(e) => {
            warn!(
                model = slot.as_str(),
                path = %path.display(),
                error = %e,
                "Model artifact not loaded"
            );
            return None;
        }
    };

    let name = metrics
        .map(|m| m.name.clone())
        .or_else(|| artifact.name().map(str::to_string))
        .unwrap_or_else(|| slot.default_name().to_string());

    let mut descriptor = ModelDescriptor::new(slot, name, artifact.into_regressor());
    if let Some(m) = metrics {
        descriptor = descriptor.with_metrics(m.r2, m.mape);
    }

    info!(
        model = slot.as_str(),
        name = %descriptor.name,
        kind = descriptor.regressor.kind(),
        r2 = ?descriptor.r2,
        "Model loaded"
    );

    Some(descriptor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::LinearModel;
    use std::path::PathBuf;

    fn linear(intercept: f64) -> Arc<dyn Regressor> {
        Arc::new(LinearModel::new(intercept, [1.0, 1.0, 1.0, 1.0, 1.0]))
    }

    fn sample() -> FeatureVector {
        FeatureVector::new(100, 120, 3, 2, 1)
    }

    #[test]
    fn test_select_model_policy() {
        assert_eq!(select_model(0.9, 0.95, true, true), Some(ModelSlot::Secondary));
        assert_eq!(select_model(0.95, 0.9, true, true), Some(ModelSlot::Primary));
        assert_eq!(select_model(0.9, 0.9, true, true), Some(ModelSlot::Primary));
        assert_eq!(select_model(0.1, 0.99, true, false), Some(ModelSlot::Primary));
        assert_eq!(select_model(0.99, 0.1, false, true), Some(ModelSlot::Secondary));
        assert_eq!(select_model(0.5, 0.5, false, false), None);
    }

    #[test]
    fn test_select_model_unknown_metrics() {
        assert_eq!(select_model(0.9, f64::NAN, true, true), Some(ModelSlot::Primary));
        assert_eq!(select_model(f64::NAN, f64::NAN, true, true), Some(ModelSlot::Primary));
        assert_eq!(select_model(f64::NAN, 0.2, true, true), Some(ModelSlot::Secondary));
    }

    #[test]
    fn test_switches_to_more_accurate_secondary() {
        let registry = ModelRegistry::new(
            Some(
                ModelDescriptor::new(ModelSlot::Primary, "Linear Regression", linear(0.0))
                    .with_metrics(0.9, 0.2),
            ),
            Some(
                ModelDescriptor::new(ModelSlot::Secondary, "Random Forest", linear(1_000.0))
                    .with_metrics(0.95, 0.1),
            ),
        );

        let selection = registry.predict_best(&sample()).unwrap();
        assert!(selection.details.switched);
        assert_eq!(selection.slot, ModelSlot::Secondary);
        assert_eq!(selection.model_used, "Random Forest");
        assert_eq!(selection.value, 1_226.0);

        let model1 = selection.details.model1.unwrap();
        assert_eq!(model1.prediction, 226.0);
        assert_eq!(model1.r2, Some(0.9));
        assert_eq!(selection.details.model2.unwrap().r2, Some(0.95));
    }

    #[test]
    fn test_primary_alone_ignores_its_metric() {
        let registry = ModelRegistry::new(
            Some(
                ModelDescriptor::new(ModelSlot::Primary, "Linear Regression", linear(0.0))
                    .with_metrics(0.1, 0.9),
            ),
            None,
        );

        let selection = registry.predict_best(&sample()).unwrap();
        assert!(!selection.details.switched);
        assert_eq!(selection.model_used, "Linear Regression");
        assert!(selection.details.model2.is_none());
    }

    #[test]
    fn test_secondary_alone_is_used() {
        let registry = ModelRegistry::new(
            None,
            Some(ModelDescriptor::new(ModelSlot::Secondary, "Random Forest", linear(5.0))),
        );
        let selection = registry.predict_best(&sample()).unwrap();
        assert_eq!(selection.slot, ModelSlot::Secondary);
        assert!(selection.details.switched);
        assert!(selection.details.model1.is_none());
    }

    #[test]
    fn test_empty_registry_is_unavailable() {
        let registry = ModelRegistry::default();
        assert!(registry.is_empty());
        assert_eq!(
            registry.predict_best(&sample()),
            Err(RegistryError::ModelUnavailable)
        );
    }

    #[test]
    fn test_non_finite_prediction_rejected() {
        let broken: Arc<dyn Regressor> = Arc::new(LinearModel::new(f64::INFINITY, [0.0; 5]));
        let registry = ModelRegistry::new(
            Some(ModelDescriptor::new(ModelSlot::Primary, "broken", broken)),
            None,
        );
        assert!(matches!(
            registry.predict_best(&sample()),
            Err(RegistryError::NonFinitePrediction { .. })
        ));
    }

    #[test]
    fn test_accuracy_status() {
        assert_eq!(AccuracyStatus::from_r2(Some(0.8)), AccuracyStatus::Optimal);
        assert_eq!(AccuracyStatus::from_r2(Some(0.65)), AccuracyStatus::Optimal);
        assert_eq!(AccuracyStatus::from_r2(Some(0.5)), AccuracyStatus::LowAccuracy);
        assert_eq!(AccuracyStatus::from_r2(None), AccuracyStatus::Unknown);
    }

    #[test]
    fn test_load_degrades_when_files_missing() {
        let dir = tempfile::tempdir().unwrap();
        let primary_path = dir.path().join("model_1.json");
        let artifact = ModelArtifact::Linear(LinearModel::new(10.0, [2.0; 5]));
        std::fs::write(&primary_path, serde_json::to_string(&artifact).unwrap()).unwrap();
        std::fs::write(
            dir.path().join("metrics.json"),
            r#"{"model1": {"name": "Linear Regression", "r2": 0.7, "mape": 0.3}}"#,
        )
        .unwrap();

        let config = ModelsConfig {
            primary_path,
            secondary_path: PathBuf::from(dir.path().join("model_2.json")),
            metrics_path: dir.path().join("metrics.json"),
        };

        let registry = ModelRegistry::load(&config);
        assert_eq!(registry.len(), 1);
        let primary = registry.primary().unwrap();
        assert_eq!(primary.name, "Linear Regression");
        assert_eq!(primary.r2, Some(0.7));
        assert!(registry.secondary().is_none());
        assert!(registry.training_metrics().is_some());
    }

    #[test]
    fn test_load_with_nothing_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config = ModelsConfig {
            primary_path: dir.path().join("a.json"),
            secondary_path: dir.path().join("b.json"),
            metrics_path: dir.path().join("metrics.json"),
        };
        let registry = ModelRegistry::load(&config);
        assert!(registry.is_empty());
        assert!(registry.training_metrics().is_none());
    }
}
