//! Offline training metrics written next to the model artifacts.

use price_sentinel_core::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Evaluation scores of one trained model on the held-out split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub name: String,
    /// Coefficient of determination
    pub r2: f64,
    /// Mean absolute percentage error (fraction, not percent)
    pub mape: f64,
}

/// Contents of `metrics.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetrics {
    #[serde(default)]
    pub model1: Option<ModelMetrics>,
    #[serde(default)]
    pub model2: Option<ModelMetrics>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl TrainingMetrics {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&content)?)
    }
}
