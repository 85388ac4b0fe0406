//! Errors returned to prediction callers.

use price_sentinel_core::features::{Feature, FeatureParseError};
use price_sentinel_models::RegistryError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictError {
    /// Required features absent from the request, in canonical order
    #[error("Missing features: [{}]", join_names(.0))]
    MissingFeatures(Vec<Feature>),

    /// A value outside its admissible range
    #[error("Validation Error: {0}")]
    Validation(String),

    /// No trained model is loaded
    #[error("No trained model is available, train the models first")]
    ModelUnavailable,

    /// Anything else that stopped the prediction
    #[error("{0}")]
    Inference(String),
}

fn join_names(features: &[Feature]) -> String {
    features
        .iter()
        .map(Feature::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl PredictError {
    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::MissingFeatures(_) => "missing_features",
            PredictError::Validation(_) => "validation",
            PredictError::ModelUnavailable => "model_unavailable",
            PredictError::Inference(_) => "inference",
        }
    }

    /// Missing feature names as sent on the wire
    pub fn missing_names(&self) -> Vec<&'static str> {
        match self {
            PredictError::MissingFeatures(features) => {
                features.iter().map(Feature::as_str).collect()
            }
            _ => Vec::new(),
        }
    }
}

impl From<FeatureParseError> for PredictError {
    fn from(err: FeatureParseError) -> Self {
        match err {
            FeatureParseError::Missing(features) => PredictError::MissingFeatures(features),
            other => PredictError::Inference(other.to_string()),
        }
    }
}

impl From<RegistryError> for PredictError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ModelUnavailable => PredictError::ModelUnavailable,
            other => PredictError::Inference(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_features_message() {
        let err = PredictError::MissingFeatures(vec![Feature::LandArea, Feature::Garages]);
        assert_eq!(err.to_string(), "Missing features: [LT, GRS]");
        assert_eq!(err.missing_names(), vec!["LT", "GRS"]);
        assert_eq!(err.kind(), "missing_features");
    }

    #[test]
    fn test_conversions() {
        let err: PredictError = RegistryError::ModelUnavailable.into();
        assert_eq!(err, PredictError::ModelUnavailable);

        let err: PredictError = RegistryError::NonFinitePrediction {
            model: "Linear Regression".to_string(),
        }
        .into();
        assert!(matches!(err, PredictError::Inference(_)));

        let err: PredictError = FeatureParseError::NotCoercible {
            feature: Feature::Bedrooms,
            value: "\"three\"".to_string(),
        }
        .into();
        assert_eq!(err.to_string(), "Cannot convert KT=\"three\" to integer");
    }

    #[test]
    fn test_validation_prefix() {
        let err = PredictError::Validation("LB=5 is outside [10, 2000]".to_string());
        assert_eq!(err.to_string(), "Validation Error: LB=5 is outside [10, 2000]");
    }
}
