//! # Sentinel Inference
//!
//! The request path for price predictions: parse the body into a typed
//! [`FeatureVector`](price_sentinel_core::features::FeatureVector), validate
//! it, run the model registry and record the outcome in the prediction log.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod error;
pub mod orchestrator;
pub mod validator;

pub use error::PredictError;
pub use orchestrator::{InferenceOrchestrator, PredictionResult};
pub use validator::FieldValidator;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::PredictError;
    pub use crate::orchestrator::{InferenceOrchestrator, PredictionResult};
    pub use crate::validator::FieldValidator;
}
