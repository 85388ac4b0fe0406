//! # Sentinel Models
//!
//! Trained regressors and the registry that serves them.
//!
//! Model artifacts are produced offline and loaded once at startup. The
//! registry holds at most two of them (a primary and a backup) together with
//! their offline accuracy metrics, and picks which prediction to return.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod artifact;
pub mod registry;
pub mod training;

pub use artifact::{ForestModel, LinearModel, ModelArtifact, Regressor};
pub use training::{ModelMetrics, TrainingMetrics};
pub use registry::{
    select_model, AccuracyStatus, ModelDescriptor, ModelOutcome, ModelRegistry, ModelSlot,
    PredictionDetails, RegistryError, Selection,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::artifact::{ModelArtifact, Regressor};
    pub use crate::training::TrainingMetrics;
    pub use crate::registry::{
        select_model, ModelDescriptor, ModelRegistry, ModelSlot, PredictionDetails,
        RegistryError, Selection,
    };
}
