//! # Sentinel Core
//!
//! Shared building blocks for price-sentinel:
//! - The five house features and the typed feature vector
//! - Error types used across the workspace
//! - YAML configuration
//! - Descriptive statistics helpers

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod config;
pub mod error;
pub mod features;
pub mod stats;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{
        Config, ModelsConfig, MonitoringConfig, ReferenceConfig, ServerConfig, ValidationConfig,
    };
    pub use crate::error::{Error, Result};
    pub use crate::features::{Feature, FeatureRange, FeatureVector};
}
