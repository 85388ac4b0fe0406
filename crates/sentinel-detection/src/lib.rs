//! # Sentinel Detection
//!
//! Input drift detection for price-sentinel.
//!
//! Recent successful request inputs are compared feature by feature with
//! the reference (training) distribution. Two algorithms share one report
//! shape:
//! - [`StatisticalDrift`]: Kolmogorov-Smirnov / chi-square tests
//! - [`MeanShiftDrift`]: standardized mean difference, used as a fallback

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod drift;
pub mod stats;

pub use drift::{
    DriftAlgorithm, DriftConfig, DriftDetector, DriftMethod, DriftReport, FeatureDrift,
    InsufficientData, MeanShiftDrift, Severity, StatisticalDrift,
};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::drift::{DriftDetector, DriftReport, InsufficientData, Severity};
}
