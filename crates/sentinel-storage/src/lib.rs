//! # Sentinel Storage
//!
//! In-process state for price-sentinel.
//!
//! This crate provides:
//! - The prediction log: a bounded ring buffer of recent requests
//! - The reference statistics store built once from the training data
//!
//! Nothing here is durable. The log is operational monitoring, not an audit
//! trail, and is lost on restart.

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod log;
pub mod reference;

pub use log::{LogEntry, LogInput, LogQuery, LogStatus, LogSummary, PredictionLog};
pub use reference::{FeatureSummary, ReferenceSample, ReferenceSource, ReferenceStatistics};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::log::{LogEntry, LogStatus, LogSummary, PredictionLog};
    pub use crate::reference::{ReferenceSource, ReferenceStatistics};
}
