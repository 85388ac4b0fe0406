//! API request handlers.
//!
//! - Prediction: `/`, `/predict`
//! - Models: `/metrics`, `/models`
//! - Monitoring: `/logs`, `/drift`, `/reference`
//! - Infrastructure: `/health*`, `/prometheus`

pub mod health;
pub mod models;
pub mod monitoring;
pub mod predict;
pub mod prometheus;

pub use health::*;
pub use models::*;
pub use monitoring::*;
pub use predict::*;
pub use prometheus::*;
