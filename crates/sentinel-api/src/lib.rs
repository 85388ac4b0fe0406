//! # Sentinel API
//!
//! HTTP surface of price-sentinel:
//! - `POST /predict` - price estimate with the per-model breakdown
//! - `GET /metrics`, `/models` - offline accuracy of the trained models
//! - `GET /logs`, `/drift`, `/reference` - monitoring
//! - `GET /health*`, `/prometheus` - infrastructure

#![warn(missing_debug_implementations, rust_2018_idioms, unreachable_pub)]

pub mod handlers;
pub mod middleware;
pub mod routes;

use axum::Router;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::net::SocketAddr;
use tracing::info;

pub use routes::{create_router, ServiceStates};

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub timeout_secs: u64,
    pub max_body_size: usize,
    pub enable_logging: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            enable_cors: true,
            cors_origins: vec!["*".to_string()],
            timeout_secs: 30,
            max_body_size: 1024 * 1024,
            enable_logging: true,
        }
    }
}

/// `{"status": "success", "data": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse<T> {
    pub status: String,
    pub data: T,
}

impl<T> SuccessResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            status: "success".to_string(),
            data,
        }
    }
}

/// `{"status": "error", "message": ...}`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

/// HTTP server wrapping the router
#[derive(Debug)]
pub struct ApiServer {
    config: ApiConfig,
    router: Router,
}

impl ApiServer {
    pub fn new(config: ApiConfig, states: ServiceStates) -> Self {
        let router = create_router(config.clone(), states);
        Self { config, router }
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests
    pub async fn serve<F>(self, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        info!(addr = %self.config.bind_addr, "API server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("API server shut down gracefully");
        Ok(())
    }
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::handlers::{
        HealthState, MetricsState, ModelsState, MonitoringState, PredictState,
    };
    pub use crate::{ApiConfig, ApiServer, ErrorResponse, ServiceStates, SuccessResponse};
}
