//! API route definitions.
//!
//! ## Prediction
//! - `/` - Liveness banner
//! - `/predict` - Price estimate
//!
//! ## Models
//! - `/metrics` - Offline training metrics
//! - `/models` - Loaded models and accuracy status
//!
//! ## Monitoring
//! - `/logs` - Recent predictions
//! - `/drift` - Input drift report
//! - `/reference` - Reference statistics
//!
//! ## Infrastructure Endpoints
//! - `/health`, `/health/live`, `/health/ready` - Health checks
//! - `/prometheus` - Prometheus metrics

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;

use crate::{
    handlers::{
        get_drift, get_logs, get_reference, health, home, list_models, liveness, predict,
        prometheus_metrics, readiness, training_metrics, HealthState, MetricsState, ModelsState,
        MonitoringState, PredictState,
    },
    middleware::{cors_middleware, logging_middleware},
    ApiConfig,
};

/// Handler states for the service
#[derive(Debug, Clone)]
pub struct ServiceStates {
    pub predict: Arc<PredictState>,
    pub models: Arc<ModelsState>,
    pub monitoring: Arc<MonitoringState>,
    pub health: Arc<HealthState>,
    pub metrics: Arc<MetricsState>,
}

/// Create the API router
pub fn create_router(config: ApiConfig, states: ServiceStates) -> Router {
    let predict_routes = Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .with_state(states.predict);

    let model_routes = Router::new()
        .route("/metrics", get(training_metrics))
        .route("/models", get(list_models))
        .with_state(states.models);

    let monitoring_routes = Router::new()
        .route("/logs", get(get_logs))
        .route("/drift", get(get_drift))
        .route("/reference", get(get_reference))
        .with_state(states.monitoring);

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .with_state(states.health);

    let metrics_route = Router::new()
        .route("/prometheus", get(prometheus_metrics))
        .with_state(states.metrics);

    let app = Router::new()
        .merge(predict_routes)
        .merge(model_routes)
        .merge(monitoring_routes)
        .merge(health_routes)
        .merge(metrics_route)
        .layer(DefaultBodyLimit::max(config.max_body_size));

    let app = if config.enable_logging {
        app.layer(middleware::from_fn(logging_middleware))
    } else {
        app
    };

    let app = if config.enable_cors {
        app.layer(cors_middleware(config.cors_origins))
    } else {
        app
    };

    app.layer(TimeoutLayer::new(Duration::from_secs(config.timeout_secs)))
}
