//! price-sentinel main binary
//!
//! Wires the components of the service together:
//! - Models: dual-model registry loaded from trained artifacts
//! - Storage: prediction log and reference statistics
//! - Detection: input drift analysis
//! - Inference: request validation and prediction orchestration
//! - API: HTTP server

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use price_sentinel_api::prelude::*;
use price_sentinel_core::config::Config;
use price_sentinel_detection::{DriftConfig, DriftDetector};
use price_sentinel_inference::{FieldValidator, InferenceOrchestrator};
use price_sentinel_models::ModelRegistry;
use price_sentinel_storage::{PredictionLog, ReferenceStatistics};
use std::{net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// price-sentinel CLI arguments
#[derive(Debug, Parser)]
#[clap(name = "price-sentinel", version, about = "House price estimation with drift monitoring")]
struct Cli {
    /// Configuration file path
    #[clap(short, long, default_value = "config/price-sentinel.yaml", global = true)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[clap(long, env = "PRICE_SENTINEL_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging
    #[clap(long, env = "PRICE_SENTINEL_LOG_JSON", global = true)]
    log_json: bool,

    /// Load and validate everything, then exit
    #[clap(long, global = true)]
    dry_run: bool,

    /// Subcommand to execute
    #[clap(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
enum Commands {
    /// Start the HTTP service (default if no subcommand given)
    Serve,
    /// Predict one house price locally
    Predict {
        /// Building area (m2)
        #[clap(long)]
        lb: i64,
        /// Land area (m2)
        #[clap(long)]
        lt: i64,
        /// Bedrooms
        #[clap(long)]
        kt: i64,
        /// Bathrooms
        #[clap(long)]
        km: i64,
        /// Garage capacity
        #[clap(long)]
        grs: i64,
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },
    /// Show loaded models, their accuracy and the reference statistics
    Inspect {
        /// Output as JSON
        #[clap(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    info!("Starting price-sentinel v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::from_file_or_default(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;

    match cli.command {
        Some(Commands::Predict {
            lb,
            lt,
            kt,
            km,
            grs,
            json,
        }) => run_predict_command(&config, [lb, lt, kt, km, grs], json),
        Some(Commands::Inspect { json }) => run_inspect_command(&config, json),
        Some(Commands::Serve) | None => run_serve_command(&cli, config).await,
    }
}

/// Shared service components
struct Components {
    registry: Arc<ModelRegistry>,
    reference: Arc<ReferenceStatistics>,
    log: Arc<PredictionLog>,
    orchestrator: InferenceOrchestrator,
    detector: DriftDetector,
}

impl Components {
    fn build(config: &Config) -> Self {
        let registry = Arc::new(ModelRegistry::load(&config.models));
        let reference = Arc::new(ReferenceStatistics::initialize(&config.reference));
        let log = Arc::new(PredictionLog::new(config.monitoring.log_capacity));
        let orchestrator = InferenceOrchestrator::new(
            registry.clone(),
            FieldValidator::new(&config.validation),
            log.clone(),
        );
        let detector = DriftDetector::new(DriftConfig::from(&config.monitoring));

        Self {
            registry,
            reference,
            log,
            orchestrator,
            detector,
        }
    }
}

/// Run the HTTP service
async fn run_serve_command(cli: &Cli, config: Config) -> Result<()> {
    let components = Components::build(&config);

    if cli.dry_run {
        info!(
            models_loaded = components.registry.len(),
            reference_source = %components.reference.source,
            "Dry run mode - configuration and components validated, exiting"
        );
        return Ok(());
    }

    // PORT from the environment wins over the config file
    let port = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(config.server.port);

    let bind_addr: SocketAddr = format!("{}:{}", config.server.host, port)
        .parse()
        .context("Invalid server bind address")?;

    let metrics_state = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => MetricsState::with_handle(handle),
        Err(e) => {
            warn!(error = %e, "Prometheus recorder not installed, /prometheus disabled");
            MetricsState::new()
        }
    };

    let ready_registry = components.registry.clone();
    let states = ServiceStates {
        predict: Arc::new(PredictState::new(components.orchestrator)),
        models: Arc::new(ModelsState::new(
            components.registry.clone(),
            config.models.metrics_path.clone(),
        )),
        monitoring: Arc::new(MonitoringState::new(
            components.log,
            components.reference,
            components.detector,
        )),
        health: Arc::new(HealthState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            Arc::new(move || {
                if ready_registry.is_empty() {
                    Err("No trained model loaded".to_string())
                } else {
                    Ok(())
                }
            }),
        )),
        metrics: Arc::new(metrics_state),
    };

    let api_config = ApiConfig {
        bind_addr,
        enable_cors: true,
        cors_origins: vec!["*".to_string()],
        timeout_secs: config.server.request_timeout_secs,
        max_body_size: 1024 * 1024,
        enable_logging: true,
    };

    info!("Starting API server on {}", bind_addr);

    ApiServer::new(api_config, states)
        .serve(shutdown_signal())
        .await
        .context("API server failed")?;

    Ok(())
}

/// Predict a single price through the same path as the API
fn run_predict_command(config: &Config, values: [i64; 5], json_output: bool) -> Result<()> {
    let components = Components::build(config);

    let body = serde_json::json!({
        "LB": values[0],
        "LT": values[1],
        "KT": values[2],
        "KM": values[3],
        "GRS": values[4],
    });

    let result = components
        .orchestrator
        .handle_predict(&body)
        .context("Prediction failed")?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(60));
    println!("HOUSE PRICE ESTIMATE");
    println!("{}", "=".repeat(60));
    println!(
        "Input:       LB={} LT={} KT={} KM={} GRS={}",
        values[0], values[1], values[2], values[3], values[4]
    );
    println!("Prediction:  Rp {:.0}", result.prediction);
    println!("Model used:  {}", result.model_used);
    if result.details.switched {
        println!("             (switched to the backup model)");
    }
    println!();
    let breakdown = [
        ("Model 1", &result.details.model1),
        ("Model 2", &result.details.model2),
    ];
    for (label, outcome) in breakdown {
        match outcome {
            Some(o) => println!(
                "  {:<8} {:<28} Rp {:>18.0}  r2 {}",
                label,
                o.name,
                o.prediction,
                o.r2.map_or("n/a".to_string(), |r2| format!("{:.4}", r2))
            ),
            None => println!("  {:<8} (not loaded)", label),
        }
    }
    println!("{}", "=".repeat(60));

    Ok(())
}

/// Admin view of models and reference statistics
fn run_inspect_command(config: &Config, json_output: bool) -> Result<()> {
    let registry = ModelRegistry::load(&config.models);
    let reference = ReferenceStatistics::initialize(&config.reference);

    if json_output {
        let models: Vec<_> = registry
            .descriptors()
            .map(|d| {
                serde_json::json!({
                    "slot": d.slot,
                    "name": d.name,
                    "kind": d.regressor.kind(),
                    "r2": d.r2,
                    "mape": d.mape,
                    "accuracy_status": d.accuracy_status(),
                })
            })
            .collect();
        let output = serde_json::json!({
            "models": models,
            "last_updated": registry.training_metrics().and_then(|m| m.last_updated.clone()),
            "reference": reference,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!("\n{}", "=".repeat(70));
    println!("PRICE-SENTINEL INSPECTION");
    println!("{}", "=".repeat(70));
    println!("MODELS:");
    if registry.is_empty() {
        println!("  (no trained model loaded)");
    }
    for d in registry.descriptors() {
        println!(
            "  {:<7} {:<28} {:<7} r2 {:<8} mape {:<8} {:?}",
            d.slot.as_str(),
            d.name,
            d.regressor.kind(),
            d.r2.map_or("n/a".to_string(), |v| format!("{:.4}", v)),
            d.mape.map_or("n/a".to_string(), |v| format!("{:.4}", v)),
            d.accuracy_status(),
        );
    }
    if let Some(updated) = registry.training_metrics().and_then(|m| m.last_updated.as_deref()) {
        println!("  Last trained: {}", updated);
    }
    println!();
    println!("REFERENCE ({} samples, source: {}):", reference.count, reference.source);
    println!("  {:<6} {:>10} {:>10} {:>10} {:>10}", "Feat", "Mean", "Std", "Min", "Max");
    println!("  {}", "-".repeat(50));
    for (feature, s) in &reference.summaries {
        println!(
            "  {:<6} {:>10.2} {:>10.2} {:>10.2} {:>10.2}",
            feature.as_str(),
            s.mean,
            s.std,
            s.min,
            s.max
        );
    }
    println!("{}", "=".repeat(70));

    Ok(())
}

/// Wait for shutdown signal (SIGTERM or CTRL+C)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("Received Ctrl+C, shutting down..."); },
        _ = terminate => { info!("Received SIGTERM, shutting down..."); },
    }
}

/// Initialize logging.
///
/// `RUST_LOG` takes precedence when set; otherwise `--log-level` applies to
/// every target.
fn init_logging(cli: &Cli) -> Result<()> {
    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref(), &cli.log_level)?;

    let json_layer = cli
        .log_json
        .then(|| fmt::layer().json().with_current_span(true).with_span_list(false));
    let text_layer = (!cli.log_json).then(|| fmt::layer().with_target(true).with_line_number(true));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .context("Failed to install the tracing subscriber")?;

    Ok(())
}

fn log_filter(rust_log: Option<&str>, log_level: &str) -> Result<EnvFilter> {
    if let Some(directives) = rust_log.filter(|d| !d.trim().is_empty()) {
        return EnvFilter::try_new(directives)
            .with_context(|| format!("Invalid RUST_LOG: {}", directives));
    }
    let level = log_level
        .parse::<tracing::Level>()
        .with_context(|| format!("Invalid log level: {}", log_level))?;
    Ok(EnvFilter::default().add_directive(level.into()))
}
