//! QuickGIS API Server
//!
//! Converts, previews, buffers and clips uploaded geospatial files.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use gis_api::cleanup::CleanupTask;
use gis_api::config::{Args, ServiceConfig};
use gis_api::state::AppState;

fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Build runtime with configured threads
    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();

    if let Some(threads) = args.worker_threads {
        runtime_builder.worker_threads(threads);
    }

    let runtime = runtime_builder
        .build()
        .context("Failed to create Tokio runtime")?;

    runtime.block_on(run_server(args))
}

async fn run_server(args: Args) -> Result<()> {
    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .json()
        .init();

    info!("Starting QuickGIS API server");

    let config = ServiceConfig::from_args(&args)?;
    let addr = config.listen;

    let prometheus = PrometheusBuilder::new()
        .install_recorder()
        .context("Failed to install Prometheus recorder")?;

    let state = Arc::new(AppState::new(config)?.with_prometheus(prometheus));

    info!(
        scratch_root = %state.config.scratch_root.display(),
        max_upload_bytes = state.config.max_upload_bytes,
        missing_crs = ?state.config.missing_crs,
        metric_crs = %state.config.metric_crs,
        "Configuration loaded"
    );

    let cleanup = CleanupTask::new(state.scratch.clone(), state.config.cleanup.clone());
    tokio::spawn(cleanup.run_forever());

    let app = gis_api::build_router(state);

    info!("QuickGIS API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server failed")?;

    Ok(())
}
