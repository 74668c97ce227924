//! Application state for the QuickGIS API.

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::ServiceConfig;
use crate::pipeline::PipelineContext;
use crate::scratch::ScratchSpace;

/// Shared application state.
pub struct AppState {
    /// Validated service configuration.
    pub config: ServiceConfig,

    /// Scratch root and the scopes of in-flight requests.
    pub scratch: ScratchSpace,

    /// Prometheus exporter handle, absent when no recorder is installed.
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Create the state and make sure the scratch root exists.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.scratch_root).with_context(|| {
            format!(
                "Failed to create scratch directory: {}",
                config.scratch_root.display()
            )
        })?;

        Ok(Self {
            scratch: ScratchSpace::new(config.scratch_root.clone()),
            config,
            prometheus: None,
        })
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }

    /// CRS settings handed to the blocking pipeline.
    pub fn pipeline_context(&self) -> PipelineContext {
        PipelineContext {
            missing_crs: self.config.missing_crs.clone(),
            output_crs: self.config.output_crs.clone(),
            metric_crs: self.config.metric_crs.clone(),
        }
    }
}
