//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use gis_common::{Crs, MissingCrsPolicy};

use crate::cleanup::CleanupConfig;

/// QuickGIS API Server
#[derive(Parser, Debug, Clone)]
#[command(name = "gis-api")]
#[command(about = "Convert, preview, buffer and clip geospatial files over HTTP")]
pub struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:8000", env = "GIS_LISTEN_ADDR")]
    pub listen: String,

    /// Log level
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Number of worker threads
    #[arg(long, env = "GIS_WORKER_THREADS")]
    pub worker_threads: Option<usize>,

    /// Root directory for per-request scratch scopes
    #[arg(long, env = "GIS_SCRATCH_DIR")]
    pub scratch_dir: Option<PathBuf>,

    /// Maximum request body size in MiB
    #[arg(long, default_value_t = 512, env = "GIS_MAX_UPLOAD_MB")]
    pub max_upload_mb: usize,

    /// What to do with inputs that declare no CRS: `assume` or `reject`
    #[arg(long, default_value = "assume", env = "GIS_MISSING_CRS")]
    pub missing_crs: String,

    /// CRS assumed for inputs without one
    #[arg(long, default_value = "EPSG:4326", env = "GIS_DEFAULT_CRS")]
    pub default_crs: String,

    /// Projected CRS used for buffer distances and vector overlay
    #[arg(long, default_value = "EPSG:3857", env = "GIS_METRIC_CRS")]
    pub metric_crs: String,

    /// Comma-separated origins allowed with credentials (empty = any origin)
    #[arg(long, env = "GIS_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Vec<String>,

    /// Periodically remove scratch scopes orphaned by crashes
    #[arg(long, default_value_t = true, action = ArgAction::Set, env = "GIS_ENABLE_CLEANUP")]
    pub enable_cleanup: bool,

    /// Seconds between scratch sweeps
    #[arg(long, default_value_t = 3600, env = "GIS_CLEANUP_INTERVAL_SECS")]
    pub cleanup_interval_secs: u64,

    /// Age in seconds after which an orphaned scope is removed
    #[arg(long, default_value_t = 3600, env = "GIS_SCRATCH_MAX_AGE_SECS")]
    pub scratch_max_age_secs: u64,
}

/// Validated service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen: SocketAddr,
    pub scratch_root: PathBuf,
    pub max_upload_bytes: usize,
    pub missing_crs: MissingCrsPolicy,
    /// CRS of every vector output.
    pub output_crs: Crs,
    pub metric_crs: Crs,
    pub cors_origins: Vec<String>,
    pub cleanup: CleanupConfig,
}

/// Default scratch root: `<system temp>/quickgis`.
pub fn default_scratch_root() -> PathBuf {
    std::env::temp_dir().join("quickgis")
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8000)),
            scratch_root: default_scratch_root(),
            max_upload_bytes: 512 * 1024 * 1024,
            missing_crs: MissingCrsPolicy::default(),
            output_crs: Crs::wgs84(),
            metric_crs: Crs::web_mercator(),
            cors_origins: Vec::new(),
            cleanup: CleanupConfig::default(),
        }
    }
}

impl ServiceConfig {
    pub fn from_args(args: &Args) -> Result<Self> {
        let listen: SocketAddr = args
            .listen
            .parse()
            .with_context(|| format!("Invalid listen address: {}", args.listen))?;

        let missing_crs = MissingCrsPolicy::from_config(&args.missing_crs, &args.default_crs)
            .context("Invalid missing-CRS policy")?;

        let metric_crs = Crs::parse(&args.metric_crs)
            .with_context(|| format!("Invalid metric CRS: {}", args.metric_crs))?;

        if args.max_upload_mb == 0 {
            anyhow::bail!("max upload size must be at least 1 MiB");
        }

        let cors_origins = args
            .cors_origins
            .iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        Ok(Self {
            listen,
            scratch_root: args.scratch_dir.clone().unwrap_or_else(default_scratch_root),
            max_upload_bytes: args.max_upload_mb.saturating_mul(1024 * 1024),
            missing_crs,
            output_crs: Crs::wgs84(),
            metric_crs,
            cors_origins,
            cleanup: CleanupConfig {
                enabled: args.enable_cleanup,
                interval_secs: args.cleanup_interval_secs,
                max_age_secs: args.scratch_max_age_secs,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Args {
        let mut argv = vec!["gis-api"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_args(&parse(&[])).unwrap();
        assert_eq!(config.listen.port(), 8000);
        assert_eq!(config.max_upload_bytes, 512 * 1024 * 1024);
        assert_eq!(config.missing_crs, MissingCrsPolicy::Assume(Crs::wgs84()));
        assert_eq!(config.metric_crs, Crs::web_mercator());
        assert!(config.cleanup.enabled);
    }

    #[test]
    fn test_reject_policy_and_origins() {
        let args = parse(&[
            "--missing-crs",
            "reject",
            "--cors-origins",
            "https://a.example, https://b.example",
            "--enable-cleanup",
            "false",
        ]);
        let config = ServiceConfig::from_args(&args).unwrap();
        assert_eq!(config.missing_crs, MissingCrsPolicy::Reject);
        assert_eq!(config.cors_origins, vec!["https://a.example", "https://b.example"]);
        assert!(!config.cleanup.enabled);
    }

    #[test]
    fn test_invalid_values() {
        assert!(ServiceConfig::from_args(&parse(&["--listen", "nowhere"])).is_err());
        assert!(ServiceConfig::from_args(&parse(&["--missing-crs", "guess"])).is_err());
        assert!(ServiceConfig::from_args(&parse(&["--metric-crs", "EPSG:abc"])).is_err());
        assert!(ServiceConfig::from_args(&parse(&["--max-upload-mb", "0"])).is_err());
    }
}
