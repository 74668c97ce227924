//! Background sweep of orphaned scratch scopes.
//!
//! Scopes are normally removed when their request ends. A process that is
//! killed mid-request leaves its scope behind; this task removes such
//! directories once they are older than the configured age. Scopes of
//! requests still in flight are never removed, however old.

use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};

use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::scratch::{scope_id, ScratchSpace};

/// Configuration for the cleanup task.
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// Whether cleanup is enabled
    pub enabled: bool,
    /// How often to run cleanup (in seconds)
    pub interval_secs: u64,
    /// Minimum age of a scope before it is removed (in seconds)
    pub max_age_secs: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 3600,
            max_age_secs: 3600,
        }
    }
}

/// Statistics from a cleanup run.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize)]
pub struct CleanupStats {
    /// Scope directories inspected
    pub scanned: u64,
    /// Scope directories removed
    pub removed: u64,
    /// Removal failures
    pub errors: u64,
}

/// Background cleanup task.
pub struct CleanupTask {
    scratch: ScratchSpace,
    config: CleanupConfig,
}

impl CleanupTask {
    pub fn new(scratch: ScratchSpace, config: CleanupConfig) -> Self {
        Self { scratch, config }
    }

    /// Run the cleanup task once.
    pub async fn run_once(&self) -> io::Result<CleanupStats> {
        let max_age = Duration::from_secs(self.config.max_age_secs);
        let now = SystemTime::now();
        let mut stats = CleanupStats::default();

        let mut entries = tokio::fs::read_dir(self.scratch.root()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if scope_id(name).is_none() {
                continue;
            }

            let metadata = entry.metadata().await?;
            if !metadata.is_dir() {
                continue;
            }
            stats.scanned += 1;

            if self.scratch.is_live(name) {
                continue;
            }
            if !is_expired(&entry.path(), metadata.modified().ok(), now, max_age) {
                continue;
            }

            match tokio::fs::remove_dir_all(entry.path()).await {
                Ok(()) => {
                    debug!(scope = %name, "Removed orphaned scratch scope");
                    stats.removed += 1;
                }
                Err(e) => {
                    // Log but continue - the owning request may have just finished
                    warn!(scope = %name, error = %e, "Failed to remove scratch scope");
                    stats.errors += 1;
                }
            }
        }

        info!(
            scanned = stats.scanned,
            removed = stats.removed,
            errors = stats.errors,
            "Cleanup cycle complete"
        );

        Ok(stats)
    }

    /// Run the cleanup task in a loop.
    pub async fn run_forever(self) {
        if !self.config.enabled {
            info!("Cleanup task disabled");
            return;
        }

        info!(
            interval_secs = self.config.interval_secs,
            max_age_secs = self.config.max_age_secs,
            root = %self.scratch.root().display(),
            "Starting cleanup background task"
        );

        let mut ticker = interval(Duration::from_secs(self.config.interval_secs.max(1)));

        // The first tick completes immediately, so this also sweeps on startup
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                error!(error = %e, "Cleanup cycle failed");
            }
        }
    }
}

fn is_expired(path: &Path, modified: Option<SystemTime>, now: SystemTime, max_age: Duration) -> bool {
    match modified {
        Some(modified) => now.duration_since(modified).unwrap_or_default() >= max_age,
        None => {
            warn!(path = %path.display(), "Scratch scope has no modification time");
            false
        }
    }
}
