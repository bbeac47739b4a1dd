//! Stale browser state recovery
//!
//! A crashed run can leave browser processes and profile locks behind that
//! make the next launch fail. Recovery is best effort and never fails.

use std::path::PathBuf;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info, warn};

const LOCK_FILE_PATTERN: &str = "Singleton*";

/// Kills leftover browser processes and removes profile lock files
#[derive(Debug, Clone, Default)]
pub struct StaleStateRecovery {
    process_names: Vec<String>,
    lock_dirs: Vec<PathBuf>,
}

/// What a recovery pass cleaned up
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub processes_killed: usize,
    pub locks_removed: usize,
}

impl StaleStateRecovery {
    pub fn new(process_names: Vec<String>, lock_dirs: Vec<PathBuf>) -> Self {
        Self {
            process_names,
            lock_dirs,
        }
    }

    /// Recovery targeting the usual Chrome and Chromium process names and
    /// profile directories.
    pub fn chrome_defaults() -> Self {
        let process_names = ["chrome", "chromium", "chromium-browser", "headless_shell"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let mut lock_dirs = Vec::new();
        if let Some(home) = std::env::var_os("HOME").map(PathBuf::from) {
            lock_dirs.push(home.join(".config/chromium"));
            lock_dirs.push(home.join(".config/google-chrome"));
        }

        Self {
            process_names,
            lock_dirs,
        }
    }

    /// A recovery that does nothing
    pub fn disabled() -> Self {
        Self::default()
    }

    pub async fn recover(&self) -> RecoveryReport {
        let mut report = RecoveryReport::default();

        for name in &self.process_names {
            if kill_by_name(name).await {
                report.processes_killed += 1;
            }
        }
        if report.processes_killed > 0 {
            // Give the OS a moment to release profile locks held by the killed processes
            tokio::time::sleep(Duration::from_millis(500)).await;
        }

        for dir in &self.lock_dirs {
            report.locks_removed += remove_locks(dir).await;
        }

        if report.processes_killed > 0 || report.locks_removed > 0 {
            info!(
                "Recovered stale browser state: {} process group(s) killed, {} lock file(s) removed",
                report.processes_killed, report.locks_removed
            );
        }
        report
    }
}

/// Returns true when at least one process matched.
async fn kill_by_name(name: &str) -> bool {
    match Command::new("pkill").args(["-9", "-x", name]).output().await {
        Ok(output) => {
            let killed = output.status.success();
            if killed {
                debug!("Killed leftover '{}' processes", name);
            }
            killed
        }
        Err(e) => {
            debug!("pkill unavailable for '{}': {}", name, e);
            false
        }
    }
}

async fn remove_locks(dir: &std::path::Path) -> usize {
    let pattern = dir.join(LOCK_FILE_PATTERN);
    let Some(pattern) = pattern.to_str() else {
        return 0;
    };

    let paths = match glob::glob(pattern) {
        Ok(paths) => paths,
        Err(e) => {
            warn!("Invalid lock pattern {}: {}", pattern, e);
            return 0;
        }
    };

    let mut removed = 0;
    for path in paths.flatten() {
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Removed lock file {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to remove lock file {}: {}", path.display(), e),
        }
    }
    removed
}
