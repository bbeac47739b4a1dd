//! Console and per-run file logging
//!
//! Each run writes a fresh `run_<timestamp>.log` at debug level next to the
//! info-level console output. A one-shot run gets one file per process; the
//! scheduler calls [`RunLog::rotate`] so every scheduled run gets its own.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::error::{AgentError, Result};

/// Dependencies that are too chatty at debug level
const FILE_DIRECTIVES: &str = "debug,headless_chrome=info,tungstenite=info,hyper=info,hyper_util=info,reqwest=info,rustls=info";

const MAX_SAME_SECOND: u32 = 1000;

pub fn log_file_name(now: DateTime<Local>) -> String {
    format!("run_{}.log", now.format("%Y%m%d_%H%M%S"))
}

/// Create `<dir>/run_<timestamp>.log`, creating `dir` if needed
///
/// An existing file from the same second is never overwritten; the new one
/// gets a `_2`, `_3`, ... suffix.
pub fn create_log_file(dir: &Path) -> Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir).map_err(|e| {
        AgentError::Logging(format!("Failed to create log directory {}: {}", dir.display(), e))
    })?;
    let name = log_file_name(Local::now());
    let stem = name.trim_end_matches(".log");

    for attempt in 1..=MAX_SAME_SECOND {
        let path = match attempt {
            1 => dir.join(&name),
            n => dir.join(format!("{}_{}.log", stem, n)),
        };
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(AgentError::Logging(format!(
                    "Failed to create log file {}: {}",
                    path.display(),
                    e
                )));
            }
        }
    }
    Err(AgentError::Logging(format!(
        "Too many log files named {} in {}",
        name,
        dir.display()
    )))
}

struct ActiveLog {
    path: PathBuf,
    file: File,
}

/// The debug log file, swappable between runs
#[derive(Clone)]
pub struct RunLog {
    dir: PathBuf,
    active: Arc<Mutex<ActiveLog>>,
}

impl RunLog {
    /// Open the first log file under `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        let (path, file) = create_log_file(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            active: Arc::new(Mutex::new(ActiveLog { path, file })),
        })
    }

    pub fn path(&self) -> PathBuf {
        self.lock().path.clone()
    }

    /// Close the current file and continue in a fresh one. Returns its path.
    pub fn rotate(&self) -> Result<PathBuf> {
        let (path, file) = create_log_file(&self.dir)?;
        let mut previous = std::mem::replace(
            &mut *self.lock(),
            ActiveLog {
                path: path.clone(),
                file,
            },
        );
        // the lock is released; logging here goes to the new file
        if let Err(e) = previous.file.flush() {
            tracing::warn!("Failed to flush {}: {}", previous.path.display(), e);
        }
        Ok(path)
    }

    fn lock(&self) -> MutexGuard<'_, ActiveLog> {
        self.active.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog").field("path", &self.path()).finish()
    }
}

/// Writer for one formatted event, holding the file lock while it writes
pub struct RunLogWriter<'a>(MutexGuard<'a, ActiveLog>);

impl Write for RunLogWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.file.flush()
    }
}

impl<'a> MakeWriter<'a> for RunLog {
    type Writer = RunLogWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        RunLogWriter(self.lock())
    }
}

/// Install the global subscriber. Returns the handle to the log file.
///
/// `RUST_LOG` overrides the console level; `verbose` lowers the default to
/// debug.
pub fn init(dir: &Path, verbose: bool) -> Result<RunLog> {
    let log = RunLog::open(dir)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let file_layer = fmt::layer()
        .with_writer(log.clone())
        .with_ansi(false)
        .with_target(false)
        .with_filter(EnvFilter::new(FILE_DIRECTIVES));

    let console_layer = fmt::layer().with_target(false).with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| AgentError::Logging(format!("Failed to install logger: {}", e)))?;

    tracing::info!("Log file: {}", log.path().display());
    Ok(log)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_name() {
        let now = Local.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(log_file_name(now), "run_20250309_070501.log");
    }

    #[test]
    fn test_create_log_file_makes_directory() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("nested/logs");

        let (path, _file) = create_log_file(&dir).unwrap();
        assert!(path.exists());
        assert!(path.starts_with(&dir));
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("run_") && name.ends_with(".log"));
    }

    #[test]
    fn test_create_log_file_never_clobbers() {
        let root = TempDir::new().unwrap();
        let paths: Vec<PathBuf> = (0..3).map(|_| create_log_file(root.path()).unwrap().0).collect();

        assert_ne!(paths[0], paths[1]);
        assert_ne!(paths[1], paths[2]);
        assert_ne!(paths[0], paths[2]);
        assert!(paths.iter().all(|p| p.exists()));
    }

    #[test]
    fn test_rotate_sends_later_lines_to_a_new_file() {
        let root = TempDir::new().unwrap();
        let log = RunLog::open(root.path()).unwrap();
        let first = log.path();

        writeln!(log.make_writer(), "scheduled run 1").unwrap();
        let second = log.rotate().unwrap();
        writeln!(log.make_writer(), "scheduled run 2").unwrap();

        assert_ne!(first, second);
        assert_eq!(log.path(), second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "scheduled run 1\n");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "scheduled run 2\n");
    }

    #[test]
    fn test_subscriber_writes_through_run_log() {
        let root = TempDir::new().unwrap();
        let log = RunLog::open(root.path()).unwrap();
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_writer(log.clone())
                .with_ansi(false)
                .with_filter(EnvFilter::new("info")),
        );

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!("before rotation");
            log.rotate().unwrap();
            tracing::info!("after rotation");
        });

        let files: Vec<String> = std::fs::read_dir(root.path())
            .unwrap()
            .map(|e| std::fs::read_to_string(e.unwrap().path()).unwrap())
            .collect();
        assert_eq!(files.len(), 2);
        assert_eq!(files.iter().filter(|t| t.contains("before rotation")).count(), 1);
        assert_eq!(files.iter().filter(|t| t.contains("after rotation")).count(), 1);
        assert!(files.iter().all(|t| !(t.contains("before") && t.contains("after"))));
    }
}
