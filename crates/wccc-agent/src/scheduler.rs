//! Cron-driven repeat runs
//!
//! One job at a time: the next fire time is computed only after the previous
//! run has finished, so runs never overlap. A failed run is logged by the job
//! and the schedule carries on.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule as CronSchedule;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::error::{AgentError, Result};

/// Handle to a running scheduler
pub struct SchedulerHandle {
    shutdown_tx: broadcast::Sender<()>,
    handle: JoinHandle<u64>,
}

impl SchedulerHandle {
    /// Stop after the current run, if any. Returns the number of runs started.
    pub async fn stop(self) -> u64 {
        let _ = self.shutdown_tx.send(());
        self.handle.await.unwrap_or_default()
    }
}

pub struct Scheduler {
    expr: String,
    schedule: CronSchedule,
}

impl Scheduler {
    pub fn new(expr: &str) -> Result<Self> {
        Ok(Self {
            expr: expr.trim().to_string(),
            schedule: parse_cron(expr)?,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// First fire time strictly after `after`
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule.after(&after).next()
    }

    /// Spawn the loop. `job` receives the 1-based run number.
    pub fn start<F, Fut>(self, job: F) -> SchedulerHandle
    where
        F: FnMut(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let handle = tokio::spawn(async move { self.run(job, &mut shutdown_rx).await });
        SchedulerHandle { shutdown_tx, handle }
    }

    async fn run<F, Fut>(self, mut job: F, shutdown_rx: &mut broadcast::Receiver<()>) -> u64
    where
        F: FnMut(u64) -> Fut,
        Fut: Future<Output = ()>,
    {
        info!(cron = %self.expr, "Scheduler started");

        let mut runs = 0;
        let mut last_fire: Option<DateTime<Utc>> = None;

        loop {
            let now = Utc::now();
            // never fire twice for the same slot, even if the clock lags
            let from = last_fire.map_or(now, |last| last.max(now));
            let Some(next) = self.next_after(from) else {
                warn!(cron = %self.expr, "No upcoming fire time");
                break;
            };

            let delay = (next - now).to_std().unwrap_or(Duration::ZERO);
            info!(next = %next.format("%Y-%m-%d %H:%M:%S"), "Waiting for next run");

            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    info!("Shutdown requested");
                    break;
                }
                _ = tokio::time::sleep(delay) => {
                    runs += 1;
                    last_fire = Some(next);
                    info!(run = runs, "Scheduled run starting");
                    job(runs).await;
                }
            }
        }

        info!(runs, "Scheduler stopped");
        runs
    }
}

/// Parse a cron expression; five-field expressions get a leading seconds field
pub fn parse_cron(expr: &str) -> Result<CronSchedule> {
    let expr = expr.trim();
    let normalized = if expr.split_whitespace().count() == 5 {
        format!("0 {}", expr)
    } else {
        expr.to_string()
    };

    normalized
        .parse::<CronSchedule>()
        .map_err(|e| AgentError::Schedule(format!("invalid cron expression '{}': {}", expr, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_parse_cron() {
        assert!(parse_cron("0 0 * * * *").is_ok());
        assert!(parse_cron("0 9 * * *").is_ok());
    }

    #[test]
    fn test_parse_cron_invalid() {
        let err = parse_cron("invalid").unwrap_err();
        assert!(err.to_string().contains("invalid cron expression 'invalid'"));
    }

    #[test]
    fn test_next_after() {
        let hourly = Scheduler::new("0 0 * * * *").unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 15).unwrap();
        assert_eq!(
            hourly.next_after(now),
            Some(Utc.with_ymd_and_hms(2025, 6, 1, 13, 0, 0).unwrap())
        );

        let daily = Scheduler::new("0 9 * * *").unwrap();
        assert_eq!(
            daily.next_after(now),
            Some(Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap())
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_stopped() {
        let runs = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&runs);

        let handle = Scheduler::new("* * * * * *").unwrap().start(move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(3500)).await;
        let started = handle.stop().await;

        assert!(started >= 2, "only {} runs", started);
        assert_eq!(runs.load(Ordering::SeqCst), started);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_never_overlap() {
        let active = Arc::new(AtomicU64::new(0));
        let peak = Arc::new(AtomicU64::new(0));
        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));

        let handle = Scheduler::new("* * * * * *").unwrap().start(move |_| {
            let (active, peak) = (Arc::clone(&a), Arc::clone(&p));
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                // longer than the one-second interval
                tokio::time::sleep(Duration::from_millis(2500)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(8)).await;
        handle.stop().await;

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(active.load(Ordering::SeqCst), 0);
    }
}
