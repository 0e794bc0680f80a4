use chrono::{Duration as ChronoDuration, Local, NaiveDateTime, NaiveTime};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::errors::CoreError;
use crate::FundTracker;

/// Next wall-clock trigger strictly after `now` for a daily job at `at`.
pub fn next_run_after(now: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let today_run = now.date().and_time(at);
    if now < today_run {
        today_run
    } else {
        today_run + ChronoDuration::days(1)
    }
}

/// Runs the daily snapshot sweep at a fixed local time.
///
/// Owns at most one background task. `start` spawns it, `stop` signals it and
/// waits for it to finish; dropping a running scheduler aborts the task.
pub struct DailyScheduler {
    at: NaiveTime,
    task: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
}

impl std::fmt::Debug for DailyScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DailyScheduler")
            .field("at", &self.at)
            .field("running", &self.is_running())
            .finish()
    }
}

impl DailyScheduler {
    pub fn new(at: NaiveTime) -> Self {
        Self {
            at,
            task: None,
            shutdown: None,
        }
    }

    /// Wall-clock time the sweep fires at.
    pub fn run_time(&self) -> NaiveTime {
        self.at
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Spawn the timer task on the current tokio runtime.
    pub fn start(&mut self, tracker: Arc<FundTracker>) -> Result<(), CoreError> {
        if self.is_running() {
            return Err(CoreError::Scheduler("scheduler is already running".into()));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| CoreError::Scheduler(format!("no tokio runtime available: {e}")))?;

        let (tx, rx) = watch::channel(false);
        let at = self.at;
        self.task = Some(runtime.spawn(run_loop(tracker, at, rx)));
        self.shutdown = Some(tx);
        log::info!("Daily snapshot scheduler started, sweeping every day at {at}");
        Ok(())
    }

    /// Signal the timer task to exit and wait for it. A sweep already in
    /// progress finishes first.
    pub async fn stop(&mut self) -> Result<(), CoreError> {
        let Some(task) = self.task.take() else {
            return Err(CoreError::Scheduler("scheduler is not running".into()));
        };
        if let Some(tx) = self.shutdown.take() {
            // The receiver is gone only if the task already exited.
            let _ = tx.send(true);
        }
        task.await
            .map_err(|e| CoreError::Scheduler(format!("scheduler task failed: {e}")))?;
        log::info!("Daily snapshot scheduler stopped");
        Ok(())
    }
}

impl Drop for DailyScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

async fn run_loop(tracker: Arc<FundTracker>, at: NaiveTime, mut shutdown: watch::Receiver<bool>) {
    loop {
        let now = Local::now().naive_local();
        let next = next_run_after(now, at);
        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
        log::debug!("Next snapshot sweep at {next}");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                let now = Local::now().naive_local();
                match tracker.run_daily_sweep(now.date(), now).await {
                    Ok(report) => log::info!(
                        "Scheduled sweep for {}: {} succeeded, {} failed",
                        report.date,
                        report.succeeded,
                        report.failed
                    ),
                    Err(e) => log::error!("Scheduled sweep failed: {e}"),
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
