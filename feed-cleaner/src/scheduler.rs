use crate::job::JobRunner;
use crate::types::{CleanerError, FeedConfig, JobResult, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Counters over every scheduled run since the scheduler was created.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickStats {
    pub ticks: u64,
    pub failures: u64,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_removed: Option<usize>,
    pub last_error: Option<String>,
}

impl TickStats {
    fn record(&mut self, outcome: &Result<JobResult>) {
        self.ticks += 1;
        self.last_run_at = Some(Utc::now());
        match outcome {
            Ok(result) => {
                self.last_removed = Some(result.removed_count);
                self.last_error = None;
            }
            Err(e) => {
                self.failures += 1;
                self.last_error = Some(e.to_string());
            }
        }
    }
}

/// Point-in-time view of the scheduler; the active config has its password masked.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub is_running: bool,
    pub interval_secs: Option<u64>,
    pub started_at: Option<DateTime<Utc>>,
    pub active_config: Option<FeedConfig>,
    pub stats: TickStats,
}

#[derive(Debug, Clone)]
pub enum StartOutcome {
    Started(SchedulerStatus),
    /// The schedule already running was left untouched, config included.
    AlreadyRunning(SchedulerStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    Stopped,
    AlreadyStopped,
}

struct ActiveSchedule {
    config: FeedConfig,
    interval: Duration,
    started_at: DateTime<Utc>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct ScheduleState {
    active: Option<ActiveSchedule>,
    stats: TickStats,
}

impl ScheduleState {
    fn snapshot(&self) -> SchedulerStatus {
        SchedulerStatus {
            is_running: self.active.is_some(),
            interval_secs: self.active.as_ref().map(|a| a.interval.as_secs()),
            started_at: self.active.as_ref().map(|a| a.started_at),
            active_config: self.active.as_ref().map(|a| a.config.redacted()),
            stats: self.stats.clone(),
        }
    }
}

/// Runs a single feed job on a fixed interval in a background task.
///
/// At most one schedule is active. Stopping cancels future ticks; a run that is
/// already in flight is allowed to finish. Dropping the scheduler stops it too.
pub struct Scheduler {
    runner: Arc<JobRunner>,
    state: Arc<Mutex<ScheduleState>>,
    dropped: CancellationToken,
}

impl Scheduler {
    pub fn new(runner: Arc<JobRunner>) -> Self {
        Self {
            runner,
            state: Arc::new(Mutex::new(ScheduleState::default())),
            dropped: CancellationToken::new(),
        }
    }

    /// Starts ticking every `interval`, first tick one interval from now.
    pub async fn start(&self, config: FeedConfig, interval: Duration) -> Result<StartOutcome> {
        if interval.is_zero() {
            return Err(CleanerError::InvalidInterval);
        }

        let mut state = self.state.lock().await;
        if state.active.is_some() {
            info!("Scheduler already running, ignoring start request");
            return Ok(StartOutcome::AlreadyRunning(state.snapshot()));
        }

        let cancel = self.dropped.child_token();
        let handle = tokio::spawn(run_loop(
            self.runner.clone(),
            self.state.clone(),
            config.clone(),
            interval,
            cancel.clone(),
        ));

        info!(
            "Scheduler started: {} every {:?}",
            config.source_url, interval
        );

        state.active = Some(ActiveSchedule {
            config,
            interval,
            started_at: Utc::now(),
            cancel,
            handle,
        });

        Ok(StartOutcome::Started(state.snapshot()))
    }

    pub async fn stop(&self) -> StopOutcome {
        let mut state = self.state.lock().await;
        match state.active.take() {
            Some(active) => {
                active.cancel.cancel();
                info!("Scheduler stopped");
                StopOutcome::Stopped
            }
            None => StopOutcome::AlreadyStopped,
        }
    }

    /// Stops and waits for the background task, including a run in flight.
    pub async fn shutdown(&self) -> StopOutcome {
        let active = self.state.lock().await.active.take();
        let Some(active) = active else {
            return StopOutcome::AlreadyStopped;
        };

        active.cancel.cancel();
        if let Err(e) = active.handle.await {
            warn!("Scheduler task ended abnormally: {}", e);
        }
        info!("Scheduler shut down");
        StopOutcome::Stopped
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.state.lock().await.snapshot()
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.active.is_some()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.dropped.cancel();
    }
}

async fn run_loop(
    runner: Arc<JobRunner>,
    state: Arc<Mutex<ScheduleState>>,
    config: FeedConfig,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut timer = interval_at(Instant::now() + period, period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = timer.tick() => {}
        }

        let outcome = runner.run(&config).await;
        match &outcome {
            Ok(result) => info!(
                "Scheduled feed job removed {} teaser images",
                result.removed_count
            ),
            // Failures stay inside the loop; the next tick tries again.
            Err(e) => error!("Scheduled feed job failed ({:?}): {}", e.kind(), e),
        }

        state.lock().await.stats.record(&outcome);
    }

    info!("Scheduler loop exited");
}
