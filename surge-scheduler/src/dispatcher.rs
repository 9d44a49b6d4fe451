//! Arrival-rate dispatcher
//!
//! Walks the arrival timeline, hands each start to a worker and tracks how
//! far behind schedule the starts run. When every worker is busy the start
//! waits for one to come back instead of being dropped; only starts still
//! waiting `graceful_stop` after the end of the schedule are given up.

use crate::error::ScheduleResult;
use crate::pool::WorkerPool;
use crate::schedule::RateSchedule;
use crate::shutdown::ShutdownHandle;
use crate::IterationRunner;
use futures::FutureExt;
use serde::Serialize;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use surge_config::LoadConfig;
use surge_metrics::{
    MetricsRegistry, ITERATIONS, ITERATIONS_DELAYED, ITERATIONS_DROPPED, ITERATION_DURATION,
    SCHEDULER_LAG, WORKERS_ALLOCATED,
};
use tokio::task::JoinSet;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatcherConfig {
    pub pre_allocated_workers: usize,
    pub max_workers: usize,
    /// Grace period after the schedule ends for delayed starts
    pub graceful_stop: Duration,
    /// Lag above which a start counts as delayed
    pub lag_warning: Duration,
}

impl From<&LoadConfig> for DispatcherConfig {
    fn from(config: &LoadConfig) -> Self {
        Self {
            pre_allocated_workers: config.pre_allocated_workers,
            max_workers: config.max_workers,
            graceful_stop: config.graceful_stop,
            lag_warning: config.lag_warning,
        }
    }
}

/// Outcome of a complete run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Starts on the timeline
    pub scheduled: u64,
    pub started: u64,
    pub completed: u64,
    /// Starts whose lag exceeded the warning threshold
    pub delayed: u64,
    /// Starts given up after the grace period
    pub dropped: u64,
    /// Peak number of allocated workers
    pub peak_workers: usize,
    #[serde(with = "millis")]
    pub max_lag: Duration,
    #[serde(with = "millis")]
    pub elapsed: Duration,
    /// The run was stopped before the end of its schedule
    pub interrupted: bool,
}

mod millis {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
    }
}

enum Stop {
    Finished,
    Interrupted,
    GraceExpired,
}

pub struct Dispatcher {
    schedule: RateSchedule,
    config: DispatcherConfig,
    metrics: Arc<MetricsRegistry>,
    shutdown: ShutdownHandle,
}

impl Dispatcher {
    pub fn new(
        schedule: RateSchedule,
        config: DispatcherConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            schedule,
            config,
            metrics,
            shutdown: ShutdownHandle::new(),
        }
    }

    /// Handle that stops new starts when triggered
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn schedule(&self) -> &RateSchedule {
        &self.schedule
    }

    /// Run the whole schedule, then wait for in-flight iterations
    pub async fn run<R>(&self, runner: Arc<R>) -> ScheduleResult<RunSummary>
    where
        R: IterationRunner + ?Sized + 'static,
    {
        let mut pool = WorkerPool::new(self.config.pre_allocated_workers, self.config.max_workers)?;
        let returns = pool.returns();
        let mut shutdown = self.shutdown.subscribe();
        let mut in_flight = JoinSet::new();
        let mut summary = RunSummary::default();

        let started_at = Instant::now();
        let grace_deadline =
            started_at + self.schedule.total_duration() + self.config.graceful_stop;
        let mut arrivals = self.schedule.arrivals();
        let mut saturated = false;

        info!(
            "Starting schedule: {} iterations over {:?} ({} pre-allocated, {} max workers)",
            self.schedule.expected_iterations().round(),
            self.schedule.total_duration(),
            self.config.pre_allocated_workers,
            self.config.max_workers
        );
        self.metrics
            .gauge_max(WORKERS_ALLOCATED, pool.allocated() as u64);

        let stop = loop {
            let Some(offset) = arrivals.next() else {
                break Stop::Finished;
            };
            summary.scheduled += 1;
            let scheduled_at = started_at + offset;

            if self.shutdown.is_triggered() {
                break Stop::Interrupted;
            }
            tokio::select! {
                _ = sleep_until(scheduled_at) => {}
                _ = shutdown.recv() => break Stop::Interrupted,
            }

            let worker = match pool.try_acquire() {
                Some(worker) => {
                    if saturated {
                        saturated = false;
                        info!("Worker pool recovered, starts are back on schedule");
                    }
                    worker
                }
                None => {
                    if !saturated {
                        saturated = true;
                        warn!(
                            "All {} workers busy, delaying iteration starts",
                            pool.max()
                        );
                    }
                    tokio::select! {
                        worker = pool.acquire() => worker,
                        _ = shutdown.recv() => break Stop::Interrupted,
                        _ = sleep_until(grace_deadline) => break Stop::GraceExpired,
                    }
                }
            };

            let lag = Instant::now().saturating_duration_since(scheduled_at);
            self.metrics
                .observe(SCHEDULER_LAG, lag.as_secs_f64() * 1000.0);
            if lag > self.config.lag_warning {
                summary.delayed += 1;
                self.metrics.increment(ITERATIONS_DELAYED, 1);
            }
            summary.max_lag = summary.max_lag.max(lag);
            self.metrics
                .gauge_max(WORKERS_ALLOCATED, pool.allocated() as u64);

            let iteration = summary.started;
            summary.started += 1;

            let runner = Arc::clone(&runner);
            let metrics = Arc::clone(&self.metrics);
            let returns = returns.clone();
            in_flight.spawn(async move {
                let began = Instant::now();
                let result = AssertUnwindSafe(runner.run(iteration)).catch_unwind().await;
                // The worker goes back to the pool even when the iteration panicked
                returns.release(worker);
                if result.is_err() {
                    warn!("Iteration {} panicked", iteration);
                    return false;
                }
                metrics.observe(ITERATION_DURATION, began.elapsed().as_secs_f64() * 1000.0);
                metrics.increment(ITERATIONS, 1);
                true
            });

            while let Some(result) = in_flight.try_join_next() {
                summary.completed += record_completion(result);
            }
        };

        let remaining = arrivals.count() as u64;
        summary.scheduled += remaining;
        match stop {
            Stop::Finished => debug!("Schedule exhausted"),
            Stop::Interrupted => {
                summary.interrupted = true;
                info!("Stop requested, no further iterations will start");
            }
            Stop::GraceExpired => {
                // The start that was waiting plus everything after it
                summary.dropped = remaining + 1;
                self.metrics.increment(ITERATIONS_DROPPED, summary.dropped);
                warn!(
                    "{} iterations dropped: workers did not free up within the graceful stop period",
                    summary.dropped
                );
            }
        }

        if !in_flight.is_empty() {
            info!("Waiting for {} in-flight iterations", in_flight.len());
        }
        while let Some(result) = in_flight.join_next().await {
            summary.completed += record_completion(result);
        }

        summary.peak_workers = pool.allocated();
        summary.elapsed = started_at.elapsed();
        Ok(summary)
    }
}

fn record_completion(result: Result<bool, tokio::task::JoinError>) -> u64 {
    match result {
        Ok(completed) => u64::from(completed),
        Err(err) => {
            warn!("Iteration task failed: {}", err);
            0
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("schedule", &self.schedule)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
