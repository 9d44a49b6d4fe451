//! Arrival-rate scheduling for surge
//!
//! A [`RateSchedule`] turns a request-rate profile into iteration starts,
//! and the [`Dispatcher`] runs them on a bounded [`WorkerPool`], surfacing
//! backpressure as scheduler lag instead of silently skipping starts.

pub mod dispatcher;
pub mod error;
pub mod pool;
pub mod schedule;
pub mod shutdown;

pub use dispatcher::{Dispatcher, DispatcherConfig, RunSummary};
pub use error::{ScheduleError, ScheduleResult};
pub use pool::{Worker, WorkerPool, WorkerReturn};
pub use schedule::{iteration_rate, Arrivals, RampStage, RateSchedule};
pub use shutdown::ShutdownHandle;

/// One logical iteration of the load scenario
#[async_trait::async_trait]
pub trait IterationRunner: Send + Sync {
    async fn run(&self, iteration: u64);
}
