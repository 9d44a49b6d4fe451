//! Metrics collection for surge runs
//!
//! A single keyed [`MetricsRegistry`] replaces one hand-declared trend per
//! workflow step. Step samples feed both their own recorder and the
//! run-wide request aggregates (`http_req_duration`, `http_req_failed`).

pub mod recorder;
pub mod registry;
pub mod snapshot;

pub use recorder::Recorder;
pub use registry::{MetricSample, MetricsRegistry};
pub use snapshot::{MetricsSnapshot, StepStats};

/// Aggregate trend over every HTTP step
pub const HTTP_REQ_DURATION: &str = "http_req_duration";
/// Aggregate failure rate over every HTTP step
pub const HTTP_REQ_FAILED: &str = "http_req_failed";
/// Total number of HTTP requests
pub const HTTP_REQS: &str = "http_reqs";
/// Completed iterations
pub const ITERATIONS: &str = "iterations";
/// Wall time of one iteration, cleanup included
pub const ITERATION_DURATION: &str = "iteration_duration";
/// Delay between an iteration's scheduled and actual start
pub const SCHEDULER_LAG: &str = "scheduler_lag";
/// Iterations that started later than the lag warning threshold
pub const ITERATIONS_DELAYED: &str = "iterations_delayed";
/// Scheduled iterations never started
pub const ITERATIONS_DROPPED: &str = "iterations_dropped";
/// Peak number of allocated workers
pub const WORKERS_ALLOCATED: &str = "workers_allocated";
