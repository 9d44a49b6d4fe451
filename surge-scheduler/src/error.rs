//! Scheduler error types

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScheduleError {
    #[error("Rate must be a positive finite number, got {0}")]
    InvalidRate(f64),

    #[error("Requests per iteration must be positive, got {0}")]
    InvalidRequestsPerIteration(f64),

    #[error("Schedule has no stages")]
    NoStages,

    #[error("Worker pool needs 1..=max workers, got {pre_allocated} pre-allocated and {max} max")]
    InvalidWorkers { pre_allocated: usize, max: usize },
}

pub type ScheduleResult<T> = Result<T, ScheduleError>;
