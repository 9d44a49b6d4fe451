//! Arrival-rate load profile configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_rate, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Load profile expressed in external HTTP requests per second
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadConfig {
    /// Request rate at the start of the run (requests per second)
    #[serde(default = "default_request_rate")]
    pub start_request_rate: f64,

    /// Ramp stages; each ramps linearly to its target over its duration
    #[serde(default = "default_stages")]
    pub stages: Vec<StageConfig>,

    /// Average number of HTTP requests one iteration issues
    #[serde(default = "default_requests_per_iteration")]
    pub requests_per_iteration: f64,

    /// Workers allocated before the first iteration starts
    #[serde(default = "default_pre_allocated_workers")]
    pub pre_allocated_workers: usize,

    /// Hard cap on concurrently running iterations
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,

    /// How long queued starts may trail the end of the schedule before they are dropped
    #[serde(
        with = "crate::domains::utils::serde_duration",
        default = "default_graceful_stop"
    )]
    pub graceful_stop: Duration,

    /// Scheduler lag above which the run is reported as saturated
    #[serde(
        with = "crate::domains::utils::serde_duration_millis",
        default = "default_lag_warning"
    )]
    pub lag_warning: Duration,
}

/// A single ramp stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    /// Request rate reached at the end of the stage (requests per second)
    pub target_request_rate: f64,

    /// Stage duration
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub duration: Duration,
}

impl LoadConfig {
    /// Total scheduled run time
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            start_request_rate: default_request_rate(),
            stages: default_stages(),
            requests_per_iteration: default_requests_per_iteration(),
            pre_allocated_workers: default_pre_allocated_workers(),
            max_workers: default_max_workers(),
            graceful_stop: default_graceful_stop(),
            lag_warning: default_lag_warning(),
        }
    }
}

impl Validatable for LoadConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_rate(
            self.start_request_rate,
            "start_request_rate",
            self.domain_name(),
        )?;
        validate_rate(
            self.requests_per_iteration,
            "requests_per_iteration",
            self.domain_name(),
        )?;
        validate_positive(self.max_workers, "max_workers", self.domain_name())?;

        if self.stages.is_empty() {
            return Err(self.validation_error("At least one stage must be configured"));
        }

        for (index, stage) in self.stages.iter().enumerate() {
            validate_rate(
                stage.target_request_rate,
                &format!("stages[{}].target_request_rate", index),
                self.domain_name(),
            )?;
        }

        if self.total_duration().is_zero() {
            return Err(self.validation_error("Total stage duration must be greater than 0"));
        }

        if self.pre_allocated_workers > self.max_workers {
            return Err(self.validation_error(format!(
                "pre_allocated_workers ({}) cannot exceed max_workers ({})",
                self.pre_allocated_workers, self.max_workers
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "load"
    }
}

fn default_request_rate() -> f64 {
    5000.0
}

fn default_stages() -> Vec<StageConfig> {
    vec![StageConfig {
        target_request_rate: default_request_rate(),
        duration: Duration::from_secs(30),
    }]
}

fn default_requests_per_iteration() -> f64 {
    75.0
}

fn default_pre_allocated_workers() -> usize {
    50
}

fn default_max_workers() -> usize {
    300
}

fn default_graceful_stop() -> Duration {
    Duration::from_secs(30)
}

fn default_lag_warning() -> Duration {
    Duration::from_millis(1000)
}
