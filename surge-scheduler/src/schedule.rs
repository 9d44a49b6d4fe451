//! Iteration-rate schedules and their arrival timelines

use crate::error::{ScheduleError, ScheduleResult};
use serde::Serialize;
use std::time::Duration;
use surge_config::LoadConfig;

/// One linear ramp to `target` iterations per second
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RampStage {
    pub target: f64,
    pub duration: Duration,
}

/// Iterations per second over time
///
/// The rate starts at `start` and ramps linearly to each stage's target over
/// that stage's duration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateSchedule {
    start: f64,
    stages: Vec<RampStage>,
}

fn check_rate(rate: f64) -> ScheduleResult<f64> {
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(ScheduleError::InvalidRate(rate))
    }
}

/// `ceil(request_rate / requests_per_iteration)`
pub fn iteration_rate(request_rate: f64, requests_per_iteration: f64) -> ScheduleResult<f64> {
    if !(requests_per_iteration.is_finite() && requests_per_iteration > 0.0) {
        return Err(ScheduleError::InvalidRequestsPerIteration(
            requests_per_iteration,
        ));
    }
    check_rate(request_rate)?;
    Ok((request_rate / requests_per_iteration).ceil())
}

impl RateSchedule {
    pub fn new(start: f64, stages: Vec<RampStage>) -> ScheduleResult<Self> {
        check_rate(start)?;
        if stages.is_empty() {
            return Err(ScheduleError::NoStages);
        }
        for stage in &stages {
            check_rate(stage.target)?;
        }
        Ok(Self { start, stages })
    }

    /// Convert a schedule expressed in HTTP requests per second
    pub fn from_request_rates(
        start_request_rate: f64,
        stages: &[(f64, Duration)],
        requests_per_iteration: f64,
    ) -> ScheduleResult<Self> {
        let start = iteration_rate(start_request_rate, requests_per_iteration)?;
        let stages = stages
            .iter()
            .map(|&(rate, duration)| {
                Ok(RampStage {
                    target: iteration_rate(rate, requests_per_iteration)?,
                    duration,
                })
            })
            .collect::<ScheduleResult<Vec<_>>>()?;
        Self::new(start, stages)
    }

    pub fn from_load_config(config: &LoadConfig) -> ScheduleResult<Self> {
        let stages: Vec<(f64, Duration)> = config
            .stages
            .iter()
            .map(|s| (s.target_request_rate, s.duration))
            .collect();
        Self::from_request_rates(
            config.start_request_rate,
            &stages,
            config.requests_per_iteration,
        )
    }

    pub fn start_rate(&self) -> f64 {
        self.start
    }

    pub fn stages(&self) -> &[RampStage] {
        &self.stages
    }

    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }

    /// `(from, to, seconds)` of each ramp segment
    fn segments(&self) -> impl Iterator<Item = (f64, f64, f64)> + '_ {
        let mut from = self.start;
        self.stages.iter().map(move |stage| {
            let segment = (from, stage.target, stage.duration.as_secs_f64());
            from = stage.target;
            segment
        })
    }

    /// Scheduled rate at `elapsed`; the last target holds after the end
    pub fn rate_at(&self, elapsed: Duration) -> f64 {
        let elapsed = elapsed.as_secs_f64();
        let mut offset = 0.0;
        let mut rate = self.start;
        for (from, to, seconds) in self.segments() {
            if elapsed < offset + seconds {
                let progress = (elapsed - offset) / seconds;
                return from + (to - from) * progress;
            }
            offset += seconds;
            rate = to;
        }
        rate
    }

    /// Area under the rate curve: the number of iterations scheduled
    pub fn expected_iterations(&self) -> f64 {
        self.segments()
            .map(|(from, to, seconds)| (from + to) / 2.0 * seconds)
            .sum()
    }

    /// Start offsets of every scheduled iteration
    ///
    /// The i-th start lies where the integrated rate reaches `i`, so a
    /// constant 67/s over 30 s yields starts at `i / 67` for `i` in
    /// `0..2010`.
    pub fn arrivals(&self) -> Arrivals {
        Arrivals {
            segments: self.segments().collect(),
            segment: 0,
            segment_start: 0.0,
            base: 0.0,
            next: 0,
        }
    }
}

/// Iterator over start offsets, see [`RateSchedule::arrivals`]
#[derive(Debug, Clone)]
pub struct Arrivals {
    segments: Vec<(f64, f64, f64)>,
    segment: usize,
    segment_start: f64,
    base: f64,
    next: u64,
}

/// Time into a segment at which `count` iterations have been scheduled
fn solve(from: f64, to: f64, seconds: f64, count: f64) -> Option<f64> {
    if seconds <= 0.0 {
        return None;
    }
    let slope = (to - from) / seconds;
    if slope.abs() < 1e-12 {
        return Some(count / from);
    }
    let discriminant = from * from + 2.0 * slope * count;
    if discriminant < 0.0 {
        return None;
    }
    Some((discriminant.sqrt() - from) / slope)
}

impl Iterator for Arrivals {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        while let Some(&(from, to, seconds)) = self.segments.get(self.segment) {
            // Float drift can leave `base` a hair above `next` at a boundary
            let count = (self.next as f64 - self.base).max(0.0);
            if let Some(at) = solve(from, to, seconds, count).filter(|at| *at < seconds) {
                self.next += 1;
                return Some(Duration::from_secs_f64(self.segment_start + at.max(0.0)));
            }
            self.base += (from + to) / 2.0 * seconds;
            self.segment_start += seconds;
            self.segment += 1;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_iteration_rate_rounds_up() {
        assert_eq!(iteration_rate(5000.0, 75.0).unwrap(), 67.0);
        assert_eq!(iteration_rate(150.0, 75.0).unwrap(), 2.0);
        assert_eq!(iteration_rate(1.0, 75.0).unwrap(), 1.0);
        assert!(iteration_rate(5000.0, 0.0).is_err());
        assert!(iteration_rate(-1.0, 75.0).is_err());
    }

    #[test]
    fn test_constant_schedule() {
        let schedule =
            RateSchedule::from_request_rates(5000.0, &[(5000.0, secs(30))], 75.0).unwrap();
        assert_eq!(schedule.start_rate(), 67.0);
        assert_eq!(schedule.rate_at(secs(15)), 67.0);
        assert_eq!(schedule.expected_iterations(), 2010.0);

        let arrivals: Vec<Duration> = schedule.arrivals().collect();
        assert_eq!(arrivals.len(), 2010);
        assert_eq!(arrivals[0], Duration::ZERO);
        assert!(arrivals.last().unwrap() < &secs(30));
        assert!(arrivals.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_linear_ramp() {
        let schedule = RateSchedule::new(
            10.0,
            vec![RampStage {
                target: 30.0,
                duration: secs(10),
            }],
        )
        .unwrap();

        assert_eq!(schedule.rate_at(Duration::ZERO), 10.0);
        assert_eq!(schedule.rate_at(secs(5)), 20.0);
        assert_eq!(schedule.rate_at(secs(20)), 30.0);
        assert_eq!(schedule.expected_iterations(), 200.0);

        let arrivals: Vec<Duration> = schedule.arrivals().collect();
        assert!((199..=200).contains(&arrivals.len()));

        // The second half of a rising ramp holds more starts than the first
        let first_half = arrivals.iter().filter(|a| **a < secs(5)).count();
        assert!(first_half < arrivals.len() - first_half);
        assert!((74..=76).contains(&first_half));
    }

    #[test]
    fn test_multiple_stages() {
        let schedule = RateSchedule::new(
            4.0,
            vec![
                RampStage {
                    target: 4.0,
                    duration: secs(5),
                },
                RampStage {
                    target: 0.5,
                    duration: Duration::ZERO,
                },
                RampStage {
                    target: 2.0,
                    duration: secs(4),
                },
            ],
        )
        .unwrap();

        assert_eq!(schedule.total_duration(), secs(9));
        assert_eq!(schedule.rate_at(secs(6)), 0.875);
        let arrivals: Vec<Duration> = schedule.arrivals().collect();
        assert_eq!(arrivals.iter().filter(|a| **a < secs(5)).count(), 20);
        assert!(arrivals.iter().all(|a| *a < secs(9)));
    }

    #[test]
    fn test_fractional_stages_keep_every_start() {
        let stage = |target: f64, seconds: u64| RampStage {
            target,
            duration: secs(seconds),
        };
        let schedule =
            RateSchedule::new(1.1, vec![stage(1.3, 10), stage(0.1, 3), stage(3.3, 7)]).unwrap();
        assert!((schedule.expected_iterations() - 26.0).abs() < 1e-9);

        let arrivals: Vec<Duration> = schedule.arrivals().collect();
        assert!((arrivals.len() as f64 - schedule.expected_iterations()).abs() <= 1.0);
        assert!(arrivals.windows(2).all(|w| w[0] <= w[1]));
        assert!(arrivals.iter().any(|a| *a >= secs(13)));
        assert!(arrivals.iter().all(|a| *a < secs(20)));
    }

    #[test]
    fn test_invalid_schedules() {
        assert_eq!(RateSchedule::new(1.0, vec![]), Err(ScheduleError::NoStages));
        assert_eq!(
            RateSchedule::new(0.0, vec![RampStage { target: 1.0, duration: secs(1) }]),
            Err(ScheduleError::InvalidRate(0.0))
        );
        assert!(RateSchedule::new(
            1.0,
            vec![RampStage {
                target: f64::NAN,
                duration: secs(1)
            }]
        )
        .is_err());
    }

    #[test]
    fn test_from_load_config_defaults() {
        let schedule = RateSchedule::from_load_config(&LoadConfig::default()).unwrap();
        assert_eq!(schedule.start_rate(), 67.0);
        assert_eq!(schedule.stages()[0].target, 67.0);
        assert_eq!(schedule.total_duration(), secs(30));
    }
}
