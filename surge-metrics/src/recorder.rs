//! Lock-light recorder for a single metric key

use crate::snapshot::StepStats;
use hdrhistogram::Histogram;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Largest latency tracked with full precision (two minutes, in microseconds)
const HIGHEST_TRACKABLE_MICROS: u64 = 120_000_000;
const SIGNIFICANT_FIGURES: u8 = 3;

pub(crate) fn new_histogram() -> Histogram<u64> {
    Histogram::new_with_bounds(1, HIGHEST_TRACKABLE_MICROS, SIGNIFICANT_FIGURES)
        .expect("constant histogram bounds are valid")
}

/// Counters plus a fixed-size latency histogram
///
/// Memory does not grow with the number of samples; values above the
/// trackable range are clamped to it. Counters only change while the
/// histogram lock is held, so `stats` always agrees with the histogram.
pub struct Recorder {
    count: AtomicU64,
    successes: AtomicU64,
    failures: AtomicU64,
    histogram: Mutex<Histogram<u64>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            successes: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            histogram: Mutex::new(new_histogram()),
        }
    }

    /// Record one observation
    pub fn record(&self, duration_ms: f64, success: bool) {
        let micros = if duration_ms.is_finite() && duration_ms > 0.0 {
            (duration_ms * 1000.0).round() as u64
        } else {
            0
        };

        let mut histogram = self.histogram.lock();
        histogram.saturating_record(micros.max(1));
        self.count.fetch_add(1, Ordering::Relaxed);
        if success {
            self.successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Point-in-time statistics
    pub fn stats(&self) -> StepStats {
        let (count, successes, failures, histogram) = {
            let histogram = self.histogram.lock();
            (
                self.count.load(Ordering::Relaxed),
                self.successes.load(Ordering::Relaxed),
                self.failures.load(Ordering::Relaxed),
                histogram.clone(),
            )
        };
        StepStats::from_parts(count, successes, failures, histogram)
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("count", &self.count)
            .field("successes", &self.successes)
            .field("failures", &self.failures)
            .finish_non_exhaustive()
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_counts_outcomes() {
        let recorder = Recorder::new();
        recorder.record(10.0, true);
        recorder.record(20.0, false);
        recorder.record(30.0, true);

        let stats = recorder.stats();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.successes, 2);
        assert_eq!(stats.failures, 1);
        assert!((stats.failure_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_match_histogram_under_concurrent_writes() {
        use std::sync::atomic::AtomicBool;
        use std::sync::Arc;
        use std::thread;

        let recorder = Arc::new(Recorder::new());
        let done = Arc::new(AtomicBool::new(false));

        let writers: Vec<_> = (0..4)
            .map(|w| {
                let recorder = Arc::clone(&recorder);
                thread::spawn(move || {
                    for i in 0..5_000u64 {
                        recorder.record((i % 100) as f64, (i + w) % 3 != 0);
                    }
                })
            })
            .collect();

        let reader = {
            let recorder = Arc::clone(&recorder);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                while !done.load(Ordering::Relaxed) {
                    {
                        let histogram = recorder.histogram.lock();
                        assert_eq!(histogram.len(), recorder.count.load(Ordering::Relaxed));
                    }
                    let stats = recorder.stats();
                    assert_eq!(stats.count, stats.successes + stats.failures);
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        done.store(true, Ordering::Relaxed);
        reader.join().unwrap();

        let stats = recorder.stats();
        assert_eq!(stats.count, 20_000);
        assert_eq!(stats.count, stats.successes + stats.failures);
    }

    #[test]
    fn test_recorder_clamps_out_of_range_values() {
        let recorder = Recorder::new();
        recorder.record(-5.0, true);
        recorder.record(f64::NAN, true);
        recorder.record(10_000_000.0, true);

        let stats = recorder.stats();
        assert_eq!(stats.count, 3);
        assert!(stats.max_ms <= 120_000.0 * 1.01);
        assert!(stats.min_ms <= 0.002);
    }
}
