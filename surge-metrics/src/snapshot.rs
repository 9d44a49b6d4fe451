//! Point-in-time views of the registry

use hdrhistogram::Histogram;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Statistics for one metric key
///
/// Latencies are in milliseconds. The histogram is kept so any percentile
/// can be asked for after the fact.
#[derive(Clone, Serialize)]
pub struct StepStats {
    pub count: u64,
    pub successes: u64,
    pub failures: u64,
    pub failure_rate: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    #[serde(skip)]
    histogram: Histogram<u64>,
}

impl StepStats {
    pub(crate) fn from_parts(
        count: u64,
        successes: u64,
        failures: u64,
        histogram: Histogram<u64>,
    ) -> Self {
        let failure_rate = if count > 0 {
            failures as f64 / count as f64
        } else {
            0.0
        };
        let empty = histogram.is_empty();
        let ms = |micros: u64| micros as f64 / 1000.0;

        Self {
            count,
            successes,
            failures,
            failure_rate,
            min_ms: if empty { 0.0 } else { ms(histogram.min()) },
            max_ms: if empty { 0.0 } else { ms(histogram.max()) },
            mean_ms: if empty { 0.0 } else { histogram.mean() / 1000.0 },
            p50_ms: ms(histogram.value_at_quantile(0.50)),
            p90_ms: ms(histogram.value_at_quantile(0.90)),
            p95_ms: ms(histogram.value_at_quantile(0.95)),
            p99_ms: ms(histogram.value_at_quantile(0.99)),
            histogram,
        }
    }

    /// Empty statistics
    pub fn empty() -> Self {
        Self::from_parts(0, 0, 0, crate::recorder::new_histogram())
    }

    /// Latency at percentile `p` (0-100) in milliseconds
    pub fn percentile(&self, p: f64) -> f64 {
        if self.histogram.is_empty() {
            return 0.0;
        }
        let quantile = (p / 100.0).clamp(0.0, 1.0);
        self.histogram.value_at_quantile(quantile) as f64 / 1000.0
    }
}

impl fmt::Debug for StepStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepStats")
            .field("count", &self.count)
            .field("successes", &self.successes)
            .field("failures", &self.failures)
            .field("p50_ms", &self.p50_ms)
            .field("p95_ms", &self.p95_ms)
            .field("p99_ms", &self.p99_ms)
            .finish()
    }
}

/// Snapshot of every metric in the registry
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Seconds since the registry was created
    pub elapsed_secs: f64,
    /// All HTTP steps combined
    pub requests: StepStats,
    /// Per step key, e.g. `post_kraj`
    pub steps: BTreeMap<String, StepStats>,
    /// Per HTTP verb
    pub verbs: BTreeMap<String, StepStats>,
    /// Non-HTTP trends such as `scheduler_lag`
    pub trends: BTreeMap<String, StepStats>,
    pub counters: BTreeMap<String, u64>,
    pub gauges: BTreeMap<String, u64>,
}

impl MetricsSnapshot {
    pub fn step(&self, key: &str) -> Option<&StepStats> {
        self.steps.get(key)
    }

    pub fn trend(&self, key: &str) -> Option<&StepStats> {
        self.trends.get(key)
    }

    pub fn counter(&self, key: &str) -> u64 {
        self.counters.get(key).copied().unwrap_or(0)
    }

    pub fn gauge(&self, key: &str) -> Option<u64> {
        self.gauges.get(key).copied()
    }

    /// Requests per second over the snapshot's lifetime
    pub fn request_rate(&self) -> f64 {
        if self.elapsed_secs > 0.0 {
            self.requests.count as f64 / self.elapsed_secs
        } else {
            0.0
        }
    }
}
