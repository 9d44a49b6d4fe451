//! Keyed metrics registry shared by every iteration

use crate::recorder::Recorder;
use crate::snapshot::MetricsSnapshot;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// One timing and outcome observation for a workflow step
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    /// Stable step key, e.g. `post_kraj`; `None` only feeds the aggregates
    pub step: Option<String>,
    pub verb: &'static str,
    pub duration_ms: f64,
    pub success: bool,
}

type Shared<T> = RwLock<HashMap<String, Arc<T>>>;

/// Thread-safe registry of step recorders, trends, counters and gauges
///
/// Keys are created the first time they are written. After that a write is
/// a read-lock lookup plus atomic increments and one short histogram lock.
#[derive(Debug)]
pub struct MetricsRegistry {
    started_at: Instant,
    requests: Recorder,
    steps: Shared<Recorder>,
    verbs: Shared<Recorder>,
    trends: Shared<Recorder>,
    counters: Shared<AtomicU64>,
    gauges: Shared<AtomicU64>,
}

fn entry<T>(map: &Shared<T>, key: &str, init: impl FnOnce() -> T) -> Arc<T> {
    if let Some(existing) = map.read().get(key) {
        return Arc::clone(existing);
    }
    let mut guard = map.write();
    Arc::clone(
        guard
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(init())),
    )
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            requests: Recorder::new(),
            steps: RwLock::new(HashMap::new()),
            verbs: RwLock::new(HashMap::new()),
            trends: RwLock::new(HashMap::new()),
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
        }
    }

    /// Record one HTTP step observation
    pub fn record(&self, step_key: &str, duration_ms: f64, success: bool) {
        entry(&self.steps, step_key, Recorder::new).record(duration_ms, success);
        self.requests.record(duration_ms, success);
    }

    /// Record a sample, also attributing it to its verb
    pub fn submit(&self, sample: &MetricSample) {
        match &sample.step {
            Some(step) => self.record(step, sample.duration_ms, sample.success),
            None => self.requests.record(sample.duration_ms, sample.success),
        }
        entry(&self.verbs, sample.verb, Recorder::new).record(sample.duration_ms, sample.success);
    }

    /// Record a value on a non-HTTP trend
    pub fn observe(&self, trend: &str, value_ms: f64) {
        entry(&self.trends, trend, Recorder::new).record(value_ms, true);
    }

    pub fn increment(&self, counter: &str, by: u64) {
        entry(&self.counters, counter, || AtomicU64::new(0)).fetch_add(by, Ordering::Relaxed);
    }

    /// Raise a gauge to `value` if it is higher than the current reading
    pub fn gauge_max(&self, gauge: &str, value: u64) {
        entry(&self.gauges, gauge, || AtomicU64::new(0)).fetch_max(value, Ordering::Relaxed);
    }

    /// Number of HTTP samples recorded so far
    pub fn request_count(&self) -> u64 {
        self.requests.count()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        fn collect(map: &Shared<Recorder>) -> BTreeMap<String, crate::StepStats> {
            map.read()
                .iter()
                .map(|(key, recorder)| (key.clone(), recorder.stats()))
                .collect()
        }
        fn load(map: &Shared<AtomicU64>) -> BTreeMap<String, u64> {
            map.read()
                .iter()
                .map(|(key, value)| (key.clone(), value.load(Ordering::Relaxed)))
                .collect()
        }

        MetricsSnapshot {
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
            requests: self.requests.stats(),
            steps: collect(&self.steps),
            verbs: collect(&self.verbs),
            trends: collect(&self.trends),
            counters: load(&self.counters),
            gauges: load(&self.gauges),
        }
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
