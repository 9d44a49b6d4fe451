use std::time::Duration;
use surge_metrics::{MetricsRegistry, ITERATIONS, WORKERS_ALLOCATED};
use surge_report::{evaluate_all, parse_thresholds, RunReport};
use surge_scheduler::RunSummary;

fn registry() -> MetricsRegistry {
    let registry = MetricsRegistry::new();
    for _ in 0..99 {
        registry.record("post_kraj", 20.0, true);
    }
    registry.record("del_kraj", 900.0, false);
    registry.increment(ITERATIONS, 10);
    registry.gauge_max(WORKERS_ALLOCATED, 12);
    registry
}

#[test]
fn test_default_thresholds_over_a_run() {
    let snapshot = registry().snapshot();
    let thresholds = parse_thresholds([
        ("http_req_failed", "rate<0.02"),
        ("http_req_duration", "p(95)<500"),
        ("http_req_duration", "max<500"),
        ("http_reqs", "count==100"),
        ("iterations", "count>=10"),
        ("workers_allocated", "max<=12"),
    ])
    .unwrap();

    let results = evaluate_all(&thresholds, &snapshot).unwrap();
    let passed: Vec<bool> = results.iter().map(|r| r.passed).collect();
    assert_eq!(passed, vec![true, true, false, true, true, true]);
}

#[test]
fn test_missing_metric_fails_without_observation() {
    let snapshot = registry().snapshot();
    let thresholds = parse_thresholds([("get_lv_detail", "p(95)<500")]).unwrap();

    let results = evaluate_all(&thresholds, &snapshot).unwrap();
    assert_eq!(results[0].observed, None);
    assert!(!results[0].passed);
}

#[test]
fn test_report_round_trip_to_disk() {
    let snapshot = registry().snapshot();
    let thresholds = parse_thresholds([("http_req_failed", "rate<0.02")]).unwrap();
    let results = evaluate_all(&thresholds, &snapshot).unwrap();
    let report = RunReport::new(
        RunSummary {
            scheduled: 10,
            started: 10,
            completed: 10,
            peak_workers: 12,
            elapsed: Duration::from_secs(2),
            ..RunSummary::default()
        },
        snapshot,
        results,
    );
    assert!(report.passed());

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("summary.json");
    report.export(&path).unwrap();
    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(value["run"]["elapsed"].as_f64(), Some(2000.0));
    assert_eq!(value["metrics"]["requests"]["count"], 100);
    assert_eq!(value["metrics"]["gauges"]["workers_allocated"], 12);
}
