//! End-of-run summary rendering and export

use crate::error::ReportResult;
use crate::threshold::ThresholdResult;
use chrono::{DateTime, Utc};
use colored::*;
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use surge_metrics::{MetricsSnapshot, StepStats, ITERATIONS, ITERATION_DURATION, SCHEDULER_LAG};
use surge_scheduler::RunSummary;

/// Everything known about a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub finished_at: DateTime<Utc>,
    pub run: RunSummary,
    pub metrics: MetricsSnapshot,
    pub thresholds: Vec<ThresholdResult>,
}

impl RunReport {
    pub fn new(
        run: RunSummary,
        metrics: MetricsSnapshot,
        thresholds: Vec<ThresholdResult>,
    ) -> Self {
        Self {
            finished_at: Utc::now(),
            run,
            metrics,
            thresholds,
        }
    }

    /// `true` when every threshold passed
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdResult> {
        self.thresholds.iter().filter(|t| !t.passed)
    }

    pub fn to_json(&self) -> ReportResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON form to `path`
    pub fn export(&self, path: impl AsRef<Path>) -> ReportResult<()> {
        std::fs::write(path.as_ref(), self.to_json()?)?;
        tracing::info!("Summary exported to {}", path.as_ref().display());
        Ok(())
    }

    /// Human-readable summary
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_run(&mut out);
        self.render_thresholds(&mut out);
        self.render_steps(&mut out);
        out
    }

    fn render_run(&self, out: &mut String) {
        let run = &self.run;
        let _ = writeln!(out, "{}", "Run".bright_cyan().bold());
        let _ = writeln!(
            out,
            "  iterations ........ {} started, {} completed ({} scheduled)",
            run.started, run.completed, run.scheduled
        );
        if run.delayed > 0 || run.dropped > 0 {
            let _ = writeln!(
                out,
                "  {} {} delayed, {} dropped, max lag {:.0}ms",
                "backpressure ......".bright_yellow(),
                run.delayed,
                run.dropped,
                run.max_lag.as_secs_f64() * 1000.0
            );
        }
        let _ = writeln!(
            out,
            "  workers ........... {} allocated",
            run.peak_workers
        );
        let _ = writeln!(
            out,
            "  http_reqs ......... {} ({:.1}/s)",
            self.metrics.requests.count,
            self.metrics.request_rate()
        );
        let _ = writeln!(
            out,
            "  http_req_failed ... {:.2}%",
            self.metrics.requests.failure_rate * 100.0
        );
        let _ = writeln!(
            out,
            "  iterations/s ...... {:.2}",
            self.metrics.counter(ITERATIONS) as f64 / run.elapsed.as_secs_f64().max(f64::EPSILON)
        );
        if run.interrupted {
            let _ = writeln!(
                out,
                "  {}",
                "interrupted before the end of the schedule".bright_yellow()
            );
        }
        let _ = writeln!(out);
    }

    fn render_thresholds(&self, out: &mut String) {
        if self.thresholds.is_empty() {
            return;
        }
        let _ = writeln!(out, "{}", "Thresholds".bright_cyan().bold());
        for result in &self.thresholds {
            let mark = if result.passed {
                "✓".bright_green().bold()
            } else {
                "✗".bright_red().bold()
            };
            let observed = match result.observed {
                Some(value) => format!("{:.4}", value),
                None => "no data".to_string(),
            };
            let _ = writeln!(
                out,
                "  {} {} {} (observed {})",
                mark, result.metric, result.expression, observed
            );
        }
        let _ = writeln!(out);
    }

    fn render_steps(&self, out: &mut String) {
        let headers = [
            "metric", "count", "fail%", "avg", "min", "med", "p90", "p95", "p99", "max",
        ];
        let mut rows: Vec<Vec<String>> =
            vec![stats_row("http_req_duration", &self.metrics.requests)];
        rows.extend(
            self.metrics
                .steps
                .iter()
                .map(|(name, stats)| stats_row(name, stats)),
        );
        for trend in [ITERATION_DURATION, SCHEDULER_LAG] {
            if let Some(stats) = self.metrics.trend(trend) {
                rows.push(stats_row(trend, stats));
            }
        }
        render_table(out, &headers, &rows);
    }
}

fn stats_row(name: &str, stats: &StepStats) -> Vec<String> {
    vec![
        name.to_string(),
        stats.count.to_string(),
        format!("{:.2}", stats.failure_rate * 100.0),
        format!("{:.2}", stats.mean_ms),
        format!("{:.2}", stats.min_ms),
        format!("{:.2}", stats.p50_ms),
        format!("{:.2}", stats.p90_ms),
        format!("{:.2}", stats.p95_ms),
        format!("{:.2}", stats.p99_ms),
        format!("{:.2}", stats.max_ms),
    ]
}

fn separator(out: &mut String, widths: &[usize], left: char, middle: char, right: char) {
    out.push(left);
    for (i, width) in widths.iter().enumerate() {
        if i > 0 {
            out.push(middle);
        }
        out.push_str(&"─".repeat(width + 2));
    }
    out.push(right);
    out.push('\n');
}

fn render_table(out: &mut String, headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(i) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    separator(out, &widths, '┌', '┬', '┐');
    out.push('│');
    for (header, width) in headers.iter().zip(&widths) {
        let padded = format!("{:width$}", header, width = width);
        let _ = write!(out, " {} │", padded.bright_cyan().bold());
    }
    out.push('\n');
    separator(out, &widths, '├', '┼', '┤');

    for row in rows {
        out.push('│');
        for (i, (cell, width)) in row.iter().zip(&widths).enumerate() {
            // Names left, numbers right
            if i == 0 {
                let _ = write!(out, " {:<width$} │", cell, width = width);
            } else {
                let _ = write!(out, " {:>width$} │", cell, width = width);
            }
        }
        out.push('\n');
    }
    separator(out, &widths, '└', '┴', '┘');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threshold::{evaluate_all, parse_thresholds};
    use surge_metrics::MetricsRegistry;

    fn report() -> RunReport {
        let registry = MetricsRegistry::new();
        registry.record("post_kraj", 12.0, true);
        registry.record("get_kraj", 30.0, false);
        registry.observe(SCHEDULER_LAG, 0.5);
        let snapshot = registry.snapshot();
        let parsed = parse_thresholds([
            ("http_req_failed", "rate<0.01"),
            ("http_req_duration", "p(95)<500"),
        ])
        .unwrap();
        let thresholds = evaluate_all(&parsed, &snapshot).unwrap();
        RunReport::new(
            RunSummary {
                scheduled: 1,
                started: 1,
                completed: 1,
                ..RunSummary::default()
            },
            snapshot,
            thresholds,
        )
    }

    #[test]
    fn test_pass_fail() {
        let report = report();
        assert!(!report.passed());
        let failed: Vec<&str> = report.failed_thresholds().map(|t| t.metric.as_str()).collect();
        assert_eq!(failed, vec!["http_req_failed"]);
    }

    #[test]
    fn test_render_lists_every_step() {
        let text = report().render();
        for needle in ["post_kraj", "get_kraj", "scheduler_lag", "p(95)<500", "50.00%"] {
            assert!(text.contains(needle), "missing {} in\n{}", needle, text);
        }
    }

    #[test]
    fn test_json_export() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        report().export(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["run"]["started"], 1);
        assert_eq!(value["metrics"]["steps"]["post_kraj"]["count"], 1);
        assert_eq!(value["thresholds"][0]["passed"], false);
    }
}
