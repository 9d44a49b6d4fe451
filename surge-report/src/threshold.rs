//! Threshold expressions evaluated over a metrics snapshot
//!
//! An expression reads `<aggregation> <operator> <bound>`, for example
//! `p(95)<500` or `rate<0.01`.

use crate::error::{ReportError, ReportResult};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use surge_metrics::{MetricsSnapshot, StepStats, HTTP_REQS, HTTP_REQ_DURATION, HTTP_REQ_FAILED};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Avg,
    Min,
    Max,
    Med,
    Count,
    Rate,
    Percentile(f64),
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Aggregation::Avg => write!(f, "avg"),
            Aggregation::Min => write!(f, "min"),
            Aggregation::Max => write!(f, "max"),
            Aggregation::Med => write!(f, "med"),
            Aggregation::Count => write!(f, "count"),
            Aggregation::Rate => write!(f, "rate"),
            Aggregation::Percentile(p) => write!(f, "p({})", p),
        }
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "avg" => Ok(Aggregation::Avg),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            "med" => Ok(Aggregation::Med),
            "count" => Ok(Aggregation::Count),
            "rate" => Ok(Aggregation::Rate),
            other => {
                let inner = other
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| format!("unknown aggregation '{}'", other))?;
                let p: f64 = inner
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid percentile '{}'", inner))?;
                if (0.0..=100.0).contains(&p) {
                    Ok(Aggregation::Percentile(p))
                } else {
                    Err(format!("percentile {} out of range", p))
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparison {
    fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
            Comparison::Ne => observed != bound,
        }
    }
}

/// One parsed threshold on one metric
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Threshold {
    pub metric: String,
    pub expression: String,
    pub aggregation: Aggregation,
    pub comparison: Comparison,
    pub bound: f64,
}

/// Evaluation result of one threshold
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThresholdResult {
    pub metric: String,
    pub expression: String,
    /// `None` when the metric recorded nothing during the run
    pub observed: Option<f64>,
    pub passed: bool,
}

impl Threshold {
    pub fn parse(metric: &str, expression: &str) -> ReportResult<Self> {
        let invalid = |message: String| ReportError::InvalidThreshold {
            expression: expression.to_string(),
            message,
        };

        let position = expression
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| invalid("missing comparison operator".to_string()))?;
        let (left, rest) = expression.split_at(position);

        let (comparison, right) = [
            ("<=", Comparison::Le),
            (">=", Comparison::Ge),
            ("==", Comparison::Eq),
            ("!=", Comparison::Ne),
            ("<", Comparison::Lt),
            (">", Comparison::Gt),
        ]
        .iter()
        .find_map(|(op, cmp)| rest.strip_prefix(op).map(|right| (*cmp, right)))
        .ok_or_else(|| invalid(format!("unknown operator in '{}'", rest)))?;

        let aggregation: Aggregation = left.trim().parse().map_err(invalid)?;
        let bound: f64 = right
            .trim()
            .parse()
            .map_err(|_| invalid(format!("invalid bound '{}'", right.trim())))?;

        Ok(Self {
            metric: metric.to_string(),
            expression: expression.to_string(),
            aggregation,
            comparison,
            bound,
        })
    }

    /// Observed value of this threshold's aggregation
    pub fn observe(&self, snapshot: &MetricsSnapshot) -> ReportResult<Option<f64>> {
        let unsupported = || ReportError::UnsupportedAggregation {
            metric: self.metric.clone(),
            aggregation: self.aggregation.to_string(),
        };
        let elapsed = snapshot.elapsed_secs.max(f64::EPSILON);

        match self.metric.as_str() {
            HTTP_REQ_DURATION => trend_value(&snapshot.requests, self.aggregation)
                .map(Some)
                .ok_or_else(unsupported),
            HTTP_REQ_FAILED => match self.aggregation {
                Aggregation::Rate => Ok(Some(snapshot.requests.failure_rate)),
                Aggregation::Count => Ok(Some(snapshot.requests.failures as f64)),
                _ => Err(unsupported()),
            },
            HTTP_REQS => match self.aggregation {
                Aggregation::Count => Ok(Some(snapshot.requests.count as f64)),
                Aggregation::Rate => Ok(Some(snapshot.requests.count as f64 / elapsed)),
                _ => Err(unsupported()),
            },
            name => {
                if let Some(stats) = snapshot.step(name).or_else(|| snapshot.trend(name)) {
                    return trend_value(stats, self.aggregation)
                        .map(Some)
                        .ok_or_else(unsupported);
                }
                if let Some(&count) = snapshot.counters.get(name) {
                    return match self.aggregation {
                        Aggregation::Count => Ok(Some(count as f64)),
                        Aggregation::Rate => Ok(Some(count as f64 / elapsed)),
                        _ => Err(unsupported()),
                    };
                }
                if let Some(value) = snapshot.gauge(name) {
                    return match self.aggregation {
                        Aggregation::Rate | Aggregation::Count => Err(unsupported()),
                        _ => Ok(Some(value as f64)),
                    };
                }
                Ok(None)
            }
        }
    }

    pub fn evaluate(&self, snapshot: &MetricsSnapshot) -> ReportResult<ThresholdResult> {
        let observed = self.observe(snapshot)?;
        Ok(ThresholdResult {
            metric: self.metric.clone(),
            expression: self.expression.clone(),
            observed,
            passed: observed.is_some_and(|value| self.comparison.holds(value, self.bound)),
        })
    }
}

fn trend_value(stats: &StepStats, aggregation: Aggregation) -> Option<f64> {
    match aggregation {
        Aggregation::Avg => Some(stats.mean_ms),
        Aggregation::Min => Some(stats.min_ms),
        Aggregation::Max => Some(stats.max_ms),
        Aggregation::Med => Some(stats.percentile(50.0)),
        Aggregation::Count => Some(stats.count as f64),
        Aggregation::Rate => Some(stats.failure_rate),
        Aggregation::Percentile(p) => Some(stats.percentile(p)),
    }
}

/// Parse `(metric, expression)` pairs
pub fn parse_thresholds<'a, I>(pairs: I) -> ReportResult<Vec<Threshold>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(metric, expression)| Threshold::parse(metric, expression))
        .collect()
}

/// Evaluate every threshold against one snapshot
pub fn evaluate_all(
    thresholds: &[Threshold],
    snapshot: &MetricsSnapshot,
) -> ReportResult<Vec<ThresholdResult>> {
    thresholds.iter().map(|t| t.evaluate(snapshot)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use surge_metrics::MetricsRegistry;

    #[test]
    fn test_parse_expressions() {
        let t = Threshold::parse("http_req_duration", "p(95)<500").unwrap();
        assert_eq!(t.aggregation, Aggregation::Percentile(95.0));
        assert_eq!(t.comparison, Comparison::Lt);
        assert_eq!(t.bound, 500.0);

        let t = Threshold::parse("http_req_failed", "rate < 0.01").unwrap();
        assert_eq!(t.aggregation, Aggregation::Rate);
        assert_eq!(t.bound, 0.01);

        let t = Threshold::parse("iterations", "count>=100").unwrap();
        assert_eq!(t.comparison, Comparison::Ge);

        let t = Threshold::parse("post_kraj", "med != 0").unwrap();
        assert_eq!(t.aggregation, Aggregation::Med);
        assert_eq!(t.comparison, Comparison::Ne);
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["p(95)", "p95<500", "avg<fast", "p(101)<1", "avg=>1", "sum<1"] {
            assert!(
                Threshold::parse("m", bad).is_err(),
                "'{}' should not parse",
                bad
            );
        }
    }

    fn snapshot() -> MetricsSnapshot {
        let registry = MetricsRegistry::new();
        for i in 0..100 {
            registry.record("get_kraj", (i + 1) as f64, i % 50 != 0);
        }
        registry.increment("iterations", 10);
        registry.gauge_max("workers_allocated", 12);
        registry.snapshot()
    }

    #[test]
    fn test_request_thresholds() {
        let snapshot = snapshot();

        let failed = Threshold::parse("http_req_failed", "rate<0.01")
            .unwrap()
            .evaluate(&snapshot)
            .unwrap();
        assert_eq!(failed.observed, Some(0.02));
        assert!(!failed.passed);

        let duration = Threshold::parse("http_req_duration", "p(95)<500")
            .unwrap()
            .evaluate(&snapshot)
            .unwrap();
        assert!(duration.passed);
        assert!((duration.observed.unwrap() - 95.0).abs() < 1.0);

        let reqs = Threshold::parse("http_reqs", "count==100")
            .unwrap()
            .evaluate(&snapshot)
            .unwrap();
        assert!(reqs.passed);
    }

    #[test]
    fn test_step_counter_and_gauge_thresholds() {
        let snapshot = snapshot();
        let results = evaluate_all(
            &parse_thresholds([
                ("get_kraj", "max<101"),
                ("iterations", "count>5"),
                ("workers_allocated", "max<10"),
            ])
            .unwrap(),
            &snapshot,
        )
        .unwrap();

        assert!(results[0].passed);
        assert!(results[1].passed);
        assert!(!results[2].passed);
        assert_eq!(results[2].observed, Some(12.0));
    }

    #[test]
    fn test_missing_metric_fails() {
        let result = Threshold::parse("del_kraj", "p(95)<500")
            .unwrap()
            .evaluate(&snapshot())
            .unwrap();
        assert_eq!(result.observed, None);
        assert!(!result.passed);
    }

    #[test]
    fn test_unsupported_aggregation() {
        let err = Threshold::parse("http_req_failed", "p(95)<1")
            .unwrap()
            .evaluate(&snapshot())
            .unwrap_err();
        assert!(matches!(err, ReportError::UnsupportedAggregation { .. }));
    }
}
