//! End-of-run threshold configuration

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Threshold expressions keyed by metric name
///
/// ```yaml
/// thresholds:
///   http_req_failed: ["rate<0.01"]
///   http_req_duration: ["p(95)<500"]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdConfig {
    pub rules: BTreeMap<String, Vec<String>>,
}

impl ThresholdConfig {
    /// Iterate over `(metric, expression)` pairs in metric order
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.rules.iter().flat_map(|(metric, expressions)| {
            expressions
                .iter()
                .map(move |expression| (metric.as_str(), expression.as_str()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.values().all(Vec::is_empty)
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        let mut rules = BTreeMap::new();
        rules.insert("http_req_failed".to_string(), vec!["rate<0.01".to_string()]);
        rules.insert("http_req_duration".to_string(), vec!["p(95)<500".to_string()]);
        Self { rules }
    }
}

impl Validatable for ThresholdConfig {
    fn validate(&self) -> ConfigResult<()> {
        for (metric, expressions) in &self.rules {
            if metric.trim().is_empty() {
                return Err(self.validation_error("Threshold metric name cannot be empty"));
            }
            if expressions.iter().any(|e| e.trim().is_empty()) {
                return Err(self.validation_error(format!(
                    "Threshold for '{}' contains an empty expression",
                    metric
                )));
            }
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "thresholds"
    }
}
