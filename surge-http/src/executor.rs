//! Step executor: one timed, recorded network call

use crate::errors::TransportError;
use crate::transport::{RawResponse, StepRequest, Transport};
use crate::types::HttpMethod;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::{Duration, Instant};
use surge_logging::RequestFailure;
use surge_metrics::{MetricSample, MetricsRegistry};
use tracing::{trace, warn};

/// Status of an executed step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// The server answered with this status code
    Http(u16),
    /// No response: connection refused, timeout, ...
    TransportFailure(TransportError),
}

/// Result of a step, returned whatever the status
#[derive(Debug, Clone)]
pub struct Outcome {
    pub status: OutcomeStatus,
    pub body: String,
    pub headers: Vec<(String, String)>,
    pub cookies: Vec<(String, String)>,
    pub duration: Duration,
}

impl Outcome {
    /// `true` for an HTTP status below 400
    pub fn is_success(&self) -> bool {
        matches!(self.status, OutcomeStatus::Http(code) if code < 400)
    }

    pub fn status_code(&self) -> Option<u16> {
        match self.status {
            OutcomeStatus::Http(code) => Some(code),
            OutcomeStatus::TransportFailure(_) => None,
        }
    }

    pub fn is_transport_failure(&self) -> bool {
        matches!(self.status, OutcomeStatus::TransportFailure(_))
    }

    /// Body parsed as JSON, if it is JSON
    pub fn json(&self) -> Option<JsonValue> {
        serde_json::from_str(&self.body).ok()
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn duration_ms(&self) -> f64 {
        self.duration.as_secs_f64() * 1000.0
    }

    fn from_response(response: RawResponse, duration: Duration) -> Self {
        Self {
            status: OutcomeStatus::Http(response.status),
            body: response.body,
            headers: response.headers,
            cookies: response.cookies,
            duration,
        }
    }
}

/// A call as requested by the workflow
#[derive(Debug, Clone)]
pub struct StepCall<'a> {
    /// Metric key; `None` only counts towards the request aggregates
    pub step: Option<&'a str>,
    pub method: HttpMethod,
    pub url: &'a str,
    pub body: Option<JsonValue>,
    pub headers: Vec<(String, String)>,
}

impl<'a> StepCall<'a> {
    pub fn new(step: &'a str, method: HttpMethod, url: &'a str) -> Self {
        Self {
            step: Some(step),
            method,
            url,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn untracked(method: HttpMethod, url: &'a str) -> Self {
        Self {
            step: None,
            method,
            url,
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Wraps a [`Transport`] with timing, metrics and failure diagnostics
///
/// `execute` never fails: non-2xx statuses are returned as-is and transport
/// errors become [`OutcomeStatus::TransportFailure`]. Every call records
/// exactly one sample.
#[derive(Clone)]
pub struct StepExecutor {
    transport: Arc<dyn Transport>,
    metrics: Arc<MetricsRegistry>,
}

impl StepExecutor {
    pub fn new(transport: Arc<dyn Transport>, metrics: Arc<MetricsRegistry>) -> Self {
        Self { transport, metrics }
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    pub async fn execute(&self, call: StepCall<'_>) -> Outcome {
        let step_label = call.step.unwrap_or("untracked");
        let request = StepRequest {
            method: call.method,
            url: call.url.to_string(),
            body: call.body,
            headers: call.headers,
        };

        let started = Instant::now();
        let result = self.transport.send(&request).await;
        let duration = started.elapsed();

        let outcome = match result {
            Ok(response) => Outcome::from_response(response, duration),
            Err(err) => {
                warn!(
                    target: "surge::request",
                    step = step_label,
                    verb = request.method.as_str(),
                    url = %request.url,
                    error = %err,
                    "Request failed: {} {} - {}",
                    request.method,
                    request.url,
                    err
                );
                Outcome {
                    status: OutcomeStatus::TransportFailure(err),
                    body: String::new(),
                    headers: Vec::new(),
                    cookies: Vec::new(),
                    duration,
                }
            }
        };

        if let Some(code) = outcome.status_code().filter(|code| *code >= 400) {
            RequestFailure::new(
                step_label,
                request.method.as_str(),
                &request.url,
                code,
                &outcome.body,
            )
            .emit();
        }

        self.metrics.submit(&MetricSample {
            step: call.step.map(str::to_string),
            verb: request.method.as_str(),
            duration_ms: outcome.duration_ms(),
            success: outcome.is_success(),
        });

        trace!(
            step = step_label,
            status = ?outcome.status,
            duration_ms = outcome.duration_ms(),
            "Step completed"
        );

        outcome
    }
}

impl std::fmt::Debug for StepExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepExecutor").finish_non_exhaustive()
    }
}
