//! Request failure diagnostics
//!
//! Failed requests never interrupt an iteration; they surface as one
//! structured `warn` event on the `surge::request` target.

use serde::Serialize;

/// Maximum number of characters of a response body kept in a diagnostic
pub const EXCERPT_LIMIT: usize = 100;

/// Truncate a response body to at most [`EXCERPT_LIMIT`] characters
pub fn excerpt(body: &str) -> String {
    if body.is_empty() {
        return "empty".to_string();
    }
    body.chars().take(EXCERPT_LIMIT).collect()
}

/// Diagnostic record for a request answered with status >= 400
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestFailure {
    pub step: String,
    pub verb: String,
    pub url: String,
    pub status: u16,
    pub body_excerpt: String,
}

impl RequestFailure {
    pub fn new(
        step: impl Into<String>,
        verb: impl Into<String>,
        url: impl Into<String>,
        status: u16,
        body: &str,
    ) -> Self {
        Self {
            step: step.into(),
            verb: verb.into(),
            url: url.into(),
            status,
            body_excerpt: excerpt(body),
        }
    }

    /// Emit the record through `tracing`
    pub fn emit(&self) {
        tracing::warn!(
            target: "surge::request",
            step = %self.step,
            verb = %self.verb,
            url = %self.url,
            status = self.status,
            body = %self.body_excerpt,
            "Request failed: {} {} - Status: {}",
            self.verb,
            self.url,
            self.status
        );
    }
}
