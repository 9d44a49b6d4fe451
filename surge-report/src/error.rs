//! Report error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Invalid threshold '{expression}': {message}")]
    InvalidThreshold { expression: String, message: String },

    #[error("Aggregation '{aggregation}' is not available for metric '{metric}'")]
    UnsupportedAggregation { metric: String, aggregation: String },

    #[error("Failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to write report: {0}")]
    Io(#[from] std::io::Error),
}

pub type ReportResult<T> = Result<T, ReportError>;
