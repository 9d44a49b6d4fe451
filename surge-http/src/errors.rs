//! HTTP error types

use thiserror::Error;

/// Failure to obtain any HTTP response at all
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Client configuration error: {0}")]
    ClientBuild(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if err.is_builder() {
            TransportError::InvalidUrl(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Session bootstrap failures; each one aborts the run
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("Authentication request could not be sent: {0}")]
    Transport(String),

    #[error("Authentication rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Authentication response did not set the '{0}' cookie")]
    MissingCookie(String),

    #[error("Invalid authentication URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}
