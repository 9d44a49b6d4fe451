//! Structured logging infrastructure for surge
//!
//! This crate provides:
//! - Subscriber initialisation from [`LoggingConfig`]
//! - Request failure diagnostics emitted by the step executor

pub mod diagnostics;
pub mod init;

// Re-export main types for convenience
pub use diagnostics::{excerpt, RequestFailure, EXCERPT_LIMIT};
pub use init::{build_env_filter, init_logging, init_simple_tracing};
pub use surge_config::{LogFormat, LogLevel, LoggingConfig};
