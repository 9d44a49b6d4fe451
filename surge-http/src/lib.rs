//! HTTP functionality for surge
//!
//! This crate provides the [`Transport`] seam (with a `reqwest` implementation),
//! the [`StepExecutor`] that times and records every workflow call, and the
//! one-time [`SessionBootstrap`] authentication exchange.

pub mod config;
pub mod errors;
pub mod executor;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(feature = "testing")]
pub mod testing;

// Re-export main types for convenience
pub use config::TransportConfig;
pub use errors::{BootstrapError, TransportError};
pub use executor::{Outcome, OutcomeStatus, StepCall, StepExecutor};
pub use session::{SessionBootstrap, SessionCredential};
pub use transport::{RawResponse, ReqwestTransport, StepRequest, Transport};
pub use types::HttpMethod;
