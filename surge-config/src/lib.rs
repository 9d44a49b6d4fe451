//! Domain-driven configuration management for surge
//!
//! Configuration is split by functional domain (target service, HTTP client,
//! load profile, thresholds, logging). Every domain carries defaults, is
//! validated independently and can be overridden from `SURGE_*` environment
//! variables.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{
    http::{HttpConfig, PoolConfig},
    load::{LoadConfig, StageConfig},
    logging::{LogFormat, LogLevel, LoggingConfig},
    target::TargetConfig,
    thresholds::ThresholdConfig,
    SurgeConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
