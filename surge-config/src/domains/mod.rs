//! Domain-specific configuration modules

pub mod http;
pub mod load;
pub mod logging;
pub mod target;
pub mod thresholds;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main surge configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SurgeConfig {
    /// Target service and authentication
    #[serde(default)]
    pub target: target::TargetConfig,

    /// HTTP client configuration
    #[serde(default)]
    pub http: http::HttpConfig,

    /// Arrival-rate load profile
    #[serde(default)]
    pub load: load::LoadConfig,

    /// End-of-run thresholds
    #[serde(default)]
    pub thresholds: thresholds::ThresholdConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,

    /// Workflow definition file; the built-in workflow is used when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow: Option<PathBuf>,
}

impl SurgeConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.target.validate()?;
        self.http.validate()?;
        self.load.validate()?;
        self.thresholds.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = SurgeConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
