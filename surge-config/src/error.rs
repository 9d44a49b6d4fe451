//! Configuration error types

use thiserror::Error;

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed configuration YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A `SURGE_*` override that does not parse
    #[error("Bad value in {variable}: {message}")]
    Env { variable: String, message: String },

    /// A value rejected by its domain's validation
    #[error("[{domain}] {message}")]
    Domain { domain: String, message: String },
}
