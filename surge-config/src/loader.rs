//! Configuration loading and environment variable handling

use crate::domains::SurgeConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "SURGE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<SurgeConfig> {
        debug!("Reading configuration from {}", path.as_ref().display());
        let content = std::fs::read_to_string(path)?;
        self.from_yaml_str(&content)
    }

    /// Load configuration from YAML text with environment overrides
    pub fn from_yaml_str(&self, content: &str) -> ConfigResult<SurgeConfig> {
        let mut config: SurgeConfig = serde_yaml::from_str(content)?;
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<SurgeConfig> {
        let mut config = SurgeConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<SurgeConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut SurgeConfig) -> ConfigResult<()> {
        self.apply_target_overrides(&mut config.target);
        self.apply_http_overrides(&mut config.http)?;
        self.apply_load_overrides(&mut config.load)?;
        self.apply_logging_overrides(&mut config.logging)?;
        Ok(())
    }

    /// Apply target config overrides
    fn apply_target_overrides(&self, config: &mut crate::domains::target::TargetConfig) {
        if let Ok(base_url) = self.get_env_var("BASE_URL") {
            config.base_url = base_url;
        }

        if let Ok(password) = self.get_env_var("PASSWORD") {
            config.password = password;
        }
    }

    /// Apply HTTP config overrides
    fn apply_http_overrides(
        &self,
        config: &mut crate::domains::http::HttpConfig,
    ) -> ConfigResult<()> {
        if let Some(seconds) = self.parse_env_var::<u64>("HTTP_TIMEOUT")? {
            config.timeout = std::time::Duration::from_secs(seconds);
        }

        if let Ok(user_agent) = self.get_env_var("HTTP_USER_AGENT") {
            config.user_agent = user_agent;
        }

        if let Some(verify_ssl) = self.parse_env_var::<bool>("HTTP_VERIFY_SSL")? {
            config.verify_ssl = verify_ssl;
        }

        Ok(())
    }

    /// Apply load profile overrides
    ///
    /// `SURGE_START_RATE` also retargets every stage, which turns the
    /// profile into a constant rate at that value.
    fn apply_load_overrides(
        &self,
        config: &mut crate::domains::load::LoadConfig,
    ) -> ConfigResult<()> {
        if let Some(rate) = self.parse_env_var::<f64>("START_RATE")? {
            config.start_request_rate = rate;
            for stage in &mut config.stages {
                stage.target_request_rate = rate;
            }
        }

        if let Some(per_iteration) = self.parse_env_var::<f64>("REQUESTS_PER_ITERATION")? {
            config.requests_per_iteration = per_iteration;
        }

        if let Some(max_workers) = self.parse_env_var::<usize>("MAX_WORKERS")? {
            config.max_workers = max_workers;
        }

        if let Some(pre_allocated) = self.parse_env_var::<usize>("PRE_ALLOCATED_WORKERS")? {
            config.pre_allocated_workers = pre_allocated;
        }

        Ok(())
    }

    /// Apply logging config overrides
    fn apply_logging_overrides(
        &self,
        config: &mut crate::domains::logging::LoggingConfig,
    ) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|message| self.env_error("LOG_LEVEL", message))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|message| self.env_error("LOG_FORMAT", message))?;
        }

        Ok(())
    }

    /// Parse an optional environment variable
    fn parse_env_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e| self.env_error(name, e)),
            Err(_) => Ok(None),
        }
    }

    fn env_error(&self, name: &str, message: impl std::fmt::Display) -> ConfigError {
        ConfigError::Env {
            variable: format!("{}_{}", self.prefix, name),
            message: message.to_string(),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
