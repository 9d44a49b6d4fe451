//! HTTP client settings shared by every virtual user

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One `reqwest` client is built from this and shared across workers
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds; expiry counts as a failed request
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub timeout: Duration,

    /// TCP connect timeout in milliseconds
    #[serde(with = "crate::domains::utils::serde_duration_millis")]
    pub connect_timeout: Duration,

    pub user_agent: String,

    pub verify_ssl: bool,

    /// Redirects followed before the response is returned as-is
    pub max_redirects: u32,

    #[serde(default)]
    pub pool: PoolConfig,
}

/// Keep-alive pool; sized for a few hundred concurrent iterations by default
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub max_idle_per_host: usize,

    /// Seconds an idle connection is kept open
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub idle_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_millis(5000),
            user_agent: concat!("surge/", env!("CARGO_PKG_VERSION")).to_string(),
            verify_ssl: true,
            max_redirects: 0,
            pool: PoolConfig::default(),
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle_per_host: 512,
            idle_timeout: Duration::from_secs(90),
        }
    }
}

impl Validatable for HttpConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.timeout.is_zero() {
            return Err(self.validation_error("timeout must be at least one second"));
        }
        if self.connect_timeout.is_zero() || self.connect_timeout > self.timeout {
            return Err(self.validation_error(format!(
                "connect_timeout must lie between 1ms and the request timeout ({}s)",
                self.timeout.as_secs()
            )));
        }
        validate_required_string(&self.user_agent, "user_agent", self.domain_name())?;
        self.pool.validate()
    }

    fn domain_name(&self) -> &'static str {
        "http"
    }
}

impl Validatable for PoolConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.idle_timeout.is_zero() {
            return Err(self.validation_error("idle_timeout must be at least one second"));
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "http.pool"
    }
}
