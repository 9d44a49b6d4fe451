//! Transport configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use surge_config::HttpConfig as ConfigHttpConfig;

/// Settings applied to the shared `reqwest` client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Connect timeout
    pub connect_timeout: Duration,

    /// Maximum number of redirects to follow
    pub max_redirects: u32,

    /// User agent string
    pub user_agent: String,

    /// Whether to verify SSL certificates
    pub verify_ssl: bool,

    /// Idle connections kept per host
    pub max_idle_per_host: usize,

    /// How long an idle connection is kept
    pub idle_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        ConfigHttpConfig::default().into()
    }
}

impl From<ConfigHttpConfig> for TransportConfig {
    fn from(config: ConfigHttpConfig) -> Self {
        Self {
            timeout: config.timeout,
            connect_timeout: config.connect_timeout,
            max_redirects: config.max_redirects,
            user_agent: config.user_agent,
            verify_ssl: config.verify_ssl,
            max_idle_per_host: config.pool.max_idle_per_host,
            idle_timeout: config.pool.idle_timeout,
        }
    }
}
