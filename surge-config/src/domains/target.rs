//! Target service configuration

use crate::error::ConfigResult;
use crate::validation::{validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};

/// The service under load and how to authenticate against it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL every workflow path is joined onto
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Secret exchanged once for a session credential
    #[serde(default = "default_password")]
    pub password: String,

    /// Authentication endpoint path
    #[serde(default = "default_auth_path")]
    pub auth_path: String,

    /// Name of the session cookie issued by the auth endpoint
    #[serde(default = "default_session_cookie")]
    pub session_cookie: String,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            password: default_password(),
            auth_path: default_auth_path(),
            session_cookie: default_session_cookie(),
        }
    }
}

impl Validatable for TargetConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.base_url, "base_url", self.domain_name())?;
        validate_required_string(&self.password, "password", self.domain_name())?;
        validate_required_string(&self.session_cookie, "session_cookie", self.domain_name())?;

        if !self.auth_path.starts_with('/') {
            return Err(self.validation_error(format!(
                "auth_path must start with '/', got '{}'",
                self.auth_path
            )));
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "target"
    }
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_password() -> String {
    "heslo".to_string()
}

fn default_auth_path() -> String {
    "/auth".to_string()
}

fn default_session_cookie() -> String {
    "katastr_session".to_string()
}
