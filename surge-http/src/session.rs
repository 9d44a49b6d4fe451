//! One-time session bootstrap

use crate::errors::BootstrapError;
use crate::executor::{OutcomeStatus, StepCall, StepExecutor};
use crate::types::HttpMethod;
use tracing::{debug, info};
use url::Url;

/// Step key under which the authentication request is recorded
pub const AUTH_STEP: &str = "auth";

/// Session cookie obtained once and presented by every iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCredential {
    pub cookie_name: String,
    pub value: String,
}

impl SessionCredential {
    pub fn new(cookie_name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            value: value.into(),
        }
    }

    /// Value of the `Cookie` request header
    pub fn cookie_header(&self) -> String {
        format!("{}={}", self.cookie_name, self.value)
    }
}

/// Exchanges the shared secret for a [`SessionCredential`]
#[derive(Debug, Clone)]
pub struct SessionBootstrap {
    executor: StepExecutor,
    base_url: Url,
    auth_path: String,
    cookie_name: String,
}

impl SessionBootstrap {
    pub fn new(
        executor: StepExecutor,
        base_url: &str,
        auth_path: impl Into<String>,
        cookie_name: impl Into<String>,
    ) -> Result<Self, BootstrapError> {
        Ok(Self {
            executor,
            base_url: Url::parse(base_url)?,
            auth_path: auth_path.into(),
            cookie_name: cookie_name.into(),
        })
    }

    fn auth_url(&self, secret: &str) -> Result<Url, BootstrapError> {
        let mut url = self.base_url.join(&self.auth_path)?;
        url.query_pairs_mut().append_pair("password", secret);
        Ok(url)
    }

    /// Authenticate exactly once
    ///
    /// Only a 200 response carrying the session cookie succeeds; anything
    /// else is fatal for the run and is never retried.
    pub async fn authenticate(&self, secret: &str) -> Result<SessionCredential, BootstrapError> {
        let url = self.auth_url(secret)?;
        debug!("Authenticating against {}{}", self.base_url, self.auth_path);

        let outcome = self
            .executor
            .execute(StepCall::new(AUTH_STEP, HttpMethod::Get, url.as_str()))
            .await;

        match &outcome.status {
            OutcomeStatus::TransportFailure(err) => {
                return Err(BootstrapError::Transport(err.to_string()));
            }
            OutcomeStatus::Http(200) => {}
            OutcomeStatus::Http(status) => {
                return Err(BootstrapError::Rejected {
                    status: *status,
                    body: surge_logging::excerpt(&outcome.body),
                });
            }
        }

        let value = outcome
            .cookie(&self.cookie_name)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| BootstrapError::MissingCookie(self.cookie_name.clone()))?;

        info!("Session established ({} cookie)", self.cookie_name);
        Ok(SessionCredential::new(&self.cookie_name, value))
    }
}
