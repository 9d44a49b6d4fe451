//! Transport seam between the executor and the network

use crate::config::TransportConfig;
use crate::errors::TransportError;
use crate::session::SessionCredential;
use crate::types::HttpMethod;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, COOKIE};
use reqwest::Client;
use serde_json::Value as JsonValue;
use std::str::FromStr;
use tracing::debug;

/// A fully rendered request
#[derive(Debug, Clone, PartialEq)]
pub struct StepRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<JsonValue>,
    pub headers: Vec<(String, String)>,
}

impl StepRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Raw response as received, whatever the status
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
    /// Cookies set by the response as `(name, value)`
    pub cookies: Vec<(String, String)>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Sends one request; only failing to get any response is an error
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &StepRequest) -> Result<RawResponse, TransportError>;
}

/// `reqwest`-backed transport sharing one connection pool across iterations
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Create an unauthenticated transport
    pub fn new(config: &TransportConfig) -> Result<Self, TransportError> {
        Self::build(config, HeaderMap::new())
    }

    /// Create a transport that presents `credential` on every request
    pub fn with_session(
        config: &TransportConfig,
        credential: &SessionCredential,
    ) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        let cookie = HeaderValue::from_str(&credential.cookie_header())
            .map_err(|e| TransportError::InvalidHeader(e.to_string()))?;
        headers.insert(COOKIE, cookie);
        Self::build(config, headers)
    }

    fn build(config: &TransportConfig, default_headers: HeaderMap) -> Result<Self, TransportError> {
        debug!(
            "Creating HTTP client with {}s timeout",
            config.timeout.as_secs()
        );
        // Zero means a redirect is returned to the caller rather than followed
        let redirect = match config.max_redirects {
            0 => reqwest::redirect::Policy::none(),
            max => reqwest::redirect::Policy::limited(max as usize),
        };
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .redirect(redirect)
            .pool_max_idle_per_host(config.max_idle_per_host)
            .pool_idle_timeout(config.idle_timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &StepRequest) -> Result<RawResponse, TransportError> {
        let mut builder = self
            .client
            .request(reqwest::Method::from(request.method), &request.url);

        if !request.headers.is_empty() {
            let mut header_map = HeaderMap::new();
            for (key, value) in &request.headers {
                let name = HeaderName::from_str(key)
                    .map_err(|_| TransportError::InvalidHeader(key.clone()))?;
                let value = HeaderValue::from_str(value)
                    .map_err(|_| TransportError::InvalidHeader(format!("{}: {}", key, value)))?;
                header_map.insert(name, value);
            }
            builder = builder.headers(header_map);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();

        let cookies = response
            .cookies()
            .map(|cookie| (cookie.name().to_string(), cookie.value().to_string()))
            .collect();

        let body = response.text().await?;

        Ok(RawResponse {
            status,
            body,
            headers,
            cookies,
        })
    }
}
