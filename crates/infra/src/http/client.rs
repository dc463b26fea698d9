use std::time::Duration;

use chrono::Utc;
use reqwest::blocking::Client as ReqwestClient;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, RETRY_AFTER};
use reqwest::Method;
use statline_domain::constants::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use statline_domain::{ApiConfig, ClientError, HttpMethod, RequestDescriptor};
use tracing::debug;

use super::transport::{parse_retry_after, RawResponse, Transport, TransportError};
use crate::errors::conversions::config_error;

/// Blocking HTTP transport with bearer auth and a per-call timeout.
///
/// Performs exactly one send per call; retries belong to the caller.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: ReqwestClient,
    base_url: String,
}

impl HttpTransport {
    /// Start building a new HTTP transport.
    pub fn builder() -> HttpTransportBuilder {
        HttpTransportBuilder::default()
    }

    /// Transport for the configured host and credentials.
    pub fn from_config(config: &ApiConfig) -> Result<Self, ClientError> {
        Self::builder_for(config).build()
    }

    /// Builder preloaded with the configured host, timeout and credentials.
    pub fn builder_for(config: &ApiConfig) -> HttpTransportBuilder {
        let builder = Self::builder()
            .base_url(config.base_url())
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone());
        match &config.api_key {
            Some(key) => builder.bearer_token(key.expose()),
            None => builder,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, request: &RequestDescriptor) -> String {
        format!("{}{}", self.base_url, request.path())
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError> {
        let method = match request.method() {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };
        let url = self.url_for(request);
        debug!(%method, %url, params = %request.params(), "sending HTTP request");

        let response = self.client.request(method.clone(), &url).query(request.params()).send()?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| parse_retry_after(value, Utc::now()));
        let body = response.bytes()?.to_vec();

        debug!(%method, %url, status, bytes = body.len(), "received HTTP response");
        Ok(RawResponse { status, retry_after, body })
    }
}

/// Builder for [`HttpTransport`].
#[derive(Debug)]
pub struct HttpTransportBuilder {
    base_url: Option<String>,
    timeout: Duration,
    user_agent: String,
    bearer_token: Option<String>,
    system_proxy: bool,
}

impl Default for HttpTransportBuilder {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            bearer_token: None,
            system_proxy: true,
        }
    }
}

impl HttpTransportBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = agent.into();
        self
    }

    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    /// Ignore `HTTP(S)_PROXY` and connect directly
    pub fn no_proxy(mut self) -> Self {
        self.system_proxy = false;
        self
    }

    pub fn build(self) -> Result<HttpTransport, ClientError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ClientError::Config("HTTP transport requires a base URL".into()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(token) = self.bearer_token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| config_error("Invalid API key", e))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let mut client = ReqwestClient::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .default_headers(headers);
        if !self.system_proxy {
            client = client.no_proxy();
        }
        let client = client
            .build()
            .map_err(|e| config_error("Failed to build HTTP client", e))?;

        Ok(HttpTransport { client, base_url })
    }
}
