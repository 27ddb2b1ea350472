//! HTTP client with transport retries and pacing

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::Credential;
use crate::error::{Error, Result};
use reqwest::{Client, Method, Response};
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Retries after a connect failure or timeout
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Optional pacing of outgoing requests
    pub rate_limit: Option<RateLimiterConfig>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 2,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(5),
            rate_limit: None,
            user_agent: format!("bookmark-sync/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max transport retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff bounds
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Pace requests
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// How a request carries the caller's credential
#[derive(Debug, Clone, Default)]
pub enum RequestAuth {
    /// No credential
    #[default]
    None,
    /// `Authorization: Bearer` only (upstream source)
    Bearer(Credential),
    /// Bearer plus user id (our own sync server)
    Forwarded(Credential),
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters, in order
    pub query: Vec<(String, String)>,
    /// Request headers
    pub headers: Vec<(String, String)>,
    /// Credential handling
    pub auth: RequestAuth,
    /// Override timeout for this request
    pub timeout: Option<Duration>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    /// Authenticate with a bearer token
    #[must_use]
    pub fn bearer(mut self, credential: &Credential) -> Self {
        self.auth = RequestAuth::Bearer(credential.clone());
        self
    }

    /// Forward the full credential
    #[must_use]
    pub fn forwarded(mut self, credential: &Credential) -> Self {
        self.auth = RequestAuth::Forwarded(credential.clone());
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP client with transport retries and optional pacing
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Make a GET request with config
    pub async fn get(&self, url: &str, config: RequestConfig) -> Result<Response> {
        self.request(Method::GET, url, config).await
    }

    /// Make a POST request with config
    pub async fn post(&self, url: &str, config: RequestConfig) -> Result<Response> {
        self.request(Method::POST, url, config).await
    }

    /// Send a request, retrying transport failures.
    ///
    /// Any HTTP status is returned as-is; classifying it is the caller's job.
    /// The timeout bounds the whole exchange, so streaming bodies should set
    /// a generous per-request override.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<Response> {
        let timeout = config.timeout.unwrap_or(self.config.timeout);
        let max_retries = self.config.max_retries;
        let mut attempt = 0;

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let mut req = self
                .client
                .request(method.clone(), url)
                .timeout(timeout);

            for (key, value) in &config.headers {
                req = req.header(key.as_str(), value.as_str());
            }

            if !config.query.is_empty() {
                req = req.query(&config.query);
            }

            req = match &config.auth {
                RequestAuth::None => req,
                RequestAuth::Bearer(credential) => credential.apply(req),
                RequestAuth::Forwarded(credential) => credential.forward(req),
            };

            match req.send().await {
                Ok(response) => {
                    debug!("{} {} -> {}", method, url, response.status().as_u16());
                    return Ok(response);
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < max_retries => {
                    let delay = self.calculate_backoff(attempt);
                    warn!(
                        "Transport error ({e}), attempt {}/{}, retrying in {:?}",
                        attempt + 1,
                        max_retries + 1,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(Error::Http(e)),
            }
        }
    }

    /// Check if pacing is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Exponential backoff for a transport retry, capped at `max_backoff`
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        std::cmp::min(
            self.config.initial_backoff.saturating_mul(factor),
            self.config.max_backoff,
        )
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}
