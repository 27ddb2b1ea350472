//! Transport for one streamed sync attempt

use crate::auth::Credential;
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

/// Route of the streaming sync endpoint
pub const SYNC_PATH: &str = "/api/bookmarks/sync";

/// Raw body chunks of one attempt, in arrival order
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Opens the progress stream for one attempt
#[async_trait]
pub trait SyncTransport: Send + Sync {
    /// Start an attempt and hand back its body
    async fn open(&self) -> Result<ByteStream>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// POSTs to the sync server, forwarding the caller's credential
#[derive(Debug)]
pub struct HttpSyncTransport {
    client: HttpClient,
    url: String,
    credential: Credential,
}

impl HttpSyncTransport {
    /// Create a transport from client config
    pub fn new(config: &ClientConfig, credential: Credential) -> Result<Self> {
        // The timeout bounds the whole streamed body, not just the headers
        let http = HttpClientConfig::builder()
            .timeout(config.timeout())
            .max_retries(0)
            .build();
        Ok(Self::with_client(
            HttpClient::with_config(http)?,
            &config.server_url,
            credential,
        ))
    }

    /// Create a transport over an existing client
    pub fn with_client(client: HttpClient, server_url: &str, credential: Credential) -> Self {
        Self {
            client,
            url: format!("{}{SYNC_PATH}", server_url.trim_end_matches('/')),
            credential,
        }
    }

    /// Full URL of the sync endpoint
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SyncTransport for HttpSyncTransport {
    async fn open(&self) -> Result<ByteStream> {
        let response = self
            .client
            .post(&self.url, RequestConfig::new().forwarded(&self.credential))
            .await
            .map_err(|e| Error::source_failure(None, format!("Sync request failed: {e}")))?;

        let status = response.status();
        debug!("Sync stream opened with HTTP {}", status.as_u16());

        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .map(|body| body.error)
                .unwrap_or_else(|_| format!("Sync request failed (HTTP {})", status.as_u16()));
            if status == StatusCode::UNAUTHORIZED {
                return Err(Error::unauthenticated(message));
            }
            return Err(Error::source_failure(Some(status.as_u16()), message));
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk.map_err(|e| Error::source_failure(None, format!("Sync stream interrupted: {e}")))
            })
            .boxed())
    }
}
