//! Saved-items endpoint of the upstream API

use super::types::{Page, PageOutcome, PageSource, RawPage};
use crate::auth::Credential;
use crate::config::SourceConfig;
use crate::error::Result;
use crate::http::{HttpClient, HttpClientConfig, RateLimiterConfig, RequestConfig};
use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, warn};

const TWEET_FIELDS: &str = "created_at,author_id,text";
const EXPANSIONS: &str = "author_id";
const USER_FIELDS: &str = "name,username";

/// Reads `GET {base}/users/{id}/bookmarks`
#[derive(Debug)]
pub struct BookmarksSource {
    client: HttpClient,
    base_url: String,
    page_size: u32,
}

impl BookmarksSource {
    /// Create a source from config
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let mut http = HttpClientConfig::builder().timeout(config.timeout());
        if let Some(rpm) = config.requests_per_minute {
            http = http.rate_limit(RateLimiterConfig::per_minute(rpm));
        }
        Ok(Self::with_client(
            HttpClient::with_config(http.build())?,
            &config.base_url,
            config.page_size,
        ))
    }

    /// Create a source over an existing client
    pub fn with_client(client: HttpClient, base_url: &str, page_size: u32) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size,
        }
    }

    fn url_for(&self, credential: &Credential) -> String {
        format!(
            "{}/users/{}/bookmarks",
            self.base_url,
            urlencoding::encode(credential.user_id())
        )
    }

    fn request_for(&self, credential: &Credential, cursor: Option<&str>) -> RequestConfig {
        let mut config = RequestConfig::new()
            .query("tweet.fields", TWEET_FIELDS)
            .query("expansions", EXPANSIONS)
            .query("user.fields", USER_FIELDS)
            .query("max_results", self.page_size.to_string())
            .bearer(credential);
        if let Some(cursor) = cursor {
            config = config.query("pagination_token", cursor);
        }
        config
    }
}

#[async_trait]
impl PageSource for BookmarksSource {
    async fn fetch_page(&self, credential: &Credential, cursor: Option<&str>) -> PageOutcome {
        let url = self.url_for(credential);
        let response = match self
            .client
            .get(&url, self.request_for(credential, cursor))
            .await
        {
            Ok(r) => r,
            Err(e) => return PageOutcome::failure(None, e.to_string()),
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Source rate limited the walk");
            return PageOutcome::RateLimited;
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Bookmarks fetch failed: {} {}", status.as_u16(), body);
            return PageOutcome::failure(Some(status.as_u16()), "Failed to fetch bookmarks");
        }

        match response.json::<RawPage>().await {
            Ok(raw) => {
                let page = Page::from(raw);
                debug!(
                    "Fetched page: {} items, {} authors, more: {}",
                    page.items.len(),
                    page.authors.len(),
                    page.next_cursor.is_some()
                );
                PageOutcome::Page(page)
            }
            Err(e) => {
                PageOutcome::failure(None, format!("Failed to decode bookmarks page: {e}"))
            }
        }
    }
}
