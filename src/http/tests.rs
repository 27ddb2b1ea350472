//! Tests for the HTTP client module

use super::*;
use crate::auth::Credential;
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client() -> HttpClient {
    HttpClient::with_config(HttpClientConfig::default()).unwrap()
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_retries, 2);
    assert!(config.rate_limit.is_none());
    assert!(config.user_agent.starts_with("bookmark-sync/"));
}

#[test]
fn test_http_client_config_builder() {
    let config = HttpClientConfig::builder()
        .timeout(Duration::from_secs(60))
        .max_retries(5)
        .backoff(Duration::from_millis(200), Duration::from_secs(30))
        .rate_limit(RateLimiterConfig::per_minute(15))
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.initial_backoff, Duration::from_millis(200));
    assert_eq!(config.max_backoff, Duration::from_secs(30));
    assert_eq!(config.rate_limit, Some(RateLimiterConfig::per_minute(15)));
    assert_eq!(config.user_agent, "test-agent/1.0");
}

#[test]
fn test_request_config_builder() {
    let credential = Credential::new("tok", "1");
    let config = RequestConfig::new()
        .query("max_results", "100")
        .query("pagination_token", "abc")
        .header("X-Request-Id", "abc123")
        .bearer(&credential)
        .timeout(Duration::from_secs(10));

    assert_eq!(config.query.len(), 2);
    assert_eq!(config.query[0], ("max_results".to_string(), "100".to_string()));
    assert_eq!(config.headers.len(), 1);
    assert!(matches!(config.auth, RequestAuth::Bearer(_)));
    assert_eq!(config.timeout, Some(Duration::from_secs(10)));
}

#[tokio::test]
async fn test_get_with_query_and_bearer() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/1/bookmarks"))
        .and(query_param("max_results", "100"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let credential = Credential::new("tok", "1");
    let response = client()
        .get(
            &format!("{}/users/1/bookmarks", mock_server.uri()),
            RequestConfig::new()
                .query("max_results", "100")
                .bearer(&credential),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_post_forwards_credential() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/bookmarks/sync"))
        .and(header("Authorization", "Bearer tok"))
        .and(header("x-user-id", "42"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let credential = Credential::new("tok", "42");
    let response = client()
        .post(
            &format!("{}/api/bookmarks/sync", mock_server.uri()),
            RequestConfig::new().forwarded(&credential),
        )
        .await
        .unwrap();

    assert!(response.status().is_success());
}

#[tokio::test]
async fn test_status_is_returned_not_retried() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&mock_server)
        .await;

    let response = client()
        .get(&format!("{}/limited", mock_server.uri()), RequestConfig::new())
        .await
        .unwrap();

    assert_eq!(response.status(), 429);
}

#[tokio::test]
async fn test_connect_error_after_retries() {
    let config = HttpClientConfig::builder()
        .max_retries(1)
        .backoff(Duration::from_millis(1), Duration::from_millis(1))
        .build();
    let client = HttpClient::with_config(config).unwrap();

    // Port 9 (discard) is closed on test machines
    let result = client.get("http://127.0.0.1:9/", RequestConfig::new()).await;
    assert!(matches!(result, Err(crate::error::Error::Http(_))));
}

#[test]
fn test_calculate_backoff() {
    let config = HttpClientConfig::builder()
        .backoff(Duration::from_millis(100), Duration::from_millis(500))
        .build();
    let client = HttpClient::with_config(config).unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_millis(100));
    assert_eq!(client.calculate_backoff(1), Duration::from_millis(200));
    assert_eq!(client.calculate_backoff(2), Duration::from_millis(400));
    assert_eq!(client.calculate_backoff(3), Duration::from_millis(500));
    assert_eq!(client.calculate_backoff(40), Duration::from_millis(500));
}

#[test]
fn test_http_client_debug() {
    let client = client();
    let debug = format!("{client:?}");
    assert!(debug.contains("HttpClient"));
    assert!(debug.contains("has_rate_limiter"));
}

#[tokio::test]
async fn test_http_client_with_rate_limiter() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/paced"))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .rate_limit(RateLimiterConfig::per_minute(60))
        .build();
    let client = HttpClient::with_config(config).unwrap();
    assert!(client.has_rate_limiter());

    let url = format!("{}/paced", mock_server.uri());
    client.get(&url, RequestConfig::new()).await.unwrap();
    client.get(&url, RequestConfig::new()).await.unwrap();
}
