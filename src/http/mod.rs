//! HTTP client module
//!
//! Thin wrapper over `reqwest` shared by the upstream source and the sync
//! client.
//!
//! # Features
//!
//! - **Transport Retries**: connect failures and timeouts are retried with
//!   exponential backoff; HTTP statuses are left to the caller to classify
//! - **Pacing**: optional token bucket in front of every request (governor)
//! - **Credentials**: bearer auth or credential forwarding per request

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, RequestAuth, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
