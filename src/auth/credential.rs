//! Bearer credential and request extraction

use crate::error::{Error, Result};
use reqwest::header::{HeaderMap, AUTHORIZATION, COOKIE};
use reqwest::RequestBuilder;
use serde::Deserialize;

/// Cookie holding the bearer token
pub const ACCESS_TOKEN_COOKIE: &str = "access_token";

/// Cookie holding the URL-encoded session JSON
pub const SESSION_COOKIE: &str = "user_session";

/// Header naming the user when the token arrives as a bearer header
pub const USER_ID_HEADER: &str = "x-user-id";

/// An opaque bearer token and the user it belongs to
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    token: String,
    user_id: String,
}

#[derive(Deserialize)]
struct Session {
    data: Option<SessionUser>,
}

#[derive(Deserialize)]
struct SessionUser {
    id: Option<String>,
}

impl Credential {
    /// Create a credential from a token and user id
    pub fn new(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            user_id: user_id.into(),
        }
    }

    /// The bearer token
    pub fn token(&self) -> &str {
        &self.token
    }

    /// The user whose collection is synced
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Attach the token to an outgoing request
    pub fn apply(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.token)
    }

    /// Attach the token and user id for a request to our own server
    pub fn forward(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.token)
            .header(USER_ID_HEADER, &self.user_id)
    }

    /// Extract a credential from request headers.
    ///
    /// Cookies win over the `Authorization` header when both are present.
    pub fn from_headers(headers: &HeaderMap) -> Result<Self> {
        let cookies = parse_cookies(headers);

        if let Some(token) = find_cookie(&cookies, ACCESS_TOKEN_COOKIE) {
            let session = find_cookie(&cookies, SESSION_COOKIE)
                .ok_or_else(|| Error::unauthenticated("No session"))?;
            let user_id = user_id_from_session(session)?;
            return Ok(Self::new(token, user_id));
        }

        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::unauthenticated("Not authenticated"))?;

        let user_id = headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::unauthenticated("No session"))?;

        Ok(Self::new(token, user_id))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("user_id", &self.user_id)
            .finish()
    }
}

/// Split every `Cookie` header into name/value pairs
fn parse_cookies(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            Some((name.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn find_cookie<'a>(cookies: &'a [(String, String)], name: &str) -> Option<&'a str> {
    cookies
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

/// Decode `user_session` (URL-encoded JSON) down to `data.id`
fn user_id_from_session(raw: &str) -> Result<String> {
    let invalid = || Error::unauthenticated("Invalid session");
    let decoded = urlencoding::decode(raw).map_err(|_| invalid())?;
    let session: Session = serde_json::from_str(&decoded).map_err(|_| invalid())?;
    session
        .data
        .and_then(|d| d.id)
        .filter(|id| !id.is_empty())
        .ok_or_else(invalid)
}
