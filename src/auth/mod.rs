//! Authentication module
//!
//! The authorization handshake happens elsewhere; this module only carries
//! the resulting bearer credential and pulls it out of incoming requests.
//!
//! Two request shapes are accepted:
//! - browser cookies: `access_token` plus a URL-encoded JSON `user_session`
//! - API headers: `Authorization: Bearer <token>` plus `X-User-Id`

mod credential;

pub use credential::{Credential, ACCESS_TOKEN_COOKIE, SESSION_COOKIE, USER_ID_HEADER};
