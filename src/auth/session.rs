//! Cookie-carried session
//!
//! Each request gets a [`Session`] handle seeded from the session cookie.
//! Handlers and middleware mutate it; [`session_middleware`] writes the final
//! state back as a `Set-Cookie` header once the response is built.

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts, Request},
    http::{
        header::{COOKIE, SET_COOKIE},
        request::Parts,
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use cookie::{time::Duration as CookieDuration, Cookie, CookieBuilder, SameSite};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error};

use crate::common::{ApiError, AppState};

pub const OAUTH_STATE_COOKIE: &str = "oauth_state";
const OAUTH_STATE_PATH: &str = "/signup/google";
const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;

/// Attributes shared by every cookie the service emits
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
    pub max_age: chrono::Duration,
}

impl CookieSettings {
    fn builder<'c>(&self, name: &'c str, value: &'c str, path: &'c str) -> CookieBuilder<'c> {
        Cookie::build((name, value))
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(self.secure)
            .path(path)
    }

    pub fn set_cookie(&self, token: &str) -> String {
        self.builder(&self.name, token, "/")
            .max_age(CookieDuration::seconds(self.max_age.num_seconds().max(0)))
            .build()
            .to_string()
    }

    pub fn clear_cookie(&self) -> String {
        self.builder(&self.name, "", "/").removal().build().to_string()
    }

    pub fn oauth_state_cookie(&self, state: &str) -> String {
        self.builder(OAUTH_STATE_COOKIE, state, OAUTH_STATE_PATH)
            .max_age(CookieDuration::seconds(OAUTH_STATE_MAX_AGE_SECS))
            .build()
            .to_string()
    }

    pub fn clear_oauth_state_cookie(&self) -> String {
        self.builder(OAUTH_STATE_COOKIE, "", OAUTH_STATE_PATH)
            .removal()
            .build()
            .to_string()
    }
}

#[derive(Debug, Default)]
struct SessionInner {
    token: Option<String>,
    dirty: bool,
}

/// Per-request session handle; clones share the same state
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    pub fn new(token: Option<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                token,
                dirty: false,
            })),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.inner.lock().token.clone()
    }

    pub fn set_token(&self, token: String) {
        let mut inner = self.inner.lock();
        inner.token = Some(token);
        inner.dirty = true;
    }

    /// Drops the token. A no-op when none is present.
    pub fn clear_token(&self) {
        let mut inner = self.inner.lock();
        if inner.token.take().is_some() {
            inner.dirty = true;
        }
    }

    /// Returns the pending cookie change, if any, and resets the dirty flag
    pub fn take_change(&self) -> Option<Option<String>> {
        let mut inner = self.inner.lock();
        if inner.dirty {
            inner.dirty = false;
            Some(inner.token.clone())
        } else {
            None
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or_else(|| ApiError::InternalServer("missing session layer".to_string()))
    }
}

/// Reads a single cookie value out of the `Cookie` headers
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value().to_string())
        .filter(|value| !value.is_empty())
}

/// Seeds a [`Session`] from the request cookie and persists changes on the way out
pub async fn session_middleware(
    Extension(state): Extension<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    let token = parse_cookie(request.headers(), &state.cookies.name);
    let session = Session::new(token);
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    if let Some(change) = session.take_change() {
        let header = match &change {
            Some(token) => state.cookies.set_cookie(token),
            None => state.cookies.clear_cookie(),
        };
        match HeaderValue::from_str(&header) {
            Ok(value) => {
                debug!(cleared = change.is_none(), "Writing session cookie");
                response.headers_mut().append(SET_COOKIE, value);
            }
            Err(e) => error!(error = %e, "Session cookie is not a valid header value"),
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> CookieSettings {
        CookieSettings {
            name: "session".to_string(),
            secure: true,
            max_age: chrono::Duration::minutes(30),
        }
    }

    #[test]
    fn test_parse_cookie_picks_named_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; session=abc.def.ghi; other=1"),
        );

        assert_eq!(
            parse_cookie(&headers, "session").as_deref(),
            Some("abc.def.ghi")
        );
        assert_eq!(parse_cookie(&headers, "missing"), None);
    }

    #[test]
    fn test_parse_cookie_ignores_empty_value() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("session="));
        assert_eq!(parse_cookie(&headers, "session"), None);
    }

    #[test]
    fn test_set_and_clear_cookie_attributes() {
        let cookies = settings();

        let set = cookies.set_cookie("tok");
        assert!(set.starts_with("session=tok;"));
        assert!(set.contains("Max-Age=1800"));
        assert!(set.contains("HttpOnly"));
        assert!(set.contains("Secure"));

        let cleared = cookies.clear_cookie();
        assert!(cleared.starts_with("session=;"));
        assert!(cleared.contains("Max-Age=0"));
    }

    #[test]
    fn test_oauth_state_cookie_is_scoped_to_google_routes() {
        let cookies = settings();

        let set = cookies.oauth_state_cookie("xyz");
        assert!(set.starts_with("oauth_state=xyz;"));
        assert!(set.contains("Path=/signup/google"));
        assert!(set.contains("Max-Age=600"));

        let cleared = cookies.clear_oauth_state_cookie();
        assert!(cleared.starts_with("oauth_state=;"));
        assert!(cleared.contains("Path=/signup/google"));
        assert!(cleared.contains("Max-Age=0"));
    }

    #[test]
    fn test_parse_cookie_skips_malformed_pairs() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("junk; theme=dark"));
        headers.append(COOKIE, HeaderValue::from_static("session=tok"));

        assert_eq!(parse_cookie(&headers, "session").as_deref(), Some("tok"));
        assert_eq!(parse_cookie(&headers, "theme").as_deref(), Some("dark"));
    }

    #[test]
    fn test_clear_token_is_idempotent() {
        let session = Session::new(None);
        session.clear_token();
        assert_eq!(session.take_change(), None);

        let session = Session::new(Some("tok".to_string()));
        session.clear_token();
        session.clear_token();
        assert_eq!(session.take_change(), Some(None));
        assert_eq!(session.take_change(), None);
    }

    #[test]
    fn test_clones_share_state() {
        let session = Session::new(None);
        let handle = session.clone();
        handle.set_token("fresh".to_string());

        assert_eq!(session.token().as_deref(), Some("fresh"));
        assert_eq!(session.take_change(), Some(Some("fresh".to_string())));
    }
}
