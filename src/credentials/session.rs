//! Per-session persistence of the user token pair.
//!
//! The HTTP surface keeps the pair in two HTTP-only cookies; tests and the
//! CLI use an in-memory store. The credential provider only sees the trait.

use async_trait::async_trait;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use cookie::time::Duration as CookieDuration;
use cookie::{Cookie, SameSite};
use std::sync::Mutex;

use super::token::{StoredTokens, TokenPair};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const OAUTH_STATE_COOKIE: &str = "oauthState";

/// Lifetime of the CSRF state cookie set by the login redirect.
const OAUTH_STATE_MAX_AGE_SECS: i64 = 600;

#[async_trait]
pub trait SessionTokenStore: Send + Sync {
    async fn get(&self) -> StoredTokens;
    async fn set(&self, pair: &TokenPair);
    async fn clear(&self);
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ── In-memory ───────────────────────────────────────────────

/// Process-local store. Records the expiry of the last access token written.
#[derive(Default)]
pub struct MemorySessionStore {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    tokens: StoredTokens,
    access_expires_in: Option<u64>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(access_token: Option<&str>, refresh_token: Option<&str>) -> Self {
        let store = Self::default();
        {
            let mut state = lock(&store.inner);
            state.tokens.access_token = access_token.map(String::from);
            state.tokens.refresh_token = refresh_token.map(String::from);
        }
        store
    }

    pub fn snapshot(&self) -> StoredTokens {
        lock(&self.inner).tokens.clone()
    }

    pub fn access_expires_in(&self) -> Option<u64> {
        lock(&self.inner).access_expires_in
    }
}

#[async_trait]
impl SessionTokenStore for MemorySessionStore {
    async fn get(&self) -> StoredTokens {
        self.snapshot()
    }

    async fn set(&self, pair: &TokenPair) {
        let mut state = lock(&self.inner);
        state.tokens.access_token = Some(pair.access_token.clone());
        if let Some(refresh) = &pair.refresh_token {
            state.tokens.refresh_token = Some(refresh.clone());
        }
        state.access_expires_in = pair.expires_in;
    }

    async fn clear(&self) {
        let mut state = lock(&self.inner);
        state.tokens = StoredTokens::default();
        state.access_expires_in = None;
    }
}

// ── Cookies ─────────────────────────────────────────────────

/// Cookie-backed store for one HTTP request.
///
/// Reads the pair from the request's `Cookie` headers once; writes are queued
/// as `Set-Cookie` values and attached to the response with [`apply`].
///
/// [`apply`]: CookieSessionStore::apply
pub struct CookieSessionStore {
    secure: bool,
    inner: Mutex<CookieState>,
}

struct CookieState {
    tokens: StoredTokens,
    oauth_state: Option<String>,
    pending: Vec<Cookie<'static>>,
}

impl CookieSessionStore {
    pub fn from_headers(headers: &HeaderMap, secure: bool) -> Self {
        let mut tokens = StoredTokens::default();
        let mut oauth_state = None;

        for raw in headers.get_all(header::COOKIE) {
            let Ok(raw) = raw.to_str() else { continue };
            for cookie in Cookie::split_parse(raw).flatten() {
                match cookie.name() {
                    ACCESS_COOKIE => tokens.access_token = Some(cookie.value().to_string()),
                    REFRESH_COOKIE => tokens.refresh_token = Some(cookie.value().to_string()),
                    OAUTH_STATE_COOKIE => oauth_state = Some(cookie.value().to_string()),
                    _ => {}
                }
            }
        }

        Self {
            secure,
            inner: Mutex::new(CookieState {
                tokens,
                oauth_state,
                pending: Vec::new(),
            }),
        }
    }

    fn cookie(&self, name: &'static str, value: String) -> cookie::CookieBuilder<'static> {
        Cookie::build((name, value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
    }

    fn removal(&self, name: &'static str) -> Cookie<'static> {
        let mut cookie = self.cookie(name, String::new()).build();
        cookie.make_removal();
        cookie
    }

    /// CSRF state presented by the browser, if the login redirect set one.
    pub fn oauth_state(&self) -> Option<String> {
        lock(&self.inner).oauth_state.clone()
    }

    pub fn set_oauth_state(&self, value: &str) {
        let cookie = self
            .cookie(OAUTH_STATE_COOKIE, value.to_string())
            .max_age(CookieDuration::seconds(OAUTH_STATE_MAX_AGE_SECS))
            .build();
        let mut state = lock(&self.inner);
        state.oauth_state = Some(value.to_string());
        state.pending.push(cookie);
    }

    pub fn clear_oauth_state(&self) {
        let cookie = self.removal(OAUTH_STATE_COOKIE);
        let mut state = lock(&self.inner);
        state.oauth_state = None;
        state.pending.push(cookie);
    }

    /// Queued `Set-Cookie` header values, in write order.
    pub fn set_cookie_headers(&self) -> Vec<HeaderValue> {
        lock(&self.inner)
            .pending
            .iter()
            .filter_map(|c| HeaderValue::from_str(&c.to_string()).ok())
            .collect()
    }

    /// Attach queued cookie writes to an outgoing response.
    pub fn apply(&self, mut response: Response) -> Response {
        for value in self.set_cookie_headers() {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
        response
    }
}

#[async_trait]
impl SessionTokenStore for CookieSessionStore {
    async fn get(&self) -> StoredTokens {
        lock(&self.inner).tokens.clone()
    }

    async fn set(&self, pair: &TokenPair) {
        let mut access = self.cookie(ACCESS_COOKIE, pair.access_token.clone());
        if let Some(secs) = pair.expires_in {
            access = access.max_age(CookieDuration::seconds(secs.min(i64::MAX as u64) as i64));
        }
        let access = access.build();
        let mut state = lock(&self.inner);
        state.tokens.access_token = Some(pair.access_token.clone());
        state.pending.push(access);
        if let Some(refresh) = &pair.refresh_token {
            state.tokens.refresh_token = Some(refresh.clone());
            state
                .pending
                .push(self.cookie(REFRESH_COOKIE, refresh.clone()).build());
        }
    }

    async fn clear(&self) {
        let access = self.removal(ACCESS_COOKIE);
        let refresh = self.removal(REFRESH_COOKIE);
        let mut state = lock(&self.inner);
        state.tokens = StoredTokens::default();
        state.pending.push(access);
        state.pending.push(refresh);
    }
}
