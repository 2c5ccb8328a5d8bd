//! Fansite gateway: token lifecycle and multi-platform aggregation behind a
//! small JSON API for the creator homepage.

pub mod aggregate;
pub mod api;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod models;
pub mod upstream;

use std::sync::Arc;

use axum::http::HeaderMap;

use aggregate::{ChannelAggregator, StorefrontAggregator, VideoAggregator};
use config::Config;
use credentials::{CookieSessionStore, TokenProvider};
use upstream::UpstreamClient;

/// Shared application state passed to handlers.
pub struct AppState {
    pub config: Arc<Config>,
    pub tokens: TokenProvider,
    pub channel: ChannelAggregator,
    pub videos: VideoAggregator,
    pub storefront: StorefrontAggregator,
}

impl AppState {
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        let upstream = UpstreamClient::new(&config.upstream)?;
        let tokens = TokenProvider::new(config.clone(), upstream.clone());

        Ok(Self {
            channel: ChannelAggregator::new(config.clone(), tokens.clone(), upstream.clone()),
            videos: VideoAggregator::new(config.clone(), upstream.clone()),
            storefront: StorefrontAggregator::new(config.clone(), upstream),
            tokens,
            config,
        })
    }

    /// Cookie-backed session for one inbound request.
    pub fn session(&self, headers: &HeaderMap) -> CookieSessionStore {
        CookieSessionStore::from_headers(headers, self.config.secure_cookies)
    }
}
