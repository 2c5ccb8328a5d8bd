//! Streaming-platform credential provider.
//!
//! Two credential classes:
//! - application token: client-credentials grant, re-issued on every call;
//! - user token: authorization-code grant, kept in the session store and
//!   renewed with the refresh-token grant when the access half is missing.

use std::sync::Arc;

use reqwest::StatusCode;
use url::Url;

use super::session::SessionTokenStore;
use super::token::{TokenPair, TokenResponse};
use crate::config::Config;
use crate::errors::AppError;
use crate::upstream::{endpoint, UpstreamClient, UpstreamRequest};

const SERVICE: &str = "twitch";

#[derive(Clone)]
pub struct TokenProvider {
    config: Arc<Config>,
    upstream: UpstreamClient,
}

impl TokenProvider {
    pub fn new(config: Arc<Config>, upstream: UpstreamClient) -> Self {
        Self { config, upstream }
    }

    /// Application-scoped token for public data. Never cached.
    pub async fn app_token(&self) -> Result<String, AppError> {
        let twitch = &self.config.twitch;
        let pair = self
            .token_grant(&[
                ("client_id", twitch.client_id()?),
                ("client_secret", twitch.client_secret()?),
                ("grant_type", "client_credentials"),
            ])
            .await?;
        Ok(pair.access_token.clone())
    }

    /// User token from the session, refreshing it if only the refresh half
    /// is present. `None` means "public data only".
    ///
    /// A rejected refresh clears the stored pair so the next request does not
    /// retry it, and is reported to the caller as `None`.
    pub async fn user_token(
        &self,
        store: &dyn SessionTokenStore,
    ) -> Result<Option<String>, AppError> {
        let stored = store.get().await;

        if let Some(access) = stored.access() {
            return Ok(Some(access.to_string()));
        }

        let Some(refresh) = stored.refresh() else {
            return Ok(None);
        };

        match self.refresh_user_token(store, refresh).await {
            Ok(access) => Ok(Some(access)),
            Err(AppError::TokenRefresh(reason)) => {
                tracing::warn!("user token refresh rejected, session cleared: {}", reason);
                Ok(None)
            }
            Err(e) if e.is_rate_limited() => Err(e),
            Err(e) => {
                // Transient: keep the refresh token for the next request.
                tracing::warn!("user token refresh failed, continuing without it: {}", e);
                Ok(None)
            }
        }
    }

    /// Refresh-token grant. Persists the new pair on success; clears the store
    /// and returns `TokenRefresh` when the platform rejects the refresh token.
    pub async fn refresh_user_token(
        &self,
        store: &dyn SessionTokenStore,
        refresh_token: &str,
    ) -> Result<String, AppError> {
        let twitch = &self.config.twitch;
        let result = self
            .token_grant(&[
                ("client_id", twitch.client_id()?),
                ("client_secret", twitch.client_secret()?),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await;

        match result {
            Ok(pair) => {
                store.set(&pair).await;
                tracing::info!(expires_in = ?pair.expires_in, "user token refreshed");
                Ok(pair.access_token.clone())
            }
            Err(AppError::UpstreamAuth { status, body }) if is_rejection(status) => {
                store.clear().await;
                Err(AppError::TokenRefresh(format!("{}: {}", status, body)))
            }
            Err(e) => Err(e),
        }
    }

    /// Revoke a user token upstream. Does not touch the session store.
    pub async fn revoke_user_token(&self, token: &str) -> bool {
        let client_id = match self.config.twitch.client_id() {
            Ok(id) => id,
            Err(e) => {
                tracing::error!("cannot revoke token: {}", e);
                return false;
            }
        };
        let url = match endpoint(&self.config.twitch.auth_url, "oauth2/revoke", &[]) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("cannot revoke token: {}", e);
                return false;
            }
        };

        let req = UpstreamRequest::post(SERVICE, url)
            .form(&[("client_id", client_id), ("token", token)]);
        match self.upstream.send(req).await {
            Ok(resp) if resp.status.is_success() => true,
            Ok(resp) => {
                tracing::warn!(status = %resp.status, "token revoke rejected: {}", resp.body_snippet());
                false
            }
            Err(e) => {
                tracing::warn!("token revoke failed: {}", e);
                false
            }
        }
    }

    /// Revoke the session's access token (if any) and clear the stored pair.
    /// Returns whether a token was revoked upstream.
    pub async fn sign_out(&self, store: &dyn SessionTokenStore) -> bool {
        let stored = store.get().await;
        let revoked = match stored.access() {
            Some(token) => self.revoke_user_token(token).await,
            None => false,
        };
        store.clear().await;
        tracing::info!(revoked, "user session cleared");
        revoked
    }

    /// Authorization-code grant for the OAuth callback. Persists the pair.
    pub async fn exchange_code(
        &self,
        code: &str,
        store: &dyn SessionTokenStore,
    ) -> Result<(), AppError> {
        let twitch = &self.config.twitch;
        let redirect_uri = self.config.oauth_redirect_uri();
        let pair = self
            .token_grant(&[
                ("client_id", twitch.client_id()?),
                ("client_secret", twitch.client_secret()?),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .await?;
        store.set(&pair).await;
        tracing::info!(expires_in = ?pair.expires_in, "user token issued from authorization code");
        Ok(())
    }

    /// Platform authorize URL the login endpoint redirects to.
    pub fn authorize_url(&self, state: &str) -> Result<Url, AppError> {
        let twitch = &self.config.twitch;
        let redirect_uri = self.config.oauth_redirect_uri();
        endpoint(
            &twitch.auth_url,
            "oauth2/authorize",
            &[
                ("client_id", twitch.client_id()?),
                ("redirect_uri", redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", twitch.scopes.as_str()),
                ("state", state),
            ],
        )
    }

    async fn token_grant(&self, fields: &[(&str, &str)]) -> Result<TokenPair, AppError> {
        let url = endpoint(&self.config.twitch.auth_url, "oauth2/token", &[])?;
        let grant = fields
            .iter()
            .find(|(k, _)| *k == "grant_type")
            .map(|(_, v)| *v)
            .unwrap_or("unknown");

        let resp = self
            .upstream
            .send(UpstreamRequest::post(SERVICE, url).form(fields))
            .await?;

        if resp.status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AppError::RateLimited {
                service: SERVICE.to_string(),
                retry_after: resp.retry_after,
            });
        }
        if !resp.status.is_success() {
            tracing::warn!(grant, status = %resp.status, "token endpoint rejected grant");
            return Err(AppError::UpstreamAuth {
                status: resp.status.as_u16(),
                body: resp.body_snippet(),
            });
        }

        let token: TokenResponse = serde_json::from_slice(&resp.body).map_err(|e| AppError::UpstreamAuth {
            status: resp.status.as_u16(),
            body: format!("malformed token response: {}", e),
        })?;
        Ok(token.into())
    }
}

/// A 4xx from the token endpoint means the refresh token itself is bad.
fn is_rejection(status: u16) -> bool {
    (400..500).contains(&status) && status != 429
}
