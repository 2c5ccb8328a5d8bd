use serde::Deserialize;
use zeroize::Zeroize;

/// Token pair issued by the streaming platform's token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Access token validity in seconds from issue.
    pub expires_in: Option<u64>,
}

/// What the session currently holds. Either half may be missing.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct StoredTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// Body of `POST /oauth2/token` for every grant type we use.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

impl From<TokenResponse> for TokenPair {
    fn from(mut resp: TokenResponse) -> Self {
        Self {
            access_token: std::mem::take(&mut resp.access_token),
            refresh_token: resp.refresh_token.take(),
            expires_in: resp.expires_in,
        }
    }
}

impl StoredTokens {
    pub fn access(&self) -> Option<&str> {
        non_empty(&self.access_token)
    }

    pub fn refresh(&self) -> Option<&str> {
        non_empty(&self.refresh_token)
    }

    pub fn is_empty(&self) -> bool {
        self.access().is_none() && self.refresh().is_none()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

// Secrets never reach logs through Debug.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "[REDACTED]"))
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl std::fmt::Debug for StoredTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredTokens")
            .field("access_token", &self.access().map(|_| "[REDACTED]"))
            .field("refresh_token", &self.refresh().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Drop for TokenPair {
    fn drop(&mut self) {
        self.access_token.zeroize();
        self.refresh_token.zeroize();
    }
}

impl Drop for StoredTokens {
    fn drop(&mut self) {
        self.access_token.zeroize();
        self.refresh_token.zeroize();
    }
}

impl Drop for TokenResponse {
    fn drop(&mut self) {
        self.access_token.zeroize();
        self.refresh_token.zeroize();
    }
}
