
use crate::errors::AppError;

pub const TWITCH_AUTH_URL: &str = "https://id.twitch.tv";
pub const TWITCH_API_URL: &str = "https://api.twitch.tv/helix";
pub const YOUTUBE_API_URL: &str = "https://www.googleapis.com/youtube/v3";
pub const FOURTHWALL_API_URL: &str = "https://storefront-api.fourthwall.com/v1";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Public origin of the site. Used for the OAuth redirect URI,
    /// post-login redirects and the CORS allow-list.
    pub site_url: String,
    /// Include raw upstream error detail in error bodies. Development only.
    pub debug_errors: bool,
    pub secure_cookies: bool,
    pub upstream: UpstreamConfig,
    pub media: MediaConfig,
    pub twitch: TwitchConfig,
    pub youtube: YouTubeConfig,
    pub storefront: StorefrontConfig,
}

#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    pub timeout_secs: u64,
    /// Retries on 5xx / network failures. 429 is never retried.
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

#[derive(Debug, Clone)]
pub struct MediaConfig {
    pub thumbnail_width: u32,
    pub thumbnail_height: u32,
    pub schedule_limit: usize,
    pub broadcast_limit: usize,
}

#[derive(Debug, Clone)]
pub struct TwitchConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub user_login: Option<String>,
    pub scopes: String,
    pub auth_url: String,
    pub api_url: String,
}

#[derive(Debug, Clone)]
pub struct YouTubeConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub max_results: u32,
    pub featured_channels: Vec<NamedRef>,
}

#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    pub token: Option<String>,
    pub api_url: String,
    pub checkout_domain: Option<String>,
    pub currency: String,
    pub collections: Vec<NamedRef>,
}

/// An `id:Display Name` pair, used for featured channels and collections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedRef {
    pub id: String,
    pub name: String,
}

impl Default for Config {
    /// Production upstreams, no credentials, development site URL.
    fn default() -> Self {
        Self {
            port: 3001,
            site_url: "http://localhost:3000".into(),
            debug_errors: false,
            secure_cookies: false,
            upstream: UpstreamConfig {
                timeout_secs: 10,
                max_retries: 2,
                base_backoff_ms: 200,
            },
            media: MediaConfig {
                thumbnail_width: 320,
                thumbnail_height: 180,
                schedule_limit: 3,
                broadcast_limit: 6,
            },
            twitch: TwitchConfig {
                client_id: None,
                client_secret: None,
                user_login: None,
                scopes: "user:read:email".into(),
                auth_url: TWITCH_AUTH_URL.into(),
                api_url: TWITCH_API_URL.into(),
            },
            youtube: YouTubeConfig {
                api_key: None,
                api_url: YOUTUBE_API_URL.into(),
                max_results: 12,
                featured_channels: Vec::new(),
            },
            storefront: StorefrontConfig {
                token: None,
                api_url: FOURTHWALL_API_URL.into(),
                checkout_domain: None,
                currency: "USD".into(),
                collections: Vec::new(),
            },
        }
    }
}

impl Config {
    /// Redirect URI registered with the streaming platform.
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/api/twitch/auth", self.site_url.trim_end_matches('/'))
    }
}

impl TwitchConfig {
    pub fn client_id(&self) -> Result<&str, AppError> {
        require(&self.client_id, "TWITCH_CLIENT_ID")
    }

    pub fn client_secret(&self) -> Result<&str, AppError> {
        require(&self.client_secret, "TWITCH_CLIENT_SECRET")
    }

    pub fn user_login(&self) -> Result<&str, AppError> {
        require(&self.user_login, "TWITCH_USER_LOGIN")
    }
}

impl YouTubeConfig {
    pub fn api_key(&self) -> Result<&str, AppError> {
        require(&self.api_key, "YOUTUBE_API_KEY")
    }
}

impl StorefrontConfig {
    pub fn token(&self) -> Result<&str, AppError> {
        require(&self.token, "FOURTHWALL_STOREFRONT_TOKEN")
    }
}

fn require<'a>(value: &'a Option<String>, name: &str) -> Result<&'a str, AppError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Configuration(format!("{} is not configured", name)))
}

pub fn load() -> anyhow::Result<Config> {
    dotenvy::dotenv().ok();

    let env_mode = std::env::var("FANSITE_ENV")
        .or_else(|_| std::env::var("RUST_ENV"))
        .unwrap_or_default();
    let production = env_mode == "production";

    let site_url = std::env::var("FANSITE_SITE_URL")
        .unwrap_or_else(|_| "http://localhost:3000".into());
    if production && site_url.starts_with("http://localhost") {
        anyhow::bail!(
            "FANSITE_SITE_URL still points at localhost. \
             Set the public site origin before running in production."
        );
    }

    let debug_errors = flag("FANSITE_DEBUG_ERRORS").unwrap_or(false);
    if production && debug_errors {
        eprintln!("⚠️  FANSITE_DEBUG_ERRORS is enabled in production: upstream error bodies will reach clients.");
    }

    Ok(Config {
        port: parsed("FANSITE_PORT").unwrap_or(3001),
        site_url,
        debug_errors,
        secure_cookies: flag("FANSITE_SECURE_COOKIES").unwrap_or(production),
        upstream: UpstreamConfig {
            timeout_secs: parsed("FANSITE_UPSTREAM_TIMEOUT_SECS").unwrap_or(10),
            max_retries: parsed("FANSITE_UPSTREAM_MAX_RETRIES").unwrap_or(2),
            base_backoff_ms: parsed("FANSITE_UPSTREAM_BACKOFF_MS").unwrap_or(200),
        },
        media: MediaConfig {
            thumbnail_width: parsed("FANSITE_THUMBNAIL_WIDTH").unwrap_or(320),
            thumbnail_height: parsed("FANSITE_THUMBNAIL_HEIGHT").unwrap_or(180),
            schedule_limit: parsed("FANSITE_SCHEDULE_LIMIT").unwrap_or(3),
            broadcast_limit: parsed("FANSITE_BROADCAST_LIMIT").unwrap_or(6),
        },
        twitch: TwitchConfig {
            client_id: std::env::var("TWITCH_CLIENT_ID").ok(),
            client_secret: std::env::var("TWITCH_CLIENT_SECRET").ok(),
            user_login: std::env::var("TWITCH_USER_LOGIN").ok(),
            scopes: std::env::var("TWITCH_SCOPES").unwrap_or_else(|_| "user:read:email".into()),
            auth_url: base_url("TWITCH_AUTH_URL", TWITCH_AUTH_URL),
            api_url: base_url("TWITCH_API_URL", TWITCH_API_URL),
        },
        youtube: YouTubeConfig {
            api_key: std::env::var("YOUTUBE_API_KEY").ok(),
            api_url: base_url("YOUTUBE_API_URL", YOUTUBE_API_URL),
            max_results: parsed("YOUTUBE_MAX_RESULTS").unwrap_or(12),
            featured_channels: parse_named_refs(
                &std::env::var("YOUTUBE_FEATURED_CHANNELS").unwrap_or_default(),
            ),
        },
        storefront: StorefrontConfig {
            token: std::env::var("FOURTHWALL_STOREFRONT_TOKEN").ok(),
            api_url: base_url("FOURTHWALL_API_URL", FOURTHWALL_API_URL),
            checkout_domain: std::env::var("FOURTHWALL_CHECKOUT_DOMAIN").ok(),
            currency: std::env::var("FOURTHWALL_CURRENCY").unwrap_or_else(|_| "USD".into()),
            collections: parse_named_refs(
                &std::env::var("FOURTHWALL_COLLECTIONS").unwrap_or_default(),
            ),
        },
    })
}

fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn flag(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn base_url(name: &str, default: &str) -> String {
    std::env::var(name)
        .unwrap_or_else(|_| default.into())
        .trim_end_matches('/')
        .to_string()
}

/// Parses `id:Name,id:Name`. Entries without a name use the id as the name.
pub fn parse_named_refs(raw: &str) -> Vec<NamedRef> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| match entry.split_once(':') {
            Some((id, name)) if !name.trim().is_empty() => NamedRef {
                id: id.trim().to_string(),
                name: name.trim().to_string(),
            },
            Some((id, _)) => NamedRef {
                id: id.trim().to_string(),
                name: id.trim().to_string(),
            },
            None => NamedRef {
                id: entry.to_string(),
                name: entry.to_string(),
            },
        })
        .filter(|r| !r.id.is_empty())
        .collect()
}
