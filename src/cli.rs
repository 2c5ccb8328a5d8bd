use clap::{Parser, Subcommand};
use serde_json::Value;

use crate::aggregate::Sections;
use crate::config::{Config, NamedRef};
use crate::credentials::MemorySessionStore;
use crate::AppState;

/// Fansite gateway: creator homepage data API
#[derive(Parser)]
#[command(name = "fansite", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the gateway server
    Serve {
        /// Port to bind (defaults to FANSITE_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Show the effective configuration with secrets masked
    Config,

    /// Run one aggregation against the live upstreams and print the JSON
    Fetch {
        #[command(subcommand)]
        target: FetchTarget,
    },
}

#[derive(Subcommand)]
pub enum FetchTarget {
    /// Channel overview
    Overview {
        /// Comma-separated sections: stream,user,broadcasts,schedule
        #[arg(long)]
        include: Option<String>,
    },
    /// Latest uploads of a channel
    Videos { channel_id: String },
    /// Latest upload of each featured channel
    Featured,
    /// Storefront products
    Merch {
        #[arg(long)]
        collection: Option<String>,
    },
    /// Configured collections
    Collections,
    /// A single product
    Product { slug: String },
}

/// Run a fetch with an empty in-memory session (public data only).
pub async fn run_fetch(state: &AppState, target: FetchTarget) -> anyhow::Result<Value> {
    let value = match target {
        FetchTarget::Overview { include } => {
            let sections = Sections::parse(include.as_deref())?;
            let session = MemorySessionStore::new();
            serde_json::to_value(state.channel.overview(sections, &session).await?)?
        }
        FetchTarget::Videos { channel_id } => {
            serde_json::to_value(state.videos.channel_videos(&channel_id).await?)?
        }
        FetchTarget::Featured => serde_json::to_value(state.videos.featured().await?)?,
        FetchTarget::Merch { collection } => {
            serde_json::to_value(state.storefront.products(collection.as_deref()).await?)?
        }
        FetchTarget::Collections => serde_json::to_value(state.storefront.collections().await?)?,
        FetchTarget::Product { slug } => {
            serde_json::to_value(state.storefront.product(&slug).await?)?
        }
    };
    Ok(value)
}

/// `(name, value)` rows for the `config` command.
pub fn describe_config(cfg: &Config) -> Vec<(&'static str, String)> {
    vec![
        ("FANSITE_PORT", cfg.port.to_string()),
        ("FANSITE_SITE_URL", cfg.site_url.clone()),
        ("FANSITE_DEBUG_ERRORS", cfg.debug_errors.to_string()),
        ("FANSITE_SECURE_COOKIES", cfg.secure_cookies.to_string()),
        ("FANSITE_UPSTREAM_TIMEOUT_SECS", cfg.upstream.timeout_secs.to_string()),
        ("FANSITE_UPSTREAM_MAX_RETRIES", cfg.upstream.max_retries.to_string()),
        ("TWITCH_CLIENT_ID", mask(cfg.twitch.client_id.as_deref())),
        ("TWITCH_CLIENT_SECRET", mask(cfg.twitch.client_secret.as_deref())),
        ("TWITCH_USER_LOGIN", plain(cfg.twitch.user_login.as_deref())),
        ("TWITCH_API_URL", cfg.twitch.api_url.clone()),
        ("YOUTUBE_API_KEY", mask(cfg.youtube.api_key.as_deref())),
        ("YOUTUBE_FEATURED_CHANNELS", join_refs(&cfg.youtube.featured_channels)),
        ("FOURTHWALL_STOREFRONT_TOKEN", mask(cfg.storefront.token.as_deref())),
        ("FOURTHWALL_CHECKOUT_DOMAIN", plain(cfg.storefront.checkout_domain.as_deref())),
        ("FOURTHWALL_COLLECTIONS", join_refs(&cfg.storefront.collections)),
    ]
}

fn join_refs(refs: &[NamedRef]) -> String {
    refs.iter()
        .map(|r| format!("{}:{}", r.id, r.name))
        .collect::<Vec<_>>()
        .join(",")
}

fn plain(value: Option<&str>) -> String {
    value.unwrap_or("(not set)").to_string()
}

/// Never print a secret in full.
fn mask(value: Option<&str>) -> String {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => "(not set)".to_string(),
        Some(v) if v.len() > 8 && v.is_ascii() => format!("{}…{}", &v[..4], &v[v.len() - 4..]),
        Some(_) => "****".to_string(),
    }
}
