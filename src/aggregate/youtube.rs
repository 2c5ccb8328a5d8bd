//! Video listings: channel search joined with per-video statistics.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Deserialize;

use super::assemble::absorb;
use super::normalize::{escape_html, format_view_count_str, numeric_date};
use crate::config::{Config, NamedRef};
use crate::errors::AppError;
use crate::models::video::{FeaturedVideo, FeaturedVideos, VideoSummary, VIEW_COUNT_UNAVAILABLE};
use crate::upstream::{endpoint, UpstreamClient, UpstreamRequest};

const SERVICE: &str = "youtube";
const VIDEO_KIND: &str = "youtube#video";

#[derive(Debug, Deserialize)]
struct ItemList<T> {
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchId {
    kind: String,
    #[serde(default)]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    #[serde(default)]
    title: String,
    #[serde(default)]
    published_at: String,
    #[serde(default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    high: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    default: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

impl Thumbnails {
    fn best(self) -> String {
        self.high
            .or(self.medium)
            .or(self.default)
            .map(|t| t.url)
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct StatsItem {
    id: String,
    #[serde(default)]
    statistics: Statistics,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    #[serde(default)]
    view_count: Option<String>,
}

#[derive(Clone)]
pub struct VideoAggregator {
    config: Arc<Config>,
    upstream: UpstreamClient,
}

impl VideoAggregator {
    pub fn new(config: Arc<Config>, upstream: UpstreamClient) -> Self {
        Self { config, upstream }
    }

    /// Most recent uploads of a channel, newest first.
    pub async fn channel_videos(&self, channel_id: &str) -> Result<Vec<VideoSummary>, AppError> {
        self.recent_videos(channel_id, self.config.youtube.max_results).await
    }

    /// Latest upload of each configured featured channel. Channels that fail
    /// or have no uploads are listed in `unavailable_channels`.
    pub async fn featured(&self) -> Result<FeaturedVideos, AppError> {
        let channels = &self.config.youtube.featured_channels;
        let results = join_all(channels.iter().map(|c| self.recent_videos(&c.id, 1))).await;

        let mut featured = FeaturedVideos::default();
        for (channel, result) in channels.iter().zip(results) {
            match result {
                Ok(videos) => match videos.into_iter().next() {
                    Some(video) => featured.videos.push(FeaturedVideo {
                        channel_id: channel.id.clone(),
                        channel_name: channel.name.clone(),
                        video,
                    }),
                    None => featured.unavailable_channels.push(channel.name.clone()),
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn_unavailable(channel, &e);
                    featured.unavailable_channels.push(channel.name.clone());
                }
            }
        }

        tracing::info!(
            videos = featured.videos.len(),
            unavailable = featured.unavailable_channels.len(),
            "featured videos assembled"
        );
        Ok(featured)
    }

    async fn recent_videos(&self, channel_id: &str, max_results: u32) -> Result<Vec<VideoSummary>, AppError> {
        let channel_id = channel_id.trim();
        if channel_id.is_empty() {
            return Err(AppError::BadRequest("channel id is required".into()));
        }

        let api_key = self.config.youtube.api_key()?;
        let max_results = max_results.to_string();
        let url = endpoint(
            &self.config.youtube.api_url,
            "search",
            &[
                ("key", api_key),
                ("channelId", channel_id),
                ("part", "snippet,id"),
                ("order", "date"),
                ("maxResults", &max_results),
            ],
        )?;
        let search: ItemList<SearchItem> = self
            .upstream
            .fetch_json(UpstreamRequest::get(SERVICE, url))
            .await?;

        let videos: Vec<(String, Snippet)> = search
            .items
            .into_iter()
            .filter(|item| item.id.kind == VIDEO_KIND)
            .filter_map(|item| item.id.video_id.map(|id| (id, item.snippet)))
            .collect();

        if videos.is_empty() {
            tracing::debug!(channel_id, "channel has no videos");
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = videos.iter().map(|(id, _)| id.as_str()).collect();
        let stats = absorb("statistics", self.view_counts(api_key, &ids).await)?;

        Ok(videos
            .into_iter()
            .map(|(id, snippet)| VideoSummary {
                view_count: stats
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| VIEW_COUNT_UNAVAILABLE.to_string()),
                id,
                title: escape_html(&snippet.title),
                published_at: numeric_date(&snippet.published_at),
                channel_title: escape_html(&snippet.channel_title),
                thumbnail: snippet.thumbnails.best(),
            })
            .collect())
    }

    /// Formatted view count per video id.
    async fn view_counts(&self, api_key: &str, ids: &[&str]) -> Result<HashMap<String, String>, AppError> {
        let joined = ids.join(",");
        let url = endpoint(
            &self.config.youtube.api_url,
            "videos",
            &[("key", api_key), ("id", &joined), ("part", "statistics")],
        )?;
        let stats: ItemList<StatsItem> = self
            .upstream
            .fetch_json(UpstreamRequest::get(SERVICE, url))
            .await?;

        Ok(stats
            .items
            .into_iter()
            .map(|item| {
                let count = item
                    .statistics
                    .view_count
                    .as_deref()
                    .map(format_view_count_str)
                    .unwrap_or_else(|| VIEW_COUNT_UNAVAILABLE.to_string());
                (item.id, count)
            })
            .collect())
    }
}

fn warn_unavailable(channel: &NamedRef, error: &AppError) {
    tracing::warn!(
        channel_id = %channel.id,
        channel = %channel.name,
        error_kind = error.kind(),
        "featured channel unavailable: {}",
        error
    );
}
