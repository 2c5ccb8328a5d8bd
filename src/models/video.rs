use serde::Serialize;

/// Shown instead of a view count when statistics are unavailable.
pub const VIEW_COUNT_UNAVAILABLE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    pub id: String,
    pub title: String,
    pub thumbnail: String,
    pub published_at: String,
    /// Human-formatted (`1.5K`) or [`VIEW_COUNT_UNAVAILABLE`].
    pub view_count: String,
    pub channel_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedVideo {
    pub channel_id: String,
    pub channel_name: String,
    pub video: VideoSummary,
}

/// Latest upload of each configured channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedVideos {
    pub videos: Vec<FeaturedVideo>,
    /// Names of channels that failed or have no uploads.
    pub unavailable_channels: Vec<String>,
}
