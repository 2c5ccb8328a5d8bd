use serde::Serialize;

/// Live/offline state of the channel. Everything but `is_live` is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStatus {
    pub is_live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewer_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl StreamStatus {
    pub fn offline() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    pub login: String,
    pub display_name: String,
    pub profile_image_url: String,
    pub description: String,
}

/// A past recorded stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast {
    pub id: String,
    pub title: String,
    /// `None` while the platform is still generating the thumbnail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    pub duration: String,
    pub created_at: String,
    pub view_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub game: Option<String>,
}

/// A planned stream segment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleItem {
    pub id: String,
    pub title: String,
    pub start_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    /// Display date, e.g. `Mar 7, 2025`.
    pub date: String,
    /// Display time in UTC, e.g. `7:00 PM UTC`.
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canceled_until: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Vacation {
    pub start_time: String,
    pub end_time: String,
}

/// Payload of `GET /api/twitch`.
///
/// Sections that were not requested, or that could not be fetched, are
/// omitted (objects) or empty (lists).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelOverview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_status: Option<StreamStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_info: Option<UserInfo>,
    pub schedule: Vec<ScheduleItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vacation: Option<Vacation>,
    pub past_broadcasts: Vec<Broadcast>,
}
