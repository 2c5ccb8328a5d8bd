//! Channel overview: stream status, identity, past broadcasts and schedule.
//!
//! Call graph for a full overview:
//!
//! ```text
//! app token ─┬─ user lookup ──┐
//!            ├─ stream status │
//! user token ┘                ├─ past broadcasts ┐
//!                             └─ schedule ───────┴─ assemble
//! ```
//!
//! The user lookup is a hard prerequisite; everything else degrades to a
//! default value.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Deserialize;

use super::assemble::{absorb, absorb_or};
use super::normalize::{display_date, display_time, escape_html, fill_thumbnail_template};
use crate::config::Config;
use crate::credentials::{SessionTokenStore, TokenProvider};
use crate::errors::AppError;
use crate::models::stream::{
    Broadcast, ChannelOverview, ScheduleItem, StreamStatus, UserInfo, Vacation,
};
use crate::upstream::{endpoint, UpstreamClient, UpstreamRequest};

const SERVICE: &str = "twitch";

/// A selectable part of the channel overview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Stream,
    User,
    Broadcasts,
    Schedule,
}

impl Section {
    pub const ALL: [Section; 4] = [
        Section::Stream,
        Section::User,
        Section::Broadcasts,
        Section::Schedule,
    ];

    fn bit(self) -> u8 {
        match self {
            Section::Stream => 1,
            Section::User => 1 << 1,
            Section::Broadcasts => 1 << 2,
            Section::Schedule => 1 << 3,
        }
    }
}

impl FromStr for Section {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stream" => Ok(Section::Stream),
            "user" => Ok(Section::User),
            "broadcasts" => Ok(Section::Broadcasts),
            "schedule" => Ok(Section::Schedule),
            other => Err(AppError::BadRequest(format!(
                "unknown section '{}', expected one of stream, user, broadcasts, schedule",
                other
            ))),
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Stream => "stream",
            Section::User => "user",
            Section::Broadcasts => "broadcasts",
            Section::Schedule => "schedule",
        };
        f.write_str(name)
    }
}

/// Set of requested sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sections(u8);

impl Sections {
    pub fn all() -> Self {
        Self::from_iter(Section::ALL)
    }

    pub fn contains(&self, section: Section) -> bool {
        self.0 & section.bit() != 0
    }

    /// Parse a comma-separated `include` list. Missing or blank means all.
    pub fn parse(raw: Option<&str>) -> Result<Self, AppError> {
        let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
            return Ok(Self::all());
        };
        raw.split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Section::from_str)
            .collect()
    }

    fn needs_identity(&self) -> bool {
        self.contains(Section::User) || self.needs_user_token()
    }

    fn needs_user_token(&self) -> bool {
        self.contains(Section::Broadcasts) || self.contains(Section::Schedule)
    }
}

impl FromIterator<Section> for Sections {
    fn from_iter<I: IntoIterator<Item = Section>>(iter: I) -> Self {
        Self(iter.into_iter().fold(0, |acc, s| acc | s.bit()))
    }
}

// ── Helix wire shapes ────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct HelixList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct HelixUser {
    id: String,
    login: String,
    display_name: String,
    #[serde(default)]
    profile_image_url: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct HelixStream {
    #[serde(default)]
    title: String,
    #[serde(default)]
    game_name: String,
    #[serde(default)]
    viewer_count: u64,
    #[serde(default)]
    thumbnail_url: String,
}

#[derive(Debug, Deserialize)]
struct HelixVideo {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    thumbnail_url: String,
    #[serde(default)]
    duration: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    view_count: u64,
    #[serde(default)]
    game_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HelixScheduleEnvelope {
    data: HelixSchedule,
}

#[derive(Debug, Deserialize)]
struct HelixSchedule {
    #[serde(default)]
    segments: Option<Vec<HelixSegment>>,
    #[serde(default)]
    vacation: Option<HelixVacation>,
}

#[derive(Debug, Deserialize)]
struct HelixSegment {
    id: String,
    start_time: String,
    #[serde(default)]
    end_time: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    canceled_until: Option<String>,
    #[serde(default)]
    category: Option<HelixCategory>,
}

#[derive(Debug, Deserialize)]
struct HelixCategory {
    name: String,
}

#[derive(Debug, Deserialize)]
struct HelixVacation {
    start_time: String,
    end_time: String,
}

/// Schedule section result.
#[derive(Debug, Default)]
struct ScheduleBlock {
    items: Vec<ScheduleItem>,
    vacation: Option<Vacation>,
}

#[derive(Clone)]
pub struct ChannelAggregator {
    config: Arc<Config>,
    tokens: TokenProvider,
    upstream: UpstreamClient,
}

impl ChannelAggregator {
    pub fn new(config: Arc<Config>, tokens: TokenProvider, upstream: UpstreamClient) -> Self {
        Self {
            config,
            tokens,
            upstream,
        }
    }

    /// Build the overview for the configured channel.
    ///
    /// Fails only when the app token cannot be obtained, the channel identity
    /// cannot be resolved, or an upstream rate-limits us.
    pub async fn overview(
        &self,
        sections: Sections,
        store: &dyn SessionTokenStore,
    ) -> Result<ChannelOverview, AppError> {
        let login = self.config.twitch.user_login()?;
        let app_token = self.tokens.app_token().await?;

        let (identity, stream, user_token) = tokio::join!(
            async {
                if sections.needs_identity() {
                    self.lookup_user(&app_token, login).await.map(Some)
                } else {
                    Ok(None)
                }
            },
            async {
                if sections.contains(Section::Stream) {
                    Some(self.stream_status(&app_token, login).await)
                } else {
                    None
                }
            },
            async {
                if sections.needs_user_token() {
                    self.tokens.user_token(store).await
                } else {
                    Ok(None)
                }
            },
        );

        let identity = identity?;
        let stream_status = match stream {
            Some(result) => Some(absorb_or("stream", result, StreamStatus::offline)?),
            None => None,
        };
        let user_token = user_token?;

        let mut overview = ChannelOverview {
            stream_status,
            ..ChannelOverview::default()
        };

        if let (Some(user), Some(token)) = (&identity, &user_token) {
            let (broadcasts, schedule) = tokio::join!(
                async {
                    if sections.contains(Section::Broadcasts) {
                        self.past_broadcasts(token, &user.id).await
                    } else {
                        Ok(Vec::new())
                    }
                },
                async {
                    if sections.contains(Section::Schedule) {
                        self.schedule(token, &user.id).await
                    } else {
                        Ok(ScheduleBlock::default())
                    }
                },
            );
            overview.past_broadcasts = absorb("broadcasts", broadcasts)?;
            let schedule = absorb("schedule", schedule)?;
            overview.schedule = schedule.items;
            overview.vacation = schedule.vacation;
        } else if sections.needs_user_token() {
            tracing::debug!("no user token, private sections left empty");
        }

        if sections.contains(Section::User) {
            overview.user_info = identity;
        }

        Ok(overview)
    }

    fn helix(&self, path: &str, params: &[(&str, &str)], token: &str) -> Result<UpstreamRequest, AppError> {
        let twitch = &self.config.twitch;
        let url = endpoint(&twitch.api_url, path, params)?;
        UpstreamRequest::get(SERVICE, url)
            .header("client-id", twitch.client_id()?)?
            .bearer(token)
    }

    async fn lookup_user(&self, app_token: &str, login: &str) -> Result<UserInfo, AppError> {
        let req = self.helix("users", &[("login", login)], app_token)?;
        let users: HelixList<HelixUser> = self.upstream.fetch_json(req).await?;

        let user = users
            .data
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("channel '{}' does not exist", login)))?;

        Ok(UserInfo {
            id: user.id,
            login: user.login,
            display_name: escape_html(&user.display_name),
            profile_image_url: user.profile_image_url,
            description: escape_html(&user.description),
        })
    }

    async fn stream_status(&self, app_token: &str, login: &str) -> Result<StreamStatus, AppError> {
        let req = self.helix("streams", &[("user_login", login)], app_token)?;
        let streams: HelixList<HelixStream> = self.upstream.fetch_json(req).await?;

        let Some(stream) = streams.data.into_iter().next() else {
            return Ok(StreamStatus::offline());
        };

        let media = &self.config.media;
        Ok(StreamStatus {
            is_live: true,
            title: Some(escape_html(&stream.title)),
            game: display_text(stream.game_name),
            viewer_count: Some(stream.viewer_count),
            thumbnail_url: Some(stream.thumbnail_url)
                .filter(|t| !t.is_empty())
                .map(|t| fill_thumbnail_template(&t, media.thumbnail_width, media.thumbnail_height)),
        })
    }

    async fn past_broadcasts(&self, user_token: &str, user_id: &str) -> Result<Vec<Broadcast>, AppError> {
        let media = &self.config.media;
        let first = media.broadcast_limit.to_string();
        let req = self.helix(
            "videos",
            &[("user_id", user_id), ("type", "archive"), ("first", &first)],
            user_token,
        )?;
        let videos: HelixList<HelixVideo> = self.upstream.fetch_json(req).await?;

        Ok(videos
            .data
            .into_iter()
            .map(|v| Broadcast {
                id: v.id,
                title: escape_html(&v.title),
                thumbnail: Some(v.thumbnail_url)
                    .filter(|t| !t.is_empty())
                    .map(|t| fill_thumbnail_template(&t, media.thumbnail_width, media.thumbnail_height)),
                duration: v.duration,
                created_at: v.created_at,
                view_count: v.view_count,
                game: v.game_name.and_then(display_text),
            })
            .collect())
    }

    async fn schedule(&self, user_token: &str, user_id: &str) -> Result<ScheduleBlock, AppError> {
        let limit = self.config.media.schedule_limit;
        let first = limit.to_string();
        let req = self.helix(
            "schedule",
            &[("broadcaster_id", user_id), ("first", &first)],
            user_token,
        )?;

        // Helix answers 404 for a channel with no schedule configured.
        let envelope: HelixScheduleEnvelope = match self.upstream.fetch_json(req).await {
            Ok(envelope) => envelope,
            Err(AppError::NotFound(_)) => return Ok(ScheduleBlock::default()),
            Err(e) => return Err(e),
        };

        let items = envelope
            .data
            .segments
            .unwrap_or_default()
            .into_iter()
            .take(limit)
            .map(|s| ScheduleItem {
                date: display_date(&s.start_time),
                time: display_time(&s.start_time),
                id: s.id,
                title: escape_html(&s.title),
                start_time: s.start_time,
                end_time: s.end_time,
                category: s.category.map(|c| escape_html(&c.name)),
                canceled_until: s.canceled_until,
            })
            .collect();

        let vacation = envelope.data.vacation.map(|v| Vacation {
            start_time: v.start_time,
            end_time: v.end_time,
        });

        Ok(ScheduleBlock { items, vacation })
    }
}

/// Entity-encoded free text; empty strings are dropped.
fn display_text(raw: String) -> Option<String> {
    Some(raw).filter(|t| !t.is_empty()).map(|t| escape_html(&t))
}
