//! Shared fixtures: a `Config` pointed at a wiremock server plus canned
//! upstream bodies.

#![allow(dead_code)]

use std::sync::Arc;

use gateway::config::{Config, NamedRef};
use gateway::AppState;
use serde_json::{json, Value};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const LOGIN: &str = "liefx";
pub const USER_ID: &str = "141981764";

/// Every upstream base URL points at `server`. No retries, so call counts
/// are exact.
pub fn mock_config(server: &MockServer) -> Config {
    let uri = server.uri();
    let mut cfg = Config::default();
    cfg.site_url = "https://liefx.example".into();
    cfg.upstream.timeout_secs = 5;
    cfg.upstream.max_retries = 0;
    cfg.upstream.base_backoff_ms = 1;

    cfg.twitch.client_id = Some("test-client-id".into());
    cfg.twitch.client_secret = Some("test-client-secret".into());
    cfg.twitch.user_login = Some(LOGIN.into());
    cfg.twitch.auth_url = uri.clone();
    cfg.twitch.api_url = format!("{}/helix", uri);

    cfg.youtube.api_key = Some("yt-key".into());
    cfg.youtube.api_url = format!("{}/youtube/v3", uri);
    cfg.youtube.featured_channels = vec![
        NamedRef { id: "UCmain".into(), name: "Liefx".into() },
        NamedRef { id: "UCclips".into(), name: "Liefx Clips".into() },
    ];

    cfg.storefront.token = Some("sf-token".into());
    cfg.storefront.api_url = format!("{}/v1", uri);
    cfg.storefront.collections = vec![
        NamedRef { id: "leafy-longplays".into(), name: "Leafy Longplays Collection".into() },
        NamedRef { id: "liefx".into(), name: "Liefx Collection".into() },
    ];
    cfg
}

pub fn mock_state(server: &MockServer) -> Arc<AppState> {
    Arc::new(AppState::new(mock_config(server)).unwrap())
}

// ── Token endpoint ───────────────────────────────────────────

pub async fn mount_app_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "app-token",
            "expires_in": 5011271,
            "token_type": "bearer"
        })))
        .mount(server)
        .await;
}

// ── Helix bodies ─────────────────────────────────────────────

pub fn users_body() -> Value {
    json!({"data": [{
        "id": USER_ID,
        "login": LOGIN,
        "display_name": "Liefx",
        "type": "",
        "broadcaster_type": "affiliate",
        "description": "Cozy <longplays> & chill",
        "profile_image_url": "https://cdn.example/liefx.png",
        "offline_image_url": "",
        "view_count": 0,
        "created_at": "2017-01-01T00:00:00Z"
    }]})
}

pub fn live_stream_body() -> Value {
    json!({"data": [{
        "id": "40952121085",
        "user_id": USER_ID,
        "user_login": LOGIN,
        "game_name": "Minecraft",
        "type": "live",
        "title": "Building a castle",
        "viewer_count": 78,
        "started_at": "2025-03-07T19:00:00Z",
        "thumbnail_url": "https://static-cdn.example/previews-ttv/live_user_liefx-{width}x{height}.jpg"
    }], "pagination": {}})
}

pub fn videos_body() -> Value {
    json!({"data": [
        {
            "id": "335921245",
            "title": "Castle part 2",
            "created_at": "2025-03-06T19:00:00Z",
            "thumbnail_url": "https://static-cdn.example/cf_vods/abc/thumb0-%{width}x%{height}.jpg",
            "view_count": 1863,
            "duration": "3h8m33s",
            "type": "archive"
        },
        {
            "id": "335921244",
            "title": "Castle part 1",
            "created_at": "2025-03-05T19:00:00Z",
            "thumbnail_url": "",
            "view_count": 1204,
            "duration": "2h1m2s",
            "type": "archive"
        }
    ], "pagination": {}})
}

pub fn schedule_body(segments: usize) -> Value {
    let segments: Vec<Value> = (0..segments)
        .map(|i| {
            json!({
                "id": format!("seg{}", i),
                "start_time": format!("2025-03-{:02}T19:00:00Z", 10 + i),
                "end_time": format!("2025-03-{:02}T22:00:00Z", 10 + i),
                "title": format!("Longplay night {}", i),
                "canceled_until": null,
                "category": {"id": "27471", "name": "Minecraft"},
                "is_recurring": true
            })
        })
        .collect();
    json!({"data": {
        "segments": segments,
        "broadcaster_id": USER_ID,
        "broadcaster_name": "Liefx",
        "broadcaster_login": LOGIN,
        "vacation": null
    }, "pagination": {}})
}

// ── YouTube bodies ───────────────────────────────────────────

pub fn search_item(video_id: &str, title: &str) -> Value {
    json!({
        "kind": "youtube#searchResult",
        "id": {"kind": "youtube#video", "videoId": video_id},
        "snippet": {
            "publishedAt": "2025-01-02T03:04:05Z",
            "channelId": "UCmain",
            "title": title,
            "channelTitle": "Liefx",
            "thumbnails": {
                "default": {"url": format!("https://i.ytimg.example/vi/{}/default.jpg", video_id)},
                "high": {"url": format!("https://i.ytimg.example/vi/{}/hqdefault.jpg", video_id)}
            }
        }
    })
}

pub fn stats_item(video_id: &str, views: &str) -> Value {
    json!({"kind": "youtube#video", "id": video_id, "statistics": {"viewCount": views, "likeCount": "10"}})
}

// ── Storefront bodies ────────────────────────────────────────

pub fn product_body(slug: &str, access: &str) -> Value {
    json!({
        "id": format!("prod_{}", slug),
        "name": format!("{} tee", slug),
        "slug": slug,
        "description": "<p>Soft</p>",
        "images": [{"id": "img1", "url": "https://cdn.example/tee.png", "width": 800, "height": 800}],
        "variants": [{
            "id": format!("var_{}", slug),
            "name": "M",
            "sku": "TEE-M",
            "unitPrice": {"value": 25.0, "currency": "USD"},
            "attributes": {"description": "M", "size": {"name": "M"}},
            "stock": {"type": "UNLIMITED"},
            "images": []
        }],
        "state": {"type": "AVAILABLE"},
        "access": {"type": access}
    })
}
