//! Router-level tests: status mapping, cookies and redirects.

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use gateway::api;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn send(server: &MockServer, req: Request<Body>) -> Response {
    api::app(common::mock_state(server)).oneshot(req).await.unwrap()
}

async fn send_with(cfg: gateway::config::Config, req: Request<Body>) -> Response {
    let state = std::sync::Arc::new(gateway::AppState::new(cfg).unwrap());
    api::app(state).oneshot(req).await.unwrap()
}

async fn json_body(resp: Response) -> Value {
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn set_cookies(resp: &Response) -> Vec<String> {
    resp.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn test_health_and_security_headers() {
    let server = MockServer::start().await;
    let resp = send(&server, get("/healthz")).await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()["x-content-type-options"], "nosniff");
    assert_eq!(resp.headers()["cache-control"], "no-store");
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = MockServer::start().await;
    let req = Request::builder()
        .uri("/readyz")
        .header("x-request-id", "req-123")
        .body(Body::empty())
        .unwrap();
    let resp = send(&server, req).await;
    assert_eq!(resp.headers()["x-request-id"], "req-123");
    let body = json_body(resp).await;
    assert_eq!(body["twitch"], true);
    assert_eq!(body["storefront"], true);
}

#[tokio::test]
async fn test_unknown_api_route_is_json_404() {
    let server = MockServer::start().await;
    let resp = send(&server, get("/api/nope")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(resp).await["errorKind"], "NotFound");
}

#[tokio::test]
async fn test_rate_limit_maps_to_429_with_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/youtube/v3/search"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "45"))
        .mount(&server)
        .await;

    let resp = send(&server, get("/api/videos/UCmain")).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers()["retry-after"], "45");
    let body = json_body(resp).await;
    assert_eq!(body["errorKind"], "RateLimited");
    assert!(body.get("detail").is_none());
}

#[tokio::test]
async fn test_upstream_failure_maps_to_502() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/products"))
        .respond_with(ResponseTemplate::new(500).set_body_string("storefront exploded"))
        .mount(&server)
        .await;

    let resp = send(&server, get("/api/merch")).await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body = json_body(resp).await;
    assert_eq!(body["errorKind"], "UpstreamDataError");
    assert!(!body.to_string().contains("exploded"));
}

#[tokio::test]
async fn test_unknown_section_is_400() {
    let server = MockServer::start().await;
    let resp = send(&server, get("/api/twitch?include=chat")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(resp).await["errorKind"], "BadRequest");
}

#[tokio::test]
async fn test_overview_refresh_rejection_clears_cookies() {
    let server = MockServer::start().await;
    common::mount_app_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"message": "Invalid refresh token"})))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/helix/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::users_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/helix/streams"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .mount(&server)
        .await;

    let req = Request::builder()
        .uri("/api/twitch")
        .header(header::COOKIE, "refreshToken=stale")
        .body(Body::empty())
        .unwrap();
    let resp = send(&server, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let cookies = set_cookies(&resp);
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=;")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=;")));

    let body = json_body(resp).await;
    assert_eq!(body["streamStatus"], json!({"isLive": false}));
    assert_eq!(body["userInfo"]["login"], "liefx");
    assert_eq!(body["schedule"], json!([]));
    assert_eq!(body["pastBroadcasts"], json!([]));
}

#[tokio::test]
async fn test_overview_refresh_sets_new_cookies() {
    let server = MockServer::start().await;
    common::mount_app_token(&server).await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh", "refresh_token": "rotated", "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/helix/streams"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::live_stream_body()))
        .mount(&server)
        .await;

    // Stream-only overview does not need a user token, so no refresh happens.
    let req = Request::builder()
        .uri("/api/twitch?include=stream")
        .header(header::COOKIE, "refreshToken=old")
        .body(Body::empty())
        .unwrap();
    let resp = send(&server, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(set_cookies(&resp).is_empty());

    Mock::given(method("GET"))
        .and(path("/helix/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::users_body()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/helix/videos"))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::videos_body()))
        .mount(&server)
        .await;

    let req = Request::builder()
        .uri("/api/twitch?include=broadcasts")
        .header(header::COOKIE, "refreshToken=old")
        .body(Body::empty())
        .unwrap();
    let resp = send(&server, req).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let cookies = set_cookies(&resp);
    let access = cookies.iter().find(|c| c.starts_with("accessToken=fresh")).unwrap();
    assert!(access.contains("HttpOnly"));
    assert!(access.contains("Max-Age=3600"));
    assert!(access.contains("SameSite=Lax"));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=rotated")));
    assert_eq!(json_body(resp).await["pastBroadcasts"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_login_redirects_with_state_cookie() {
    let server = MockServer::start().await;
    let resp = send(&server, get("/api/twitch/login")).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = resp.headers()[header::LOCATION].to_str().unwrap().to_string();
    assert!(location.starts_with(&format!("{}/oauth2/authorize?", server.uri())));

    let cookies = set_cookies(&resp);
    let state_cookie = cookies.iter().find(|c| c.starts_with("oauthState=")).unwrap();
    let state_value = state_cookie
        .trim_start_matches("oauthState=")
        .split(';')
        .next()
        .unwrap();
    assert_eq!(state_value.len(), 32);
    assert!(location.contains(&format!("state={}", state_value)));
}

#[tokio::test]
async fn test_callback_rejects_state_mismatch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let req = Request::builder()
        .uri("/api/twitch/auth?code=abc&state=forged")
        .header(header::COOKIE, "oauthState=expected")
        .body(Body::empty())
        .unwrap();
    let resp = send(&server, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_exchanges_code_and_redirects() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access", "refresh_token": "new-refresh", "expires_in": 14400
        })))
        .expect(1)
        .mount(&server)
        .await;

    let req = Request::builder()
        .uri("/api/twitch/auth?code=abc&state=s1")
        .header(header::COOKIE, "oauthState=s1")
        .body(Body::empty())
        .unwrap();
    let resp = send(&server, req).await;

    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(resp.headers()[header::LOCATION], "https://liefx.example/livestreams");
    let cookies = set_cookies(&resp);
    assert!(cookies.iter().any(|c| c.starts_with("oauthState=;")));
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=new-access")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=new-refresh")));
}

#[tokio::test]
async fn test_sign_out_revokes_and_clears() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/revoke"))
        .and(body_string_contains("token=live-access"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let req = Request::builder()
        .method("DELETE")
        .uri("/api/twitch")
        .header(header::COOKIE, "accessToken=live-access; refreshToken=r")
        .body(Body::empty())
        .unwrap();
    let resp = send(&server, req).await;

    assert_eq!(resp.status(), StatusCode::OK);
    let cookies = set_cookies(&resp);
    assert!(cookies.iter().any(|c| c.starts_with("accessToken=;")));
    assert!(cookies.iter().any(|c| c.starts_with("refreshToken=;")));
    assert_eq!(json_body(resp).await, json!({"revoked": true}));
}

#[tokio::test]
async fn test_cart_relay_and_bad_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/carts"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "cart_7", "items": []})))
        .expect(1)
        .mount(&server)
        .await;

    let req = Request::builder()
        .method("POST")
        .uri("/api/cart")
        .body(Body::empty())
        .unwrap();
    let resp = send(&server, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    assert_eq!(json_body(resp).await["id"], "cart_7");

    let req = Request::builder()
        .method("POST")
        .uri("/api/cart/cart_7/add")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"quantity\": 1}"))
        .unwrap();
    let resp = send(&server, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_featured_route_is_not_a_channel_id() {
    let server = MockServer::start().await;
    let mut cfg = common::mock_config(&server);
    cfg.youtube.featured_channels.clear();
    let state = std::sync::Arc::new(gateway::AppState::new(cfg).unwrap());

    let resp = api::app(state).oneshot(get("/api/videos/featured")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_body(resp).await,
        json!({"videos": [], "unavailableChannels": []})
    );
}

#[tokio::test]
async fn test_collections_without_storefront_token_is_500() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
        .expect(0)
        .mount(&server)
        .await;

    let mut cfg = common::mock_config(&server);
    cfg.storefront.token = None;
    let resp = send_with(cfg, get("/api/merch/collections")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(resp).await["errorKind"], "ConfigurationError");
}

#[tokio::test]
async fn test_featured_without_api_key_is_500() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .expect(0)
        .mount(&server)
        .await;

    let mut cfg = common::mock_config(&server);
    cfg.youtube.api_key = None;
    let resp = send_with(cfg, get("/api/videos/featured")).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(resp).await["errorKind"], "ConfigurationError");
}

#[tokio::test]
async fn test_cart_rate_limit_is_tagged() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/carts/cart_1/add"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("Retry-After", "9")
                .set_body_json(json!({"error": "slow down"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let req = Request::builder()
        .method("POST")
        .uri("/api/cart/cart_1/add")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"variantId": "var_x", "quantity": 1}"#))
        .unwrap();
    let resp = send(&server, req).await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers()["retry-after"], "9");
    assert_eq!(json_body(resp).await["errorKind"], "RateLimited");
}
