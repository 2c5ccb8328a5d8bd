use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{HeaderName, HeaderValue, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Instrument;

use crate::AppState;

pub mod auth;
pub mod handlers;

/// Routes under `/api`.
pub fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/twitch",
            get(handlers::channel_overview).delete(auth::sign_out),
        )
        .route("/twitch/login", get(auth::login))
        .route("/twitch/auth", get(auth::callback))
        .route("/videos/featured", get(handlers::featured_videos))
        .route("/videos/:channel_id", get(handlers::channel_videos))
        .route("/merch", get(handlers::products))
        .route("/merch/collections", get(handlers::collections))
        .route("/merch/products/:slug", get(handlers::product))
        .route("/cart", post(handlers::create_cart))
        .route("/cart/:id", get(handlers::get_cart))
        .route("/cart/:id/add", post(handlers::add_to_cart))
        .route("/cart/:id/checkout", get(handlers::checkout))
        .fallback(fallback_404)
}

/// The complete application: health checks, the API and the HTTP layers.
pub fn app(state: Arc<AppState>) -> Router {
    let site_origin = state.config.site_url.trim_end_matches('/').to_string();

    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readiness_check))
        .nest("/api", api_router())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::predicate(move |origin, _| {
                    let origin = origin.to_str().unwrap_or("");
                    origin == site_origin
                        || origin.starts_with("http://localhost:")
                        || origin.starts_with("http://127.0.0.1:")
                }))
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([
                    HeaderName::from_static("content-type"),
                    HeaderName::from_static("x-request-id"),
                ])
                .allow_credentials(true),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .layer(middleware::from_fn(security_headers_middleware))
}

async fn fallback_404() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"errorKind": "NotFound", "message": "no such endpoint"})),
    )
        .into_response()
}

/// Reports which upstream integrations have credentials configured.
async fn readiness_check(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let config = &state.config;
    Json(json!({
        "status": "ok",
        "twitch": config.twitch.client_id().is_ok() && config.twitch.client_secret().is_ok(),
        "youtube": config.youtube.api_key().is_ok(),
        "storefront": config.storefront.token().is_ok(),
    }))
}

/// Echoes the caller's `x-request-id` or assigns a fresh one.
async fn request_id_middleware(req: Request, next: Next) -> Response {
    let req_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = tracing::info_span!("request", request_id = %req_id);
    let mut resp = next.run(req).instrument(span).await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

async fn security_headers_middleware(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("x-content-type-options", HeaderValue::from_static("nosniff"));
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert("referrer-policy", HeaderValue::from_static("no-referrer"));
    // Responses depend on per-visitor cookies.
    headers.insert("cache-control", HeaderValue::from_static("no-store"));
    headers.remove("server");

    resp
}
