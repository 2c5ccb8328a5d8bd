use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::aggregate::{CartItems, CartRelay, Sections};
use crate::errors::AppError;
use crate::models::merch::{AddToCartRequest, CheckoutLink, CollectionList, Product, ProductList};
use crate::models::video::{FeaturedVideos, VideoSummary};
use crate::AppState;

// ── Query parameters ─────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OverviewParams {
    pub include: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProductParams {
    pub collection: Option<String>,
}

// ── Channel ──────────────────────────────────────────────────

/// `GET /api/twitch`. Cookie writes from a token refresh are attached to the
/// response whether or not the overview succeeds.
pub async fn channel_overview(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OverviewParams>,
    headers: HeaderMap,
) -> Response {
    let session = state.session(&headers);
    let result = async {
        let sections = Sections::parse(params.include.as_deref())?;
        state.channel.overview(sections, &session).await
    }
    .await;
    session.apply(result.map(Json).into_response())
}

// ── Videos ───────────────────────────────────────────────────

pub async fn channel_videos(
    State(state): State<Arc<AppState>>,
    Path(channel_id): Path<String>,
) -> Result<Json<Vec<VideoSummary>>, AppError> {
    let videos = state.videos.channel_videos(&channel_id).await?;
    tracing::debug!(channel_id = %channel_id, count = videos.len(), "videos listed");
    Ok(Json(videos))
}

pub async fn featured_videos(
    State(state): State<Arc<AppState>>,
) -> Result<Json<FeaturedVideos>, AppError> {
    Ok(Json(state.videos.featured().await?))
}

// ── Merch ────────────────────────────────────────────────────

pub async fn products(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProductParams>,
) -> Result<Json<ProductList>, AppError> {
    let collection = params.collection.as_deref().filter(|c| !c.trim().is_empty());
    Ok(Json(state.storefront.products(collection).await?))
}

pub async fn collections(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CollectionList>, AppError> {
    Ok(Json(state.storefront.collections().await?))
}

pub async fn product(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<Product>, AppError> {
    Ok(Json(state.storefront.product(&slug).await?))
}

// ── Cart relays ──────────────────────────────────────────────

/// `POST /api/cart`. An empty body creates an empty cart.
pub async fn create_cart(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, AppError> {
    let items: CartItems = if body.iter().all(u8::is_ascii_whitespace) {
        CartItems::default()
    } else {
        parse_body(&body)?
    };
    Ok(relay_response(state.storefront.create_cart(&items).await?))
}

pub async fn get_cart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, AppError> {
    Ok(relay_response(state.storefront.cart(&id).await?))
}

pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, AppError> {
    let item: AddToCartRequest = parse_body(&body)?;
    Ok(relay_response(state.storefront.add_to_cart(&id, &item).await?))
}

pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CheckoutLink>, AppError> {
    Ok(Json(state.storefront.checkout_link(&id).await?))
}

/// Upstream status and body, unchanged.
fn relay_response(relay: CartRelay) -> Response {
    let mut resp = (relay.status, relay.body).into_response();
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    resp
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("invalid request body: {}", e)))
}
