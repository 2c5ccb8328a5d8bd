//! OAuth login redirect, callback and sign-out for the streaming platform.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;

use crate::errors::AppError;
use crate::AppState;

const STATE_LEN: usize = 32;

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// `GET /api/twitch/login`: 302 to the authorize page with a fresh CSRF state.
pub async fn login(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = state.session(&headers);
    let csrf: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LEN)
        .map(char::from)
        .collect();

    match state.tokens.authorize_url(&csrf) {
        Ok(url) => {
            session.set_oauth_state(&csrf);
            session.apply(found(url.as_str()))
        }
        Err(e) => e.into_response(),
    }
}

/// `GET /api/twitch/auth`: exchange the code, persist the pair, 302 back to
/// the livestreams page.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Response {
    let session = state.session(&headers);
    let result = async {
        if let Some(error) = params.error.as_deref() {
            let description = params.error_description.as_deref().unwrap_or("");
            tracing::warn!(error, description, "authorization denied");
            return Err(AppError::BadRequest(format!("authorization denied: {}", error)));
        }

        let code = params
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| AppError::BadRequest("missing authorization code".into()))?;

        match (session.oauth_state(), params.state.as_deref()) {
            (Some(expected), Some(presented)) if expected == presented => {}
            _ => return Err(AppError::BadRequest("OAuth state mismatch".into())),
        }
        session.clear_oauth_state();

        state.tokens.exchange_code(code, &session).await?;
        let site = state.config.site_url.trim_end_matches('/');
        Ok(found(&format!("{}/livestreams", site)))
    }
    .await;

    session.apply(result.into_response())
}

/// `DELETE /api/twitch`: revoke the user token and clear the session cookies.
pub async fn sign_out(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = state.session(&headers);
    let revoked = state.tokens.sign_out(&session).await;
    session.apply(Json(json!({ "revoked": revoked })).into_response())
}
