use std::sync::atomic::{AtomicBool, Ordering};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

/// When set, error bodies carry a `detail` field with the raw diagnostic.
static INCLUDE_DETAIL: AtomicBool = AtomicBool::new(false);

/// Toggle upstream detail in error bodies. Called once at startup from config.
pub fn set_include_detail(enabled: bool) {
    INCLUDE_DETAIL.store(enabled, Ordering::Relaxed);
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("upstream auth rejected with status {status}")]
    UpstreamAuth { status: u16, body: String },

    #[error("token refresh rejected: {0}")]
    TokenRefresh(String),

    #[error("rate limited by {service}")]
    RateLimited {
        service: String,
        retry_after: Option<u64>,
    },

    #[error("upstream data error: {0}")]
    UpstreamData(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable identifier used as `errorKind` in response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "ConfigurationError",
            AppError::UpstreamAuth { .. } => "UpstreamAuthError",
            AppError::TokenRefresh(_) => "TokenRefreshError",
            AppError::RateLimited { .. } => "RateLimited",
            AppError::UpstreamData(_) => "UpstreamDataError",
            AppError::NotFound(_) => "NotFound",
            AppError::BadRequest(_) => "BadRequest",
            AppError::Internal(_) => "InternalError",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Configuration(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::UpstreamAuth { .. } | AppError::UpstreamData(_) => StatusCode::BAD_GATEWAY,
            AppError::TokenRefresh(_) => StatusCode::UNAUTHORIZED,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::RateLimited { .. })
    }

    /// Errors that fail the whole request even when raised by a secondary
    /// sub-result: rate limiting, missing configuration and bad identifiers.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AppError::RateLimited { .. } | AppError::Configuration(_) | AppError::BadRequest(_)
        )
    }

    /// Short message that is safe to show to a site visitor.
    fn public_message(&self) -> String {
        match self {
            AppError::Configuration(_) => "service is not configured".to_string(),
            AppError::UpstreamAuth { .. } => "failed to authenticate with upstream service".to_string(),
            AppError::TokenRefresh(_) => "session expired, please reconnect".to_string(),
            AppError::RateLimited { service, .. } => {
                format!("{} is rate limiting requests, retry later", service)
            }
            AppError::UpstreamData(_) => "upstream service unavailable".to_string(),
            AppError::NotFound(what) | AppError::BadRequest(what) => what.clone(),
            AppError::Internal(_) => "internal server error".to_string(),
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            AppError::UpstreamAuth { status, body } => Some(format!("{}: {}", status, body)),
            AppError::Configuration(d) | AppError::TokenRefresh(d) | AppError::UpstreamData(d) => {
                Some(d.clone())
            }
            AppError::Internal(e) => Some(format!("{:#}", e)),
            _ => None,
        }
    }

    /// The `{errorKind, message}` body; `detail` is added only when asked for.
    pub fn to_body(&self, include_detail: bool) -> Value {
        let mut body = json!({
            "errorKind": self.kind(),
            "message": self.public_message(),
        });
        if include_detail {
            if let Some(detail) = self.detail() {
                body["detail"] = Value::String(detail);
            }
        }
        body
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "request failed: {}", self);
        } else {
            tracing::debug!(kind = self.kind(), "request rejected: {}", self);
        }

        let body = Json(self.to_body(INCLUDE_DETAIL.load(Ordering::Relaxed)));
        let mut response = (status, body).into_response();

        if let AppError::RateLimited { retry_after, .. } = &self {
            let secs = retry_after.unwrap_or(60).to_string();
            if let Ok(value) = axum::http::HeaderValue::from_str(&secs) {
                response.headers_mut().insert("retry-after", value);
            }
        }

        response
    }
}
