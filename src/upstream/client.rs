/// HTTP client for calling the upstream platform APIs.
/// Wraps reqwest with a per-call timeout and the retry policy in `retry`.
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use url::Url;

use super::retry::{send_with_retry, RetryPolicy};
use crate::config::UpstreamConfig;
use crate::errors::AppError;

/// Upstream bodies quoted in diagnostics are cut to this many bytes.
const MAX_DIAGNOSTIC_BODY: usize = 512;

#[derive(Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    retry: RetryPolicy,
}

/// A single upstream call: target, headers and body, plus the name of the
/// platform it goes to (used in diagnostics and `RateLimited` errors).
#[derive(Debug)]
pub struct UpstreamRequest {
    pub service: &'static str,
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Non-idempotent calls (cart mutations) are never retried.
    pub idempotent: bool,
}

/// Raw upstream response, already fully read.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub retry_after: Option<u64>,
    pub body: Bytes,
}

impl UpstreamRequest {
    pub fn new(service: &'static str, method: Method, url: Url) -> Self {
        let idempotent = method == Method::GET;
        Self {
            service,
            method,
            url,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            idempotent,
        }
    }

    pub fn get(service: &'static str, url: Url) -> Self {
        Self::new(service, Method::GET, url)
    }

    pub fn post(service: &'static str, url: Url) -> Self {
        Self::new(service, Method::POST, url)
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Result<Self, AppError> {
        let value = HeaderValue::from_str(value).map_err(|_| {
            AppError::Configuration(format!("invalid value for header {}", name))
        })?;
        self.headers.insert(HeaderName::from_static(name), value);
        Ok(self)
    }

    pub fn bearer(self, token: &str) -> Result<Self, AppError> {
        self.header("authorization", &format!("Bearer {}", token))
    }

    /// `application/x-www-form-urlencoded` body.
    pub fn form(mut self, fields: &[(&str, &str)]) -> Self {
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        self.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        self.body = Bytes::from(encoded);
        self
    }

    pub fn json<T: Serialize>(mut self, value: &T) -> Result<Self, AppError> {
        let body = serde_json::to_vec(value).map_err(|e| AppError::Internal(e.into()))?;
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.body = Bytes::from(body);
        Ok(self)
    }

    /// Path of the target, safe to log (query strings carry credentials).
    pub fn path(&self) -> &str {
        self.url.path()
    }
}

/// Join `base` and `path` and append query parameters.
pub fn endpoint(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, AppError> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse_with_params(&raw, params)
        .map_err(|e| AppError::Configuration(format!("invalid upstream URL '{}': {}", base, e)))
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .use_rustls_tls()
            .pool_max_idle_per_host(16)
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("fansite-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let retry = RetryPolicy {
            max_retries: config.max_retries,
            base_backoff_ms: config.base_backoff_ms,
            ..RetryPolicy::default()
        };

        Ok(Self { http, retry })
    }

    /// Send the request and read the whole body.
    /// Only transport failures are errors here; any HTTP status is returned.
    pub async fn send(&self, req: UpstreamRequest) -> Result<UpstreamResponse, AppError> {
        tracing::debug!(
            service = req.service,
            method = %req.method,
            path = req.path(),
            "upstream request"
        );

        let retry = if req.idempotent {
            self.retry.clone()
        } else {
            RetryPolicy::none()
        };

        let resp = send_with_retry(
            &self.http,
            req.method.clone(),
            req.url.as_str(),
            req.headers,
            req.body,
            &retry,
        )
        .await
        .map_err(|e| {
            tracing::warn!(service = req.service, "upstream request failed: {:#}", e);
            AppError::UpstreamData(format!("{} request failed: {:#}", req.service, e))
        })?;

        let status = resp.status();
        let retry_after = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = resp.bytes().await.map_err(|e| {
            AppError::UpstreamData(format!(
                "{} response could not be read: {}",
                req.service,
                e.without_url()
            ))
        })?;

        Ok(UpstreamResponse {
            status,
            retry_after,
            body,
        })
    }

    /// Send the request and decode a successful JSON body.
    ///
    /// 429 becomes `RateLimited`, 404 becomes `NotFound`, any other non-2xx
    /// or an undecodable body becomes `UpstreamData`.
    pub async fn fetch_json<T: DeserializeOwned>(&self, req: UpstreamRequest) -> Result<T, AppError> {
        let service = req.service;
        let path = req.path().to_string();
        let resp = self.send(req).await?;
        resp.check(service, &path)?;

        serde_json::from_slice(&resp.body).map_err(|e| {
            tracing::warn!(service, path = %path, "malformed upstream body: {}", e);
            AppError::UpstreamData(format!("{} returned malformed data for {}: {}", service, path, e))
        })
    }
}

impl UpstreamResponse {
    /// Classify a non-success status into the error taxonomy.
    pub fn check(&self, service: &'static str, path: &str) -> Result<(), AppError> {
        match self.status {
            s if s.is_success() => Ok(()),
            StatusCode::TOO_MANY_REQUESTS => {
                tracing::warn!(service, path, retry_after = ?self.retry_after, "upstream rate limited");
                Err(AppError::RateLimited {
                    service: service.to_string(),
                    retry_after: self.retry_after,
                })
            }
            StatusCode::NOT_FOUND => Err(AppError::NotFound(format!(
                "{} resource not found",
                service
            ))),
            s => Err(AppError::UpstreamData(format!(
                "{} returned {} for {}: {}",
                service,
                s.as_u16(),
                path,
                self.body_snippet()
            ))),
        }
    }

    pub fn body_snippet(&self) -> String {
        let end = self.body.len().min(MAX_DIAGNOSTIC_BODY);
        String::from_utf8_lossy(&self.body[..end]).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> UpstreamClient {
        UpstreamClient::new(&UpstreamConfig {
            timeout_secs: 2,
            max_retries: 0,
            base_backoff_ms: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_and_encodes() {
        let url = endpoint("https://api.example.com/v1/", "/products", &[("collection", "a b&c")]).unwrap();
        assert_eq!(url.path(), "/v1/products");
        assert_eq!(url.query(), Some("collection=a+b%26c"));
    }

    #[test]
    fn test_endpoint_rejects_bad_base() {
        assert!(matches!(
            endpoint("not a url", "x", &[]),
            Err(AppError::Configuration(_))
        ));
    }

    #[test]
    fn test_form_body() {
        let url = endpoint("https://id.example.com", "oauth2/token", &[]).unwrap();
        let req = UpstreamRequest::post("twitch", url)
            .form(&[("grant_type", "refresh_token"), ("refresh_token", "a/b")]);
        assert_eq!(req.body, Bytes::from("grant_type=refresh_token&refresh_token=a%2Fb"));
        assert_eq!(req.headers[CONTENT_TYPE], "application/x-www-form-urlencoded");
        assert!(!req.idempotent);
    }

    #[tokio::test]
    async fn test_fetch_json_maps_429_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/streams"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "12"))
            .mount(&server)
            .await;

        let url = endpoint(&server.uri(), "streams", &[]).unwrap();
        let err = client()
            .fetch_json::<serde_json::Value>(UpstreamRequest::get("twitch", url))
            .await
            .unwrap_err();
        match err {
            AppError::RateLimited { service, retry_after } => {
                assert_eq!(service, "twitch");
                assert_eq!(retry_after, Some(12));
            }
            other => panic!("expected RateLimited, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_json_maps_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users"))
            .and(query_param("login", "liefx"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let url = endpoint(&server.uri(), "users", &[("login", "liefx")]).unwrap();
        let err = client()
            .fetch_json::<serde_json::Value>(UpstreamRequest::get("twitch", url))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamData(_)));
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_upstream_data() {
        let url = endpoint("http://127.0.0.1:1", "users", &[]).unwrap();
        let err = client()
            .fetch_json::<serde_json::Value>(UpstreamRequest::get("twitch", url))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamData(_)));
    }
}
