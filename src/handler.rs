//! HTTP request handling for the gateway routes
//!
//! Routes:
//! - `POST /download` - fetch a media URL directly and return its bytes
//! - `POST /extract` - resolve a media URL through the external extractor
//! - `GET /health` - liveness check
//! - `GET /metrics` - Prometheus text metrics
//!
//! Every media request passes the same gates in order: API key, request
//! body, URL validation, host policy. The first failing gate answers the
//! request; nothing is sent upstream until all of them pass.

use crate::config::GatewayConfig;
use crate::error::{ErrorKind, GatewayError, Result};
use crate::extract::{MediaExtractor, YtDlpExtractor};
use crate::fetcher::MediaFetcher;
use crate::host_policy::HostPolicy;
use crate::metrics::{format_prometheus_metrics, GatewayMetrics};
use crate::models::{DownloadBody, ErrorBody, FetchOutcome, FetchRequest, FetchedMedia};
use crate::url_validator::parse_http_url;
use bytes::Bytes;
use http::header::{
    HeaderValue, CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE,
};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Body;
use serde::Serialize;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Header carrying the shared API secret
pub const API_KEY_HEADER: &str = "x-api-key";

/// Which media pathway a request targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaRoute {
    Download,
    Extract,
}

/// Request handler shared by every connection
pub struct DownloadHandler {
    config: Arc<GatewayConfig>,
    policy: Arc<HostPolicy>,
    fetcher: MediaFetcher,
    extractor: Option<Arc<dyn MediaExtractor>>,
    metrics: Arc<GatewayMetrics>,
}

impl DownloadHandler {
    /// Build the handler and its collaborators from a validated config
    pub fn new(config: Arc<GatewayConfig>) -> Result<Self> {
        let policy = Arc::new(config.host_policy()?);
        let fetcher = MediaFetcher::new(
            config.limits(),
            Arc::clone(&policy),
            config.user_agent.clone(),
            config.use_env_proxy,
        )?;

        let extractor: Option<Arc<dyn MediaExtractor>> = if config.extract.enabled {
            info!("Extraction enabled using '{}'", config.extract.binary);
            Some(Arc::new(YtDlpExtractor::from_config(&config.extract)))
        } else {
            None
        };

        Ok(Self {
            config,
            policy,
            fetcher,
            extractor,
            metrics: Arc::new(GatewayMetrics::new()),
        })
    }

    /// Replace the extractor, enabling `POST /extract`
    pub fn with_extractor(mut self, extractor: Arc<dyn MediaExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn metrics(&self) -> Arc<GatewayMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Route and answer one request
    pub async fn handle<B>(&self, req: Request<B>) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        debug!("{} {}", req.method(), req.uri().path());

        let route = match req.uri().path() {
            "/download" => Some(MediaRoute::Download),
            "/extract" => Some(MediaRoute::Extract),
            _ => None,
        };

        match (route, req.method()) {
            (Some(route), &Method::POST) => self.serve_media(req, route).await,
            (Some(_), method) => {
                let err = GatewayError::MethodNotAllowed(method.to_string());
                self.metrics.record_failure(err.kind());
                error_response(&err)
            }
            (None, &Method::GET) if req.uri().path() == "/health" => health_response(),
            (None, &Method::GET) if req.uri().path() == "/metrics" => {
                metrics_response(&self.metrics)
            }
            (None, _) => {
                let err = GatewayError::NotFound(req.uri().path().to_string());
                self.metrics.record_failure(err.kind());
                error_response(&err)
            }
        }
    }

    async fn serve_media<B>(&self, req: Request<B>, route: MediaRoute) -> Response<Full<Bytes>>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        self.metrics.record_request();
        let started = Instant::now();

        let outcome = match self.process(req, route).await {
            Ok(media) => media_response(media),
            Err(e) => Err(e),
        };

        match outcome {
            Ok((response, size)) => {
                self.metrics.record_success(size, started.elapsed());
                response
            }
            Err(e) => {
                self.metrics.record_failure(e.kind());
                match e.kind() {
                    ErrorKind::Internal => error!("{:?} request failed: {}", route, e),
                    _ => warn!("{:?} request rejected: {}", route, e),
                }
                error_response(&e)
            }
        }
    }

    async fn process<B>(&self, req: Request<B>, route: MediaRoute) -> FetchOutcome
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let api_key = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        self.check_auth(api_key.as_deref())?;

        let extractor = match route {
            MediaRoute::Extract => Some(self.extractor.as_ref().ok_or_else(|| {
                GatewayError::ToolUnavailable("Extraction is disabled".to_string())
            })?),
            MediaRoute::Download => None,
        };

        let body = self.read_body(req.into_body()).await?;
        let request = FetchRequest {
            target_url: body.url_str().ok_or_else(GatewayError::invalid_url)?.to_string(),
            api_key,
        };

        let url = parse_http_url(&request.target_url)?;
        let host = url.host_str().unwrap_or_default();
        self.policy.check(host)?;

        match extractor {
            Some(extractor) => extractor.extract(&url, self.fetcher.limits()).await,
            None => self.fetcher.fetch(&url).await,
        }
    }

    /// Compare the supplied key to the configured secret in constant time
    ///
    /// With no secret configured every request is refused.
    fn check_auth(&self, provided: Option<&str>) -> Result<()> {
        let expected = match self.config.api_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => return Err(GatewayError::Unauthorized),
        };

        match provided {
            Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => Ok(()),
            _ => Err(GatewayError::Unauthorized),
        }
    }

    async fn read_body<B>(&self, body: B) -> Result<DownloadBody>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn StdError + Send + Sync>>,
    {
        let invalid = || GatewayError::InvalidInput("Invalid request body".to_string());

        let collected = Limited::new(body, self.config.max_request_body_bytes)
            .collect()
            .await
            .map_err(|e| {
                debug!("Failed to read request body: {}", e);
                invalid()
            })?;

        serde_json::from_slice(&collected.to_bytes()).map_err(|e| {
            debug!("Request body is not valid JSON: {}", e);
            invalid()
        })
    }
}

/// Constant-time byte comparison
///
/// Only the length comparison short-circuits; equal-length inputs are always
/// scanned in full.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Build the success response and report its size
fn media_response(media: FetchedMedia) -> Result<(Response<Full<Bytes>>, u64)> {
    let header_error =
        |e: http::header::InvalidHeaderValue| GatewayError::InternalError(format!("Invalid response header: {}", e));

    let content_type = HeaderValue::from_str(&media.content_type).map_err(header_error)?;
    let disposition =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", media.filename))
            .map_err(header_error)?;
    let size = media.len();

    let mut response = Response::new(Full::new(media.bytes));
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, content_type);
    headers.insert(CONTENT_DISPOSITION, disposition);
    headers.insert(CONTENT_LENGTH, HeaderValue::from(size));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));

    Ok((response, size))
}

/// Build a JSON response
fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let json = serde_json::to_vec(body).unwrap_or_else(|_| b"{}".to_vec());
    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
        .headers_mut()
        .insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

/// Build the `{"error": ...}` response for a failure
pub fn error_response(err: &GatewayError) -> Response<Full<Bytes>> {
    let status =
        StatusCode::from_u16(err.to_http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    json_response(status, &ErrorBody::new(err.client_message()))
}

fn health_response() -> Response<Full<Bytes>> {
    json_response(StatusCode::OK, &serde_json::json!({ "status": "healthy" }))
}

fn metrics_response(metrics: &GatewayMetrics) -> Response<Full<Bytes>> {
    let body = format_prometheus_metrics(&metrics.get_stats());
    let mut response = Response::new(Full::new(Bytes::from(body)));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4; charset=utf-8"),
    );
    response
}
