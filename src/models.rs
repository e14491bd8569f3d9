//! Core data models for the media gateway

use crate::error::Result;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default byte ceiling: 200 MiB
pub const DEFAULT_MAX_BYTES: u64 = 200 * 1024 * 1024;

/// Default fetch time budget in milliseconds
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 30_000;

/// Size and time budget applied to every fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    /// Maximum accepted body size; exactly this many bytes is still accepted
    pub max_bytes: u64,
    /// Deadline for the whole transfer, headers and body
    pub timeout: Duration,
}

impl FetchLimits {
    pub fn new(max_bytes: u64, timeout: Duration) -> Self {
        Self { max_bytes, timeout }
    }

    pub fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            timeout: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
        }
    }
}

/// One inbound fetch request, assembled from the `x-api-key` header and the
/// JSON body. Lives only for the duration of the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub target_url: String,
    pub api_key: Option<String>,
}

/// JSON body accepted by `POST /download` and `POST /extract`
///
/// `url` is kept as a raw JSON value so that a missing or non-string URL is
/// reported as an invalid URL rather than an unparseable body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DownloadBody {
    #[serde(default)]
    pub url: Option<serde_json::Value>,
}

impl DownloadBody {
    /// The URL string, if present, a string, and non-empty
    pub fn url_str(&self) -> Option<&str> {
        self.url
            .as_ref()
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
    }
}

/// A validated, fully buffered media payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    pub bytes: Bytes,
    pub content_type: String,
    pub filename: String,
}

impl FetchedMedia {
    pub fn new(bytes: Bytes, content_type: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            bytes,
            content_type: content_type.into(),
            filename: filename.into(),
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Outcome of a single fetch: the media, or the reason it was refused
pub type FetchOutcome = Result<FetchedMedia>;

/// JSON error body returned on every failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self { error: message.into() }
    }
}

/// True if a content type is accepted as media (`video/*` or `image/*`)
pub fn is_media_content_type(content_type: &str) -> bool {
    let ct = content_type.trim_start().to_ascii_lowercase();
    ct.starts_with("video/") || ct.starts_with("image/")
}
