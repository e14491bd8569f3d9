//! External media extraction
//!
//! Some pages do not link media directly; an extraction tool can resolve and
//! download them instead. The tool runs outside the gateway's trust
//! boundary, so it is only reachable through [`MediaExtractor`], invoked with
//! argument arrays (never a shell string), bounded by the same
//! [`FetchLimits`] as direct fetches, and disabled unless configured.

use crate::config::ExtractConfig;
use crate::error::{GatewayError, Result};
use crate::filename::{
    content_type_for_extension, sanitize_filename, FALLBACK_EXTENSION, FALLBACK_STEM,
};
use crate::models::{is_media_content_type, FetchLimits, FetchOutcome, FetchedMedia};
use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, info, warn};
use url::Url;

/// An alternate fetch source for URLs that need resolving
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Resolve and download the media behind `url` within `limits`
    async fn extract(&self, url: &Url, limits: &FetchLimits) -> FetchOutcome;
}

/// Metadata printed by the tool's `--dump-json` run
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct MediaInfo {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub ext: Option<String>,
    #[serde(default)]
    pub filesize: Option<u64>,
    #[serde(default)]
    pub filesize_approx: Option<u64>,
}

impl MediaInfo {
    /// Best known size: exact if reported, otherwise the estimate
    pub fn reported_size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }

    /// Parse the first JSON object line out of the `--dump-json` stdout
    pub fn from_dump_output(stdout: &str) -> Result<Self> {
        let line = stdout
            .lines()
            .map(str::trim)
            .find(|line| line.starts_with('{'))
            .ok_or_else(|| {
                GatewayError::ExtractFailed("No media information returned by extractor".to_string())
            })?;

        serde_json::from_str(line).map_err(|e| {
            GatewayError::ExtractFailed(format!("Unreadable media information: {}", e))
        })
    }
}

/// Extractor backed by a yt-dlp compatible executable
pub struct YtDlpExtractor {
    binary: PathBuf,
    title_max_chars: usize,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<PathBuf>, title_max_chars: usize) -> Self {
        Self {
            binary: binary.into(),
            title_max_chars,
        }
    }

    pub fn from_config(config: &ExtractConfig) -> Self {
        Self::new(&config.binary, config.title_max_chars)
    }

    async fn run(&self, args: &[&str], limits: &FetchLimits) -> Result<Output> {
        debug!("Running extractor {:?} {:?}", self.binary, args);

        let child = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    GatewayError::ToolUnavailable(format!(
                        "Extraction tool '{}' is not installed",
                        self.binary.display()
                    ))
                } else {
                    GatewayError::InternalError(format!("Failed to start extractor: {}", e))
                }
            })?;

        let output = tokio::time::timeout(limits.timeout, child.wait_with_output())
            .await
            .map_err(|_| GatewayError::Timeout(limits.timeout_ms()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(
                "Extractor exited with {}: {}",
                output.status,
                stderr.lines().last().unwrap_or("")
            );
            return Err(GatewayError::ExtractFailed(
                "Failed to extract media. This might not be a supported URL.".to_string(),
            ));
        }

        Ok(output)
    }

    async fn read_metadata(&self, url: &Url, limits: &FetchLimits) -> Result<MediaInfo> {
        let output = self
            .run(&["--dump-json", "--no-download", "--", url.as_str()], limits)
            .await?;
        MediaInfo::from_dump_output(&String::from_utf8_lossy(&output.stdout))
    }

    fn filename_for(&self, info: &MediaInfo, ext: &str) -> String {
        let title = info
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(FALLBACK_STEM);
        let stem: String = sanitize_filename(title)
            .chars()
            .take(self.title_max_chars)
            .collect();
        format!("{}.{}", stem, ext)
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn extract(&self, url: &Url, limits: &FetchLimits) -> FetchOutcome {
        let info = self.read_metadata(url, limits).await?;

        if let Some(size) = info.reported_size() {
            if size > limits.max_bytes {
                warn!(
                    "Extractor reports {} bytes for url={}, over max_bytes={}",
                    size, url, limits.max_bytes
                );
                return Err(GatewayError::TooLarge {
                    limit: limits.max_bytes,
                });
            }
        }

        // Removed on drop, whichever way this function exits.
        let scratch = tempfile::Builder::new().prefix("media-gate-").tempdir()?;
        let template = scratch.path().join(format!("{}.%(ext)s", FALLBACK_STEM));
        let template = template.to_string_lossy();
        let format = format!("best[filesize<{}]", limits.max_bytes);

        self.run(
            &["-f", &format, "--no-playlist", "-o", &template, "--", url.as_str()],
            limits,
        )
        .await?;

        let path = find_download(scratch.path()).await?;
        let size = tokio::fs::metadata(&path).await?.len();
        if size > limits.max_bytes {
            return Err(GatewayError::TooLarge {
                limit: limits.max_bytes,
            });
        }

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .or_else(|| info.ext.clone())
            .unwrap_or_else(|| FALLBACK_EXTENSION.to_string());

        let content_type = content_type_for_extension(&ext);
        if !is_media_content_type(content_type) {
            warn!("Extractor produced non-media file for url={}: ext={}", url, ext);
            return Err(GatewayError::UnsupportedType(ext));
        }

        let bytes = Bytes::from(tokio::fs::read(&path).await?);
        let filename = self.filename_for(&info, &ext);
        info!(
            "Extracted url={}: size={} content_type={} filename={}",
            url, size, content_type, filename
        );

        Ok(FetchedMedia::new(bytes, content_type, filename))
    }
}

/// Locate the single file the tool wrote into the scratch directory
async fn find_download(dir: &Path) -> Result<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();
        // Partial downloads left behind by an interrupted run.
        if name.ends_with(".part") || name.ends_with(".ytdl") {
            continue;
        }
        if entry.file_type().await?.is_file() {
            return Ok(path);
        }
    }
    Err(GatewayError::InternalError(
        "Extraction completed but no file was produced".to_string(),
    ))
}
