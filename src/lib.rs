//! Media Gate
//!
//! A gatekeeping download proxy for video and image files. Authenticated
//! clients name a remote URL; the gateway fetches it on their behalf, but only
//! if the target host passes the allow/deny policy, the upstream declares
//! `video/*` or `image/*` content, and the body fits within the configured
//! byte ceiling and time budget. Accepted media is returned as an attachment
//! with a sanitized filename.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use media_gate::{DownloadHandler, GatewayConfig, GatewayServer};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::load(Some("media_gate.yaml"))?;
//! let addr = config.socket_addr()?;
//!
//! let handler = Arc::new(DownloadHandler::new(Arc::new(config))?);
//! GatewayServer::new(handler, addr).start().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`GatewayServer`]: accept loop, one task per connection
//! - [`DownloadHandler`]: routing and the ordered request gates
//! - [`HostPolicy`]: allow/deny decision on the target host
//! - [`MediaFetcher`]: single bounded GET with redirect re-checks
//! - [`BoundedBody`]: byte-counting stream adapter enforcing the ceiling
//! - [`MediaExtractor`]: optional external tool for pages that embed media
//! - [`GatewayMetrics`]: request, transfer and failure counters
//!
//! # Configuration
//!
//! ```yaml
//! listen_address: "0.0.0.0:3000"
//! api_key: "change-me"
//! max_bytes: 209715200        # 200 MiB
//! fetch_timeout_ms: 30000
//! allowed_hostnames:
//!   - "*.example-cdn.com"
//! denied_hostnames:
//!   - "localhost"
//!   - "*.internal"
//! ```
//!
//! The environment may override `listen_address`, `api_key`, `max_bytes`,
//! `fetch_timeout_ms`, both host lists, `log_level`, `extract.enabled` and
//! `extract.binary`. See [`GatewayConfig::apply_env_overrides`].

pub mod bounded_stream;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetcher;
pub mod filename;
pub mod handler;
pub mod host_policy;
pub mod metrics;
pub mod models;
pub mod server;
pub mod url_validator;

// Re-export commonly used types
pub use bounded_stream::BoundedBody;
pub use config::{ExtractConfig, GatewayConfig};
pub use error::{ErrorKind, GatewayError, Result};
pub use extract::{MediaExtractor, YtDlpExtractor};
pub use fetcher::MediaFetcher;
pub use filename::{derive_filename, sanitize_filename};
pub use handler::DownloadHandler;
pub use host_policy::HostPolicy;
pub use metrics::{GatewayMetrics, MetricsSnapshot};
pub use models::{FetchLimits, FetchOutcome, FetchRequest, FetchedMedia};
pub use server::GatewayServer;
pub use url_validator::{is_valid_http_url, parse_http_url};
