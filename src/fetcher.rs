//! Bounded media fetcher
//!
//! Performs the single outbound GET of a download request under the
//! configured byte ceiling and time budget, and refuses anything that is not
//! declared as video or image content.

use crate::bounded_stream::collect_bounded;
use crate::error::{GatewayError, Result};
use crate::filename::derive_filename;
use crate::host_policy::HostPolicy;
use crate::models::{is_media_content_type, FetchLimits, FetchOutcome, FetchedMedia};
use crate::url_validator::is_http_scheme;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, LOCATION, USER_AGENT};
use reqwest::{redirect, Client};
use std::error::Error as StdError;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Maximum redirect hops followed for one fetch
pub const MAX_REDIRECTS: usize = 10;

/// Returned from the redirect policy when a hop fails host or scheme checks
#[derive(Debug, thiserror::Error)]
#[error("redirect to {0} blocked by host policy")]
struct RedirectBlocked(String);

/// MediaFetcher performs budgeted GET requests against upstream hosts
pub struct MediaFetcher {
    client: Client,
    limits: FetchLimits,
    user_agent: String,
}

impl MediaFetcher {
    /// Create a fetcher whose redirects are re-checked against `policy`
    pub fn new(
        limits: FetchLimits,
        policy: Arc<HostPolicy>,
        user_agent: impl Into<String>,
        use_env_proxy: bool,
    ) -> Result<Self> {
        let mut builder = Client::builder().redirect(gated_redirect_policy(policy));
        if !use_env_proxy {
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|e| GatewayError::InternalError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(MediaFetcher {
            client,
            limits,
            user_agent: user_agent.into(),
        })
    }

    /// Create a fetcher with no host restrictions on redirects
    pub fn with_limits(limits: FetchLimits) -> Result<Self> {
        Self::new(
            limits,
            Arc::new(HostPolicy::allow_all()),
            "Mozilla/5.0 (compatible; MediaGate/1.0)",
            false,
        )
    }

    pub fn limits(&self) -> &FetchLimits {
        &self.limits
    }

    /// Fetch `url` and return its body if it is acceptable media
    ///
    /// Steps, each failing fast:
    /// 1. GET with the fixed User-Agent, raced against the deadline
    /// 2. unfollowed redirect -> `PolicyDenied`; other non-2xx -> `UpstreamStatus`
    /// 3. content-type not `video/*` or `image/*` -> `UnsupportedType`
    /// 4. declared content-length over the ceiling -> `TooLarge`, body unread
    /// 5. streamed body over the ceiling -> `TooLarge`, buffer discarded
    ///
    /// The deadline covers the whole transfer. Dropping the request future
    /// or body stream on any failure closes the upstream connection.
    pub async fn fetch(&self, url: &Url) -> FetchOutcome {
        let deadline = Instant::now() + self.limits.timeout;
        debug!("Fetching url={} limits={:?}", url, self.limits);

        let request = self
            .client
            .get(url.clone())
            .header(USER_AGENT, self.user_agent.as_str())
            .send();

        let response = match tokio::time::timeout_at(deadline, request).await {
            Err(_) => {
                warn!("Timed out waiting for response headers from url={}", url);
                return Err(GatewayError::Timeout(self.limits.timeout_ms()));
            }
            Ok(Err(e)) => return Err(self.map_send_error(url, e)),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        // A redirect reqwest handed back unfollowed points somewhere it will not
        // go, such as a non-http scheme.
        if status.is_redirection() && response.headers().contains_key(LOCATION) {
            warn!(
                "Unfollowed redirect from url={}: status={} location={:?}",
                url,
                status,
                response.headers().get(LOCATION)
            );
            return Err(GatewayError::PolicyDenied(format!(
                "redirect from {} was not followed",
                url
            )));
        }

        if !status.is_success() {
            warn!("Upstream returned non-success for url={}: status={}", url, status);
            return Err(GatewayError::UpstreamStatus {
                status: status.as_u16(),
            });
        }

        let headers = response.headers();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.trim().to_string())
            .unwrap_or_default();

        if !is_media_content_type(&content_type) {
            warn!("Rejecting url={}: content_type={:?}", url, content_type);
            return Err(GatewayError::UnsupportedType(content_type));
        }

        let declared_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        if let Some(length) = declared_length {
            if length > self.limits.max_bytes {
                warn!(
                    "Rejecting url={}: declared content_length={} exceeds max_bytes={}",
                    url, length, self.limits.max_bytes
                );
                return Err(GatewayError::TooLarge {
                    limit: self.limits.max_bytes,
                });
            }
        }

        let body = collect_bounded(
            Box::pin(response.bytes_stream()),
            self.limits.max_bytes,
            deadline,
            self.limits.timeout,
        )
        .await?;

        let filename = derive_filename(url.as_str(), Some(&content_type));
        info!(
            "Fetched url={}: size={} content_type={} filename={}",
            url,
            body.len(),
            content_type,
            filename
        );

        Ok(FetchedMedia::new(body, content_type, filename))
    }

    fn map_send_error(&self, url: &Url, err: reqwest::Error) -> GatewayError {
        if err.is_timeout() {
            return GatewayError::Timeout(self.limits.timeout_ms());
        }
        if err.is_redirect() {
            if let Some(blocked) = find_source::<RedirectBlocked>(&err) {
                warn!("Redirect from url={} blocked: {}", url, blocked);
                return GatewayError::PolicyDenied(blocked.to_string());
            }
        }
        GatewayError::InternalError(format!("Request to {} failed: {}", url, err))
    }
}

/// Follow redirects only to http(s) URLs whose host passes `policy`
fn gated_redirect_policy(policy: Arc<HostPolicy>) -> redirect::Policy {
    redirect::Policy::custom(move |attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            return attempt.error("too many redirects");
        }

        let target = attempt.url();
        let allowed = is_http_scheme(target)
            && target.host_str().is_some_and(|host| policy.is_allowed(host));

        if allowed {
            attempt.follow()
        } else {
            let blocked = RedirectBlocked(target.to_string());
            attempt.error(blocked)
        }
    })
}

fn find_source<'a, T: StdError + 'static>(err: &'a (dyn StdError + 'static)) -> Option<&'a T> {
    let mut current = err.source();
    while let Some(source) = current {
        if let Some(found) = source.downcast_ref::<T>() {
            return Some(found);
        }
        current = source.source();
    }
    None
}
