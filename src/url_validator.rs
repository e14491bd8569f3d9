//! Validation of client-supplied target URLs

use crate::error::{GatewayError, Result};
use url::Url;

/// True if `raw` is an absolute URL with an `http` or `https` scheme
pub fn is_valid_http_url(raw: &str) -> bool {
    match Url::parse(raw) {
        Ok(url) => is_http_scheme(&url),
        Err(_) => false,
    }
}

/// Parse a target URL, rejecting anything the gateway will not fetch
///
/// Beyond [`is_valid_http_url`], the URL must also name a host.
pub fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|_| GatewayError::invalid_url())?;

    if !is_http_scheme(&url) {
        return Err(GatewayError::invalid_url());
    }

    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(GatewayError::invalid_url()),
    }
}

/// Scheme check shared with the redirect policy
pub(crate) fn is_http_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}
