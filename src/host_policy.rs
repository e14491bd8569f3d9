//! Hostname allow/deny policy
//!
//! Patterns are either exact hostnames (`cdn.example.com`) or wildcard
//! domains (`*.example.com`), where a wildcard matches the domain itself and
//! every subdomain below it. A deny match always wins over an allow match.
//!
//! Hosts and patterns are compared case-insensitively, and a single trailing
//! dot on a fully-qualified host is ignored, so `EVIL.com.` is treated the
//! same as `evil.com`.

use crate::error::{GatewayError, Result};
use tracing::debug;

/// A single host pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostPattern {
    /// Matches one hostname exactly
    Exact(String),
    /// Matches `domain` and any host ending in `.domain`
    Wildcard(String),
}

impl HostPattern {
    /// Parse a pattern, normalizing case and surrounding whitespace
    ///
    /// Returns `Ok(None)` for blank entries, which configuration lists often
    /// carry after splitting on commas.
    pub fn parse(raw: &str) -> Result<Option<Self>> {
        let pattern = raw.trim().to_ascii_lowercase();
        if pattern.is_empty() {
            return Ok(None);
        }

        if let Some(domain) = pattern.strip_prefix("*.") {
            let domain = normalize_host(domain);
            if domain.is_empty() || domain.contains('*') {
                return Err(GatewayError::ConfigError(format!(
                    "Invalid wildcard host pattern '{}'",
                    raw.trim()
                )));
            }
            return Ok(Some(HostPattern::Wildcard(domain.to_string())));
        }

        if pattern.contains('*') {
            return Err(GatewayError::ConfigError(format!(
                "Wildcards are only supported as a leading '*.' in '{}'",
                raw.trim()
            )));
        }

        Ok(Some(HostPattern::Exact(normalize_host(&pattern).to_string())))
    }

    /// Check a host that has already been normalized
    fn matches(&self, host: &str) -> bool {
        match self {
            HostPattern::Exact(name) => host == name,
            HostPattern::Wildcard(domain) => {
                host == domain
                    || (host.len() > domain.len()
                        && host.ends_with(domain.as_str())
                        && host.as_bytes()[host.len() - domain.len() - 1] == b'.')
            }
        }
    }
}

/// Process-wide host policy built once from configuration
#[derive(Debug, Clone, Default)]
pub struct HostPolicy {
    allow: Vec<HostPattern>,
    deny: Vec<HostPattern>,
}

impl HostPolicy {
    /// Build a policy from raw allow and deny pattern lists
    pub fn new<A, D>(allow: A, deny: D) -> Result<Self>
    where
        A: IntoIterator,
        A::Item: AsRef<str>,
        D: IntoIterator,
        D::Item: AsRef<str>,
    {
        Ok(HostPolicy {
            allow: parse_patterns(allow)?,
            deny: parse_patterns(deny)?,
        })
    }

    /// A policy with no patterns: every host is allowed
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// True if the host matches any deny pattern
    pub fn is_denied(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let host = normalize_host(&host);
        self.deny.iter().any(|p| p.matches(host))
    }

    /// Decide whether outbound fetches to `host` are permitted
    ///
    /// An empty allow-list means default-allow; a non-empty one means
    /// default-deny. The deny-list is consulted in both cases and wins.
    pub fn is_allowed(&self, host: &str) -> bool {
        let lowered = host.to_ascii_lowercase();
        let normalized = normalize_host(&lowered);

        if self.deny.iter().any(|p| p.matches(normalized)) {
            debug!("Host {} matched a deny pattern", normalized);
            return false;
        }

        if self.allow.is_empty() {
            return true;
        }

        let allowed = self.allow.iter().any(|p| p.matches(normalized));
        if !allowed {
            debug!("Host {} matched no allow pattern", normalized);
        }
        allowed
    }

    /// Check a host and turn a rejection into a [`GatewayError::PolicyDenied`]
    pub fn check(&self, host: &str) -> Result<()> {
        if self.is_allowed(host) {
            Ok(())
        } else {
            Err(GatewayError::PolicyDenied(format!("host '{}' is not allowed", host)))
        }
    }

    pub fn allow_patterns(&self) -> &[HostPattern] {
        &self.allow
    }

    pub fn deny_patterns(&self) -> &[HostPattern] {
        &self.deny
    }
}

fn parse_patterns<I>(patterns: I) -> Result<Vec<HostPattern>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    let mut parsed = Vec::new();
    for raw in patterns {
        if let Some(pattern) = HostPattern::parse(raw.as_ref())? {
            parsed.push(pattern);
        }
    }
    Ok(parsed)
}

/// Strip one trailing root dot from an already-lowercased host
fn normalize_host(host: &str) -> &str {
    host.strip_suffix('.').unwrap_or(host)
}
