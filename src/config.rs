//! Configuration management for the media gateway
//!
//! Configuration is read once at startup: an optional YAML file, then
//! environment overrides, then validation. The resulting snapshot is shared
//! read-only for the lifetime of the process.

use crate::error::{GatewayError, Result};
use crate::host_policy::HostPolicy;
use crate::models::{FetchLimits, DEFAULT_FETCH_TIMEOUT_MS, DEFAULT_MAX_BYTES};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Configuration for the gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Address the HTTP server binds to (default: "0.0.0.0:3000")
    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    /// Shared secret expected in the `x-api-key` header.
    /// When unset, every request is rejected.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Byte ceiling for fetched bodies (default: 200 MiB)
    #[serde(default = "default_max_bytes")]
    pub max_bytes: u64,

    /// Fetch time budget in milliseconds (default: 30000)
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Host patterns that may be fetched; empty means all hosts not denied
    #[serde(default)]
    pub allowed_hostnames: Vec<String>,

    /// Host patterns that may never be fetched
    #[serde(default)]
    pub denied_hostnames: Vec<String>,

    /// User-Agent sent on outbound requests
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Cap on the inbound JSON body (default: 64 KiB)
    #[serde(default = "default_max_request_body")]
    pub max_request_body_bytes: usize,

    /// Route outbound requests through proxies from the environment
    #[serde(default)]
    pub use_env_proxy: bool,

    /// Maximum log level: trace, debug, info, warn or error (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// External extraction tool (optional, disabled by default)
    #[serde(default)]
    pub extract: ExtractConfig,
}

/// Configuration for the external extraction pathway
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractConfig {
    /// Whether `POST /extract` is served (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Executable to invoke; resolved through PATH when not absolute
    #[serde(default = "default_extract_binary")]
    pub binary: String,

    /// Maximum characters kept from a media title when naming the file
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            binary: default_extract_binary(),
            title_max_chars: default_title_max_chars(),
        }
    }
}

// Default value functions for serde
fn default_listen_address() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_max_bytes() -> u64 {
    DEFAULT_MAX_BYTES
}

fn default_fetch_timeout_ms() -> u64 {
    DEFAULT_FETCH_TIMEOUT_MS
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; MediaGate/1.0)".to_string()
}

fn default_max_request_body() -> usize {
    64 * 1024
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_extract_binary() -> String {
    "yt-dlp".to_string()
}

fn default_title_max_chars() -> usize {
    100
}

impl Default for GatewayConfig {
    fn default() -> Self {
        GatewayConfig {
            listen_address: default_listen_address(),
            api_key: None,
            max_bytes: default_max_bytes(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            allowed_hostnames: Vec::new(),
            denied_hostnames: Vec::new(),
            user_agent: default_user_agent(),
            max_request_body_bytes: default_max_request_body(),
            use_env_proxy: false,
            log_level: default_log_level(),
            extract: ExtractConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file
    ///
    /// # Returns
    /// * `Ok(GatewayConfig)` if loading and validation succeed
    /// * `Err(GatewayError)` if the file cannot be read or the config is invalid
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            GatewayError::ConfigError(format!("Failed to read config file: {}", e))
        })?;

        let config = Self::from_yaml(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML text without validating it
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| {
            GatewayError::ConfigError(format!("Failed to parse config file: {}", e))
        })
    }

    /// Build the startup snapshot: file (or defaults), then the process
    /// environment, then validation
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path.as_ref()).map_err(|e| {
                    GatewayError::ConfigError(format!("Failed to read config file: {}", e))
                })?;
                Self::from_yaml(&content)?
            }
            None => Self::default(),
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment-style lookup
    ///
    /// Recognized keys: `LISTEN_ADDRESS`, `API_KEY`, `MAX_BYTES`,
    /// `FETCH_TIMEOUT_MS`, `ALLOWED_HOSTNAMES`, `DENYLIST_HOSTNAMES`,
    /// `LOG_LEVEL`, `EXTRACT_ENABLED`, `EXTRACT_BINARY`. Host lists are
    /// comma separated.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("LISTEN_ADDRESS") {
            self.listen_address = addr;
        }
        if let Some(key) = lookup("API_KEY") {
            self.api_key = Some(key);
        }
        if let Some(raw) = lookup("MAX_BYTES") {
            self.max_bytes = parse_env_number("MAX_BYTES", &raw)?;
        }
        if let Some(raw) = lookup("FETCH_TIMEOUT_MS") {
            self.fetch_timeout_ms = parse_env_number("FETCH_TIMEOUT_MS", &raw)?;
        }
        if let Some(raw) = lookup("ALLOWED_HOSTNAMES") {
            self.allowed_hostnames = split_host_list(&raw);
        }
        if let Some(raw) = lookup("DENYLIST_HOSTNAMES") {
            self.denied_hostnames = split_host_list(&raw);
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            self.log_level = level;
        }
        if let Some(raw) = lookup("EXTRACT_ENABLED") {
            self.extract.enabled = parse_env_bool("EXTRACT_ENABLED", &raw)?;
        }
        if let Some(binary) = lookup("EXTRACT_BINARY") {
            self.extract.binary = binary;
        }
        Ok(())
    }

    /// Validate the configuration
    ///
    /// # Validation Rules
    /// - max_bytes, fetch_timeout_ms and max_request_body_bytes must be > 0
    /// - listen_address must be a socket address
    /// - every host pattern must parse
    /// - log_level must name a tracing level
    /// - extract.binary must be set when extraction is enabled
    pub fn validate(&self) -> Result<()> {
        if self.max_bytes == 0 {
            return Err(GatewayError::ConfigError(
                "max_bytes must be greater than 0".to_string(),
            ));
        }

        if self.fetch_timeout_ms == 0 {
            return Err(GatewayError::ConfigError(
                "fetch_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.max_request_body_bytes == 0 {
            return Err(GatewayError::ConfigError(
                "max_request_body_bytes must be greater than 0".to_string(),
            ));
        }

        self.socket_addr()?;
        self.host_policy()?;
        self.tracing_level()?;

        if self.user_agent.trim().is_empty() {
            return Err(GatewayError::ConfigError(
                "user_agent must not be empty".to_string(),
            ));
        }

        if self.extract.enabled && self.extract.binary.trim().is_empty() {
            return Err(GatewayError::ConfigError(
                "extract.binary must be set when extraction is enabled".to_string(),
            ));
        }

        Ok(())
    }

    /// Fetch budget derived from this configuration
    pub fn limits(&self) -> FetchLimits {
        FetchLimits::new(self.max_bytes, Duration::from_millis(self.fetch_timeout_ms))
    }

    /// Host policy built from the allow and deny lists
    pub fn host_policy(&self) -> Result<HostPolicy> {
        HostPolicy::new(&self.allowed_hostnames, &self.denied_hostnames)
    }

    /// Parsed listen address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_address.parse().map_err(|e| {
            GatewayError::ConfigError(format!(
                "Invalid listen_address '{}': {}",
                self.listen_address, e
            ))
        })
    }

    /// Parsed log level
    pub fn tracing_level(&self) -> Result<tracing::Level> {
        self.log_level.trim().parse().map_err(|_| {
            GatewayError::ConfigError(format!("Invalid log_level '{}'", self.log_level))
        })
    }

    /// True if an API secret is configured
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

fn split_host_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_env_number(key: &str, raw: &str) -> Result<u64> {
    raw.trim().parse::<u64>().map_err(|e| {
        GatewayError::ConfigError(format!("{} must be an unsigned integer, got '{}': {}", key, raw, e))
    })
}

fn parse_env_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(GatewayError::ConfigError(format!(
            "{} must be a boolean, got '{}'",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.max_bytes, 209_715_200);
        assert_eq!(config.fetch_timeout_ms, 30_000);
        assert_eq!(config.listen_address, "0.0.0.0:3000");
        assert!(config.api_key.is_none());
        assert!(!config.extract.enabled);
        assert_eq!(config.extract.title_max_chars, 100);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_limits() {
        let mut config = GatewayConfig::default();
        config.max_bytes = 0;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.fetch_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = GatewayConfig::default();
        config.max_request_body_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_listen_address() {
        let mut config = GatewayConfig::default();
        config.listen_address = "localhost".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_bad_pattern() {
        let mut config = GatewayConfig::default();
        config.denied_hostnames = vec!["*.".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_log_level() {
        let mut config = GatewayConfig::default();
        config.log_level = "DEBUG".to_string();
        assert_eq!(config.tracing_level().unwrap(), tracing::Level::DEBUG);
        config.log_level = "chatty".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_extract_binary() {
        let mut config = GatewayConfig::default();
        config.extract.enabled = true;
        config.extract.binary = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = GatewayConfig::default();
        config
            .apply_env_overrides(env(&[
                ("API_KEY", "s3cret"),
                ("MAX_BYTES", "1024"),
                ("FETCH_TIMEOUT_MS", "500"),
                ("ALLOWED_HOSTNAMES", "*.example.com, cdn.test,,"),
                ("DENYLIST_HOSTNAMES", "bad.example.com"),
                ("EXTRACT_ENABLED", "true"),
            ]))
            .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("s3cret"));
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.limits().timeout, Duration::from_millis(500));
        assert_eq!(config.allowed_hostnames, vec!["*.example.com", "cdn.test"]);
        assert_eq!(config.denied_hostnames, vec!["bad.example.com"]);
        assert!(config.extract.enabled);

        let policy = config.host_policy().unwrap();
        assert!(policy.is_allowed("a.example.com"));
        assert!(!policy.is_allowed("bad.example.com"));
        assert!(!policy.is_allowed("other.org"));
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = GatewayConfig::default();
        assert!(config.apply_env_overrides(env(&[("MAX_BYTES", "200MB")])).is_err());
        assert!(config.apply_env_overrides(env(&[("EXTRACT_ENABLED", "maybe")])).is_err());
    }

    #[test]
    fn test_from_yaml_applies_defaults() {
        let config = GatewayConfig::from_yaml("api_key: abc\nmax_bytes: 4096\n").unwrap();
        assert_eq!(config.api_key.as_deref(), Some("abc"));
        assert_eq!(config.max_bytes, 4096);
        assert_eq!(config.fetch_timeout_ms, 30_000);
        assert!(config.has_api_key());
    }

    #[test]
    fn test_empty_api_key_counts_as_unset() {
        let mut config = GatewayConfig::default();
        config.api_key = Some(String::new());
        assert!(!config.has_api_key());
    }
}
