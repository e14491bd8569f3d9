//! Error types for the media gateway

use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Coarse classification of a [`GatewayError`]
///
/// Used for metrics labels and log fields. Every variant except
/// [`ErrorKind::Internal`] is an expected, caller-actionable outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unauthorized,
    InvalidInput,
    PolicyDenied,
    UpstreamError,
    UnsupportedType,
    TooLarge,
    Timeout,
    MethodNotAllowed,
    NotFound,
    ToolUnavailable,
    ExtractFailed,
    Internal,
}

impl ErrorKind {
    /// All kinds, in a stable order
    pub const ALL: [ErrorKind; 12] = [
        ErrorKind::Unauthorized,
        ErrorKind::InvalidInput,
        ErrorKind::PolicyDenied,
        ErrorKind::UpstreamError,
        ErrorKind::UnsupportedType,
        ErrorKind::TooLarge,
        ErrorKind::Timeout,
        ErrorKind::MethodNotAllowed,
        ErrorKind::NotFound,
        ErrorKind::ToolUnavailable,
        ErrorKind::ExtractFailed,
        ErrorKind::Internal,
    ];

    /// Stable snake_case label
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::PolicyDenied => "policy_denied",
            ErrorKind::UpstreamError => "upstream_error",
            ErrorKind::UnsupportedType => "unsupported_type",
            ErrorKind::TooLarge => "too_large",
            ErrorKind::Timeout => "timeout",
            ErrorKind::MethodNotAllowed => "method_not_allowed",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ToolUnavailable => "tool_unavailable",
            ErrorKind::ExtractFailed => "extract_failed",
            ErrorKind::Internal => "internal",
        }
    }

    pub(crate) fn index(&self) -> usize {
        ErrorKind::ALL
            .iter()
            .position(|k| k == self)
            .unwrap_or(ErrorKind::ALL.len() - 1)
    }
}

/// Error types that can occur while gating, fetching, or relaying media
#[derive(Error, Debug, Clone)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Missing or invalid API key")]
    Unauthorized,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Policy denied: {0}")]
    PolicyDenied(String),

    #[error("Upstream returned status {status}")]
    UpstreamStatus { status: u16 },

    #[error("Unsupported content type: {0:?}")]
    UnsupportedType(String),

    #[error("Response exceeds the byte ceiling of {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Fetch timed out after {0} ms")]
    Timeout(u64),

    #[error("Method {0} not allowed")]
    MethodNotAllowed(String),

    #[error("No route for {0}")]
    NotFound(String),

    #[error("Extraction tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Extraction failed: {0}")]
    ExtractFailed(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        GatewayError::InternalError(err.to_string())
    }
}

impl GatewayError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Unauthorized => ErrorKind::Unauthorized,
            GatewayError::InvalidInput(_) => ErrorKind::InvalidInput,
            GatewayError::PolicyDenied(_) => ErrorKind::PolicyDenied,
            GatewayError::UpstreamStatus { .. } => ErrorKind::UpstreamError,
            GatewayError::UnsupportedType(_) => ErrorKind::UnsupportedType,
            GatewayError::TooLarge { .. } => ErrorKind::TooLarge,
            GatewayError::Timeout(_) => ErrorKind::Timeout,
            GatewayError::MethodNotAllowed(_) => ErrorKind::MethodNotAllowed,
            GatewayError::NotFound(_) => ErrorKind::NotFound,
            GatewayError::ToolUnavailable(_) => ErrorKind::ToolUnavailable,
            GatewayError::ExtractFailed(_) => ErrorKind::ExtractFailed,
            GatewayError::ConfigError(_) | GatewayError::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Convert error to HTTP status code
    ///
    /// Upstream failures, policy rejections and size violations are all
    /// reported to the caller as 400; only timeouts, missing tooling and
    /// internal failures get distinct codes.
    pub fn to_http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::Unauthorized => 401,
            ErrorKind::InvalidInput
            | ErrorKind::PolicyDenied
            | ErrorKind::UpstreamError
            | ErrorKind::UnsupportedType
            | ErrorKind::TooLarge
            | ErrorKind::ExtractFailed => 400,
            ErrorKind::NotFound => 404,
            ErrorKind::MethodNotAllowed => 405,
            ErrorKind::Timeout => 408,
            ErrorKind::ToolUnavailable => 503,
            ErrorKind::Internal => 500,
        }
    }

    /// Message returned in the `{"error": ...}` body
    ///
    /// Internal failures never leak their detail.
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::Unauthorized => "Unauthorized - Invalid API key".to_string(),
            GatewayError::InvalidInput(msg) => msg.clone(),
            GatewayError::PolicyDenied(_) => "Host not allowed".to_string(),
            GatewayError::UpstreamStatus { status } => {
                format!("Failed to fetch resource: {}", status)
            }
            GatewayError::UnsupportedType(_) => "Not video/image".to_string(),
            GatewayError::TooLarge { .. } => "File too large".to_string(),
            GatewayError::Timeout(_) => "Timeout fetching resource".to_string(),
            GatewayError::MethodNotAllowed(_) => "Method not allowed".to_string(),
            GatewayError::NotFound(_) => "Not found".to_string(),
            GatewayError::ToolUnavailable(msg) => msg.clone(),
            GatewayError::ExtractFailed(msg) => msg.clone(),
            GatewayError::ConfigError(_) | GatewayError::InternalError(_) => {
                "Internal server error".to_string()
            }
        }
    }

    /// Shorthand for the canonical invalid-URL rejection
    pub fn invalid_url() -> Self {
        GatewayError::InvalidInput("Invalid URL".to_string())
    }
}
