//! Error taxonomy for the memory core.
//!
//! Configuration and not-initialized errors are always surfaced to the caller.
//! Backing-store failures of any kind (SQLite, filesystem, payload encoding)
//! collapse into [`Error::Store`]. Remote embedding failures carry a normalized
//! [`ProviderErrorCode`] so callers can decide whether to retry.

use serde::Serialize;

pub type Result<T> = std::result::Result<T, Error>;

/// Normalized failure classes for remote embedding providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorCode {
    RateLimited,
    InvalidRequest,
    ModelNotFound,
    ServerError,
    Timeout,
    NetworkError,
    Unknown,
}

impl ProviderErrorCode {
    /// Map an HTTP status code from a provider response.
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => Self::RateLimited,
            400 | 401 | 403 | 422 => Self::InvalidRequest,
            404 => Self::ModelNotFound,
            500..=599 => Self::ServerError,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::InvalidRequest => "invalid_request",
            Self::ModelNotFound => "model_not_found",
            Self::ServerError => "server_error",
            Self::Timeout => "timeout",
            Self::NetworkError => "network_error",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProviderErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing credential, unknown provider, invalid dimension request.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A scope accessor was called before `initialize()` or after `close()`.
    #[error("memory scopes are not initialized")]
    NotInitialized,

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// I/O or backing-store failure.
    #[error("store error: {0}")]
    Store(String),

    #[error("embedding provider error ({code}): {message}")]
    Provider {
        code: ProviderErrorCode,
        message: String,
    },

    /// Two vectors of different length were compared.
    #[error("vector dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// A stored payload does not match the shape its block type requires.
    #[error("invalid {block_type} content: {reason}")]
    InvalidContent {
        block_type: String,
        reason: String,
    },
}

impl Error {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn provider(code: ProviderErrorCode, message: impl Into<String>) -> Self {
        Self::Provider {
            code,
            message: message.into(),
        }
    }

    /// Whether this is a not-found error (used by callers that treat absence as benign).
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(format!("serialization failed: {err}"))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let code = if err.is_timeout() {
            ProviderErrorCode::Timeout
        } else if err.is_connect() || err.is_request() {
            ProviderErrorCode::NetworkError
        } else if let Some(status) = err.status() {
            ProviderErrorCode::from_status(status.as_u16())
        } else {
            ProviderErrorCode::Unknown
        };
        Self::provider(code, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_provider_codes() {
        assert_eq!(ProviderErrorCode::from_status(429), ProviderErrorCode::RateLimited);
        assert_eq!(ProviderErrorCode::from_status(400), ProviderErrorCode::InvalidRequest);
        assert_eq!(ProviderErrorCode::from_status(401), ProviderErrorCode::InvalidRequest);
        assert_eq!(ProviderErrorCode::from_status(404), ProviderErrorCode::ModelNotFound);
        assert_eq!(ProviderErrorCode::from_status(503), ProviderErrorCode::ServerError);
        assert_eq!(ProviderErrorCode::from_status(302), ProviderErrorCode::Unknown);
    }

    #[test]
    fn display_includes_context() {
        let err = Error::not_found("block", "abc");
        assert_eq!(err.to_string(), "block not found: abc");
        assert!(err.is_not_found());

        let err = Error::provider(ProviderErrorCode::RateLimited, "slow down");
        assert!(err.to_string().contains("rate_limited"));
        assert!(err.to_string().contains("slow down"));
    }
}
