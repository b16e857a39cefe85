//! Error types shared by the session, paginator, resolver and downloader.
//!
//! Every variant carries enough context (URL or path, status code) for the
//! caller to log or display a meaningful diagnostic. Nothing in this crate
//! retries on its own; [`FetchError::kind`] tells the caller which failures
//! are worth retrying.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of a [`FetchError`].
///
/// | Kind | Examples | Retriable |
/// |------|----------|-----------|
/// | `Auth` | 401, 403, 407, rejected OAuth credentials | no (re-authenticate) |
/// | `Transient` | timeouts, connection drops, 408, 429, 5xx, truncated body | yes |
/// | `Decode` | body not parseable as the expected schema | no |
/// | `NotFound` | 404, 410 | caller decides |
/// | `Permanent` | other 4xx, invalid input, local I/O | no |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credentials were rejected.
    Auth,
    /// Network, timeout or server-side failure.
    Transient,
    /// Malformed response body.
    Decode,
    /// Resource or attachment absent.
    NotFound,
    /// Anything that will not succeed by repeating the same call.
    Permanent,
}

/// Errors raised by network-facing operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Credentials rejected by the server (or by the OAuth token endpoint).
    #[error("[AUTH] credentials rejected (HTTP {status}) for {url}: {detail}")]
    Auth {
        /// The URL that rejected the credentials.
        url: String,
        /// The HTTP status code (0 when the rejection came from a response body).
        status: u16,
        /// Human-readable detail.
        detail: String,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// Network-level error (DNS resolution, connection refused, reset mid-body, TLS).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// Server-side failure (5xx) or request timeout status (408).
    #[error("server error HTTP {status} fetching {url}")]
    Server {
        /// The URL that failed.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Server asked us to slow down (429).
    #[error("rate limited fetching {url} (retry after: {})", retry_after.as_deref().unwrap_or("unspecified"))]
    RateLimited {
        /// The URL that was throttled.
        url: String,
        /// Raw `Retry-After` header value, if present.
        retry_after: Option<String>,
    },

    /// Resource does not exist (404, 410).
    #[error("not found (HTTP {status}): {url}")]
    NotFound {
        /// The URL that was not found.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Any other non-success status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that failed.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// Response body could not be decoded into the expected structure.
    #[error("could not decode response from {url}: {reason}")]
    Decode {
        /// The URL whose body was malformed.
        url: String,
        /// What was wrong with it.
        reason: String,
    },

    /// Body ended before the advertised `Content-Length` was received.
    #[error("truncated transfer into {path}: expected {expected_bytes} bytes, got {actual_bytes}")]
    Truncated {
        /// Temporary file that received the short body.
        path: PathBuf,
        /// Bytes announced by the server.
        expected_bytes: u64,
        /// Bytes actually received.
        actual_bytes: u64,
    },

    /// Local file system error.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The provided URL is malformed or cannot be joined onto the session base.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The offending URL or path.
        url: String,
    },

    /// Page size is zero or larger than the page source serves.
    #[error("invalid page size {value}: {reason}")]
    InvalidPageSize {
        /// The rejected value.
        value: u32,
        /// Which bound was violated.
        reason: &'static str,
    },

    /// Worker count must be a positive integer.
    #[error("invalid worker count {value}: must be at least 1")]
    InvalidWorkers {
        /// The rejected value.
        value: usize,
    },

    /// A pagination worker task died without producing a result.
    #[error("pagination worker failed: {reason}")]
    Worker {
        /// Join error description.
        reason: String,
    },
}

impl FetchError {
    /// Creates an auth error.
    pub fn auth(url: impl Into<String>, status: u16, detail: impl Into<String>) -> Self {
        Self::Auth {
            url: url.into(),
            status,
            detail: detail.into(),
        }
    }

    /// Creates a transport error, promoting reqwest timeouts to [`FetchError::Timeout`].
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates a decode error.
    pub fn decode(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Maps a non-success HTTP status onto the taxonomy.
    pub fn from_status(url: impl Into<String>, status: u16, retry_after: Option<String>) -> Self {
        let url = url.into();
        match status {
            401 | 403 | 407 => Self::auth(url, status, "credential rejected"),
            404 | 410 => Self::NotFound { url, status },
            429 => Self::RateLimited { url, retry_after },
            408 | 500..=599 => Self::Server { url, status },
            _ => Self::HttpStatus { url, status },
        }
    }

    /// Classifies this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Auth { .. } => ErrorKind::Auth,
            Self::Timeout { .. }
            | Self::Network { .. }
            | Self::Server { .. }
            | Self::RateLimited { .. }
            | Self::Truncated { .. } => ErrorKind::Transient,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::HttpStatus { .. }
            | Self::Io { .. }
            | Self::InvalidUrl { .. }
            | Self::InvalidPageSize { .. }
            | Self::InvalidWorkers { .. }
            | Self::Worker { .. } => ErrorKind::Permanent,
        }
    }

    /// Returns true when repeating the same call may succeed.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Returns the HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Auth { status, .. } if *status != 0 => Some(*status),
            Self::Server { status, .. }
            | Self::HttpStatus { status, .. }
            | Self::NotFound { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_401_is_auth() {
        let error = FetchError::from_status("https://api.intra.42.fr/v2/users", 401, None);
        assert_eq!(error.kind(), ErrorKind::Auth);
        assert!(!error.is_retriable());
        let msg = error.to_string();
        assert!(msg.starts_with("[AUTH]"), "Expected [AUTH] prefix in: {msg}");
        assert!(msg.contains("401"), "Expected status in: {msg}");
    }

    #[test]
    fn test_from_status_403_is_auth() {
        let error = FetchError::from_status("https://example.com/a", 403, None);
        assert_eq!(error.kind(), ErrorKind::Auth);
        assert_eq!(error.status(), Some(403));
    }

    #[test]
    fn test_from_status_server_errors_are_transient() {
        for status in [408, 500, 502, 503, 504] {
            let error = FetchError::from_status("https://example.com/a", status, None);
            assert_eq!(error.kind(), ErrorKind::Transient, "status {status}");
            assert!(error.is_retriable());
        }
    }

    #[test]
    fn test_from_status_429_keeps_retry_after() {
        let error = FetchError::from_status("https://example.com/a", 429, Some("30".to_string()));
        assert!(error.is_retriable());
        assert!(error.to_string().contains("30"));
        match error {
            FetchError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after.as_deref(), Some("30"));
            }
            other => panic!("Expected RateLimited, got: {other:?}"),
        }
    }

    #[test]
    fn test_from_status_404_and_410_are_not_found() {
        assert_eq!(
            FetchError::from_status("https://example.com/a", 404, None).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            FetchError::from_status("https://example.com/a", 410, None).kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_not_found_keeps_original_status() {
        let gone = FetchError::from_status("https://example.com/a", 410, None);
        assert_eq!(gone.status(), Some(410));
        assert!(gone.to_string().contains("HTTP 410"));
        let missing = FetchError::from_status("https://example.com/a", 404, None);
        assert_eq!(missing.status(), Some(404));
    }

    #[test]
    fn test_from_status_other_client_errors_are_permanent() {
        let error = FetchError::from_status("https://example.com/a", 422, None);
        assert_eq!(error.kind(), ErrorKind::Permanent);
        assert_eq!(error.status(), Some(422));
    }

    #[test]
    fn test_decode_error_display_names_url() {
        let error = FetchError::decode("https://api.intra.42.fr/v2/projects", "expected array");
        let msg = error.to_string();
        assert!(msg.contains("https://api.intra.42.fr/v2/projects"), "{msg}");
        assert!(msg.contains("expected array"), "{msg}");
        assert_eq!(error.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_truncated_is_transient() {
        let error = FetchError::Truncated {
            path: PathBuf::from("/tmp/.a.pdf.part"),
            expected_bytes: 100,
            actual_bytes: 40,
        };
        assert!(error.is_retriable());
        assert!(error.to_string().contains("expected 100 bytes, got 40"));
    }

    #[test]
    fn test_io_error_display_names_path() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let error = FetchError::io("/downloads/en.subject.pdf", io_error);
        assert!(error.to_string().contains("/downloads/en.subject.pdf"));
        assert_eq!(error.kind(), ErrorKind::Permanent);
    }
}
