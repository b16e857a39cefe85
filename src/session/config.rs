//! Session configuration: timeouts, connection cap and User-Agent.

use std::time::Duration;

use thiserror::Error;

use crate::user_agent;

/// Default connect timeout (10 seconds).
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default request timeout (30 seconds), covering connect and the full body transfer.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default cap on live connections shared by all callers of one session.
pub const DEFAULT_MAX_CONNECTIONS: usize = 32;

const MAX_TIMEOUT_SECS: u64 = 3600;
const MAX_CONNECTIONS: usize = 256;

/// Invalid session configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A timeout outside `1..=3600` seconds.
    #[error("invalid value for `{field}`: {value}s. Expected range: 1..=3600")]
    Timeout {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value in seconds.
        value: u64,
    },

    /// A connection cap outside `1..=256`.
    #[error("invalid value for `max_connections`: {value}. Expected range: 1..=256")]
    MaxConnections {
        /// The rejected value.
        value: usize,
    },
}

/// Settings for one [`Session`](super::Session).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time allowed to establish a connection.
    pub connect_timeout: Duration,
    /// Time allowed for a whole request, body included.
    pub request_timeout: Duration,
    /// Maximum number of requests in flight; excess callers wait.
    pub max_connections: usize,
    /// User-Agent header sent with every request.
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            user_agent: user_agent::default_user_agent(),
        }
    }
}

impl SessionConfig {
    /// Builds a config from second-granularity timeouts and a connection cap.
    #[must_use]
    pub fn with_limits(
        connect_timeout_secs: u64,
        request_timeout_secs: u64,
        max_connections: usize,
    ) -> Self {
        Self {
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            request_timeout: Duration::from_secs(request_timeout_secs),
            max_connections,
            ..Self::default()
        }
    }

    /// Validates values against the ranges the CLI accepts.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] naming the first field out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_timeout("connect_timeout", self.connect_timeout)?;
        validate_timeout("request_timeout", self.request_timeout)?;
        if !(1..=MAX_CONNECTIONS).contains(&self.max_connections) {
            return Err(ConfigError::MaxConnections {
                value: self.max_connections,
            });
        }
        Ok(())
    }
}

fn validate_timeout(field: &'static str, value: Duration) -> Result<(), ConfigError> {
    // Sub-second timeouts are allowed (tests rely on them); zero and > 1h are not.
    if value.is_zero() || value > Duration::from_secs(MAX_TIMEOUT_SECS) {
        return Err(ConfigError::Timeout {
            field,
            value: value.as_secs(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SessionConfig::default();
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = SessionConfig::with_limits(0, 30, 4);
        assert_eq!(
            config.validate(),
            Err(ConfigError::Timeout {
                field: "connect_timeout",
                value: 0
            })
        );
    }

    #[test]
    fn test_timeout_over_one_hour_rejected() {
        let config = SessionConfig::with_limits(10, 3601, 4);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Timeout {
                field: "request_timeout",
                ..
            })
        ));
    }

    #[test]
    fn test_connection_cap_bounds() {
        assert!(SessionConfig::with_limits(10, 30, 0).validate().is_err());
        assert!(SessionConfig::with_limits(10, 30, 1).validate().is_ok());
        assert!(SessionConfig::with_limits(10, 30, 256).validate().is_ok());
        assert_eq!(
            SessionConfig::with_limits(10, 30, 257).validate(),
            Err(ConfigError::MaxConnections { value: 257 })
        );
    }
}
