//! Error types for the peer session
//!
//! This module defines the error conditions surfaced by the session,
//! its collaborators and the command-line layer.

use std::fmt;

/// Error type for session operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// No connection is registered for the remote peer
    ConnectionNotFound {
        peer: String,
    },

    /// Error reported by the signaling provider
    ProviderError {
        message: String,
        kind: Option<String>,
    },

    /// Configuration errors
    ConfigError {
        message: String,
        field: Option<String>,
    },

    /// Network errors
    NetworkError {
        message: String,
    },

    /// Validation errors
    ValidationError {
        message: String,
        field: Option<String>,
    },
}

impl SessionError {
    /// Create a new ConnectionNotFound error
    pub fn connection_not_found(peer: impl Into<String>) -> Self {
        SessionError::ConnectionNotFound { peer: peer.into() }
    }

    /// Create a new ProviderError
    pub fn provider_error(message: impl Into<String>) -> Self {
        SessionError::ProviderError {
            message: message.into(),
            kind: None,
        }
    }

    /// Create a new ProviderError tagged with the provider's error kind
    pub fn provider_error_with_kind(message: impl Into<String>, kind: impl Into<String>) -> Self {
        SessionError::ProviderError {
            message: message.into(),
            kind: Some(kind.into()),
        }
    }

    /// Create a new ConfigError
    pub fn config_error(message: impl Into<String>) -> Self {
        SessionError::ConfigError {
            message: message.into(),
            field: None,
        }
    }

    /// Create a new ConfigError with field
    pub fn config_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        SessionError::ConfigError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a new NetworkError
    pub fn network_error(message: impl Into<String>) -> Self {
        SessionError::NetworkError {
            message: message.into(),
        }
    }

    /// Create a new ValidationError with field
    pub fn validation_error_with_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        SessionError::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Check whether this is a missing-connection error
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::ConnectionNotFound { .. })
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::ConnectionNotFound { peer } => {
                write!(f, "Connection not found (peer: {})", peer)
            }
            SessionError::ProviderError { message, kind } => {
                if let Some(k) = kind {
                    write!(f, "Provider error: {} (kind: {})", message, k)
                } else {
                    write!(f, "Provider error: {}", message)
                }
            }
            SessionError::ConfigError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Config error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Config error: {}", message)
                }
            }
            SessionError::NetworkError { message } => write!(f, "Network error: {}", message),
            SessionError::ValidationError { message, field } => {
                if let Some(field_val) = field {
                    write!(f, "Validation error: {} (field: {})", message, field_val)
                } else {
                    write!(f, "Validation error: {}", message)
                }
            }
        }
    }
}

impl std::error::Error for SessionError {}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        SessionError::config_error(format!("I/O failure: {} ({})", err, err.kind()))
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::config_error(format!("Failed to parse JSON config: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_not_found() {
        let err = SessionError::connection_not_found("peer-a");
        assert_eq!(err.to_string(), "Connection not found (peer: peer-a)");
        assert!(err.is_not_found());
    }

    #[test]
    fn test_provider_error_with_kind() {
        let err = SessionError::provider_error_with_kind("Lost signaling server", "network");
        assert!(err.to_string().contains("Provider error"));
        assert!(err.to_string().contains("network"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_network_error() {
        let err = SessionError::network_error("Timed out waiting for the signaling hub");
        assert_eq!(err.to_string(), "Network error: Timed out waiting for the signaling hub");
    }

    #[test]
    fn test_config_error_with_field() {
        let err = SessionError::config_error_with_field("Invalid value", "reconnect_delay_ms");
        assert!(err.to_string().contains("Config error"));
        assert!(err.to_string().contains("reconnect_delay_ms"));
    }

    #[test]
    fn test_validation_error_with_field() {
        let err = SessionError::validation_error_with_field("Peer id cannot be empty", "remote_id");
        assert!(err.to_string().contains("Validation error"));
        assert!(err.to_string().contains("remote_id"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: SessionError = json_err.into();
        assert!(matches!(err, SessionError::ConfigError { .. }));
    }

    #[test]
    fn test_into_anyhow_and_back() {
        let err = anyhow::Error::from(SessionError::connection_not_found("x"));
        let typed = err.downcast_ref::<SessionError>().unwrap();
        assert!(typed.is_not_found());
    }
}
