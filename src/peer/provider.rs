//! Signaling provider abstraction
//!
//! This module defines the contract between the session and the library that
//! actually performs signaling, NAT traversal and data channel setup. The
//! session binds a provider to its identity, drives it through this trait and
//! consumes its lifecycle events from a channel.

use crate::peer::{DataConnection, PeerId};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Signaling/transport provider bound to one local identity
#[async_trait]
pub trait SignalingProvider: Send + Sync {
    /// Identity this provider is registered under
    fn local_id(&self) -> &PeerId;

    /// Initiate an outbound connection to a remote peer
    ///
    /// Returns the handle immediately. Whether the handshake succeeds is
    /// reported through the provider's event stream.
    async fn connect(&self, remote: &PeerId) -> Arc<dyn DataConnection>;

    /// Re-establish the link to the signaling service
    async fn reconnect(&self) -> Result<()>;

    /// Release the identity and stop emitting events
    async fn destroy(&self);
}

/// Binds providers to local identities
#[async_trait]
pub trait ProviderFactory: Send + Sync {
    /// Initialize a provider registered under `id`
    ///
    /// Must not wait for the signaling service; readiness is reported later
    /// through the binding's event stream.
    async fn bind(&self, id: &PeerId) -> Result<ProviderBinding>;
}

/// Lifecycle event emitted by a provider
pub enum ProviderEvent {
    /// Registered with the signaling service
    Open,
    /// A remote peer opened a connection to us
    Connection(Arc<dyn DataConnection>),
    /// Link to the signaling service was lost
    Disconnected,
    /// Provider-level error
    Error(ProviderError),
}

impl fmt::Debug for ProviderEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderEvent::Open => f.write_str("Open"),
            ProviderEvent::Connection(conn) => f
                .debug_struct("Connection")
                .field("peer", conn.peer())
                .field("connection_id", &conn.connection_id())
                .finish(),
            ProviderEvent::Disconnected => f.write_str("Disconnected"),
            ProviderEvent::Error(err) => f.debug_tuple("Error").field(err).finish(),
        }
    }
}

/// Provider handle and its event stream, produced when binding an identity
pub struct ProviderBinding {
    pub provider: Arc<dyn SignalingProvider>,
    pub events: mpsc::UnboundedReceiver<ProviderEvent>,
}

impl ProviderBinding {
    /// Create a new binding
    pub fn new(provider: Arc<dyn SignalingProvider>, events: mpsc::UnboundedReceiver<ProviderEvent>) -> Self {
        Self { provider, events }
    }
}

/// Category of a provider error
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    BrowserIncompatible,
    Disconnected,
    InvalidId,
    InvalidKey,
    Network,
    PeerUnavailable,
    SslUnavailable,
    ServerError,
    SocketError,
    SocketClosed,
    UnavailableId,
    WebRtc,
    Other(String),
}

impl ErrorKind {
    /// Tag used on the wire and in logs
    pub fn as_str(&self) -> &str {
        match self {
            ErrorKind::BrowserIncompatible => "browser-incompatible",
            ErrorKind::Disconnected => "disconnected",
            ErrorKind::InvalidId => "invalid-id",
            ErrorKind::InvalidKey => "invalid-key",
            ErrorKind::Network => "network",
            ErrorKind::PeerUnavailable => "peer-unavailable",
            ErrorKind::SslUnavailable => "ssl-unavailable",
            ErrorKind::ServerError => "server-error",
            ErrorKind::SocketError => "socket-error",
            ErrorKind::SocketClosed => "socket-closed",
            ErrorKind::UnavailableId => "unavailable-id",
            ErrorKind::WebRtc => "webrtc",
            ErrorKind::Other(tag) => tag,
        }
    }

    /// Check if this is a signaling network failure
    pub fn is_network(&self) -> bool {
        matches!(self, ErrorKind::Network)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "browser-incompatible" => ErrorKind::BrowserIncompatible,
            "disconnected" => ErrorKind::Disconnected,
            "invalid-id" => ErrorKind::InvalidId,
            "invalid-key" => ErrorKind::InvalidKey,
            "network" => ErrorKind::Network,
            "peer-unavailable" => ErrorKind::PeerUnavailable,
            "ssl-unavailable" => ErrorKind::SslUnavailable,
            "server-error" => ErrorKind::ServerError,
            "socket-error" => ErrorKind::SocketError,
            "socket-closed" => ErrorKind::SocketClosed,
            "unavailable-id" => ErrorKind::UnavailableId,
            "webrtc" => ErrorKind::WebRtc,
            other => ErrorKind::Other(other.to_string()),
        })
    }
}

/// Error reported by a provider through its event stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ProviderError {
    /// Create a new provider error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a signaling network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Network, message)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl std::error::Error for ProviderError {}

impl From<ProviderError> for crate::error::SessionError {
    fn from(err: ProviderError) -> Self {
        crate::error::SessionError::provider_error_with_kind(err.message, err.kind.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_tags() {
        let kinds = [
            ErrorKind::BrowserIncompatible,
            ErrorKind::Disconnected,
            ErrorKind::InvalidId,
            ErrorKind::InvalidKey,
            ErrorKind::Network,
            ErrorKind::PeerUnavailable,
            ErrorKind::SslUnavailable,
            ErrorKind::ServerError,
            ErrorKind::SocketError,
            ErrorKind::SocketClosed,
            ErrorKind::UnavailableId,
            ErrorKind::WebRtc,
        ];
        for kind in kinds {
            let parsed: ErrorKind = kind.as_str().parse().unwrap();
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_other() {
        let kind: ErrorKind = "quota-exceeded".parse().unwrap();
        assert_eq!(kind, ErrorKind::Other("quota-exceeded".to_string()));
        assert_eq!(kind.to_string(), "quota-exceeded");
        assert!(!kind.is_network());
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError::network("Lost connection to server");
        assert!(err.kind.is_network());
        assert_eq!(err.to_string(), "Lost connection to server (network)");
    }

    #[test]
    fn test_into_session_error() {
        let err: crate::error::SessionError = ProviderError::new(ErrorKind::InvalidId, "bad id").into();
        assert!(err.to_string().contains("invalid-id"));
    }
}
