//! peer-session
//!
//! Peer-to-peer signaling session adapter: a local identity bound to a
//! signaling provider, readiness tracking and a directory of active
//! connections.

pub mod peer;
pub mod cli;
pub mod error;

pub use error::SessionError;

pub use peer::{
    ConnectionDirectory, DataConnection, ErrorKind, InMemoryDirectory, LoopbackHub, PeerId, PeerSession,
    ProviderBinding, ProviderError, ProviderEvent, ProviderFactory, SessionState, SignalingProvider,
    DEFAULT_RECONNECT_DELAY,
};
pub use cli::{CliArgs, Config};
