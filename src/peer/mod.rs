//! Peer session module
//!
//! Handles the local peer identity, its signaling provider and the
//! directory of active connections.

pub mod connection;
pub mod directory;
pub mod id;
pub mod loopback;
pub mod provider;
pub mod session;
pub mod state;

// Re-export main types
pub use connection::DataConnection;
pub use directory::{ConnectionDirectory, InMemoryDirectory};
pub use id::PeerId;
pub use loopback::{LoopbackConnection, LoopbackHub, LoopbackProvider};
pub use provider::{ErrorKind, ProviderBinding, ProviderError, ProviderEvent, ProviderFactory, SignalingProvider};
pub use session::{PeerSession, DEFAULT_RECONNECT_DELAY};
pub use state::SessionState;
