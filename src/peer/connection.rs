//! Data connection module
//!
//! Handle to a single data connection with a remote peer.

use crate::peer::PeerId;
use anyhow::Result;
use async_trait::async_trait;

/// A data connection owned by the provider
///
/// The session never reads or writes data through a connection; it only
/// registers handles with the directory and closes them on request.
#[async_trait]
pub trait DataConnection: Send + Sync {
    /// Identity of the remote peer
    fn peer(&self) -> &PeerId;

    /// Provider-assigned identifier unique to this handle
    fn connection_id(&self) -> &str;

    /// Whether the connection is still open
    fn is_open(&self) -> bool;

    /// Close the connection
    ///
    /// Closing an already closed connection is a no-op.
    async fn close(&self) -> Result<()>;

    /// Wait until the connection is closed
    ///
    /// Resolves immediately if the connection is already closed.
    async fn closed(&self);
}
