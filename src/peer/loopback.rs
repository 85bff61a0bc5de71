//! Loopback provider module
//!
//! An in-process signaling hub. Peers bound to the same hub can open data
//! connections to each other without any network; signaling failures can be
//! simulated per peer. Used by the demo binary and the session tests.

use crate::error::SessionError;
use crate::peer::{
    DataConnection, ErrorKind, PeerId, ProviderBinding, ProviderError, ProviderEvent, ProviderFactory,
    SignalingProvider,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, trace, warn};

/// Registration of one peer on the hub
struct HubEntry {
    events: mpsc::UnboundedSender<ProviderEvent>,
    online: bool,
    reconnect_attempts: usize,
}

impl HubEntry {
    fn emit(&self, event: ProviderEvent) -> bool {
        self.events.send(event).is_ok()
    }
}

/// In-process signaling hub
#[derive(Clone, Default)]
pub struct LoopbackHub {
    peers: Arc<RwLock<HashMap<PeerId, HubEntry>>>,
}

impl LoopbackHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer and queue its open event
    pub async fn register(&self, id: &PeerId) -> Result<ProviderBinding> {
        let mut peers = self.peers.write().await;
        if peers.contains_key(id) {
            warn!("Peer id {} is already registered on the hub", id);
            return Err(SessionError::provider_error_with_kind(
                format!("ID \"{}\" is taken", id),
                ErrorKind::UnavailableId.as_str(),
            )
            .into());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let entry = HubEntry {
            events: tx,
            online: true,
            reconnect_attempts: 0,
        };
        entry.emit(ProviderEvent::Open);
        peers.insert(id.clone(), entry);
        debug!("Registered {} on loopback hub (total: {})", id, peers.len());

        let provider = LoopbackProvider {
            hub: self.clone(),
            id: id.clone(),
        };
        Ok(ProviderBinding::new(Arc::new(provider), rx))
    }

    /// Simulate loss of the signaling link for a peer
    ///
    /// Emits `Disconnected` followed by a network error.
    pub async fn drop_signaling(&self, id: &PeerId) -> bool {
        let mut peers = self.peers.write().await;
        match peers.get_mut(id) {
            Some(entry) => {
                info!("Dropping signaling link for {}", id);
                entry.online = false;
                entry.emit(ProviderEvent::Disconnected);
                entry.emit(ProviderEvent::Error(ProviderError::network("Lost connection to server")));
                true
            }
            None => false,
        }
    }

    /// Deliver an arbitrary provider error to a peer
    pub async fn inject_error(&self, id: &PeerId, error: ProviderError) -> bool {
        let peers = self.peers.read().await;
        match peers.get(id) {
            Some(entry) => entry.emit(ProviderEvent::Error(error)),
            None => false,
        }
    }

    /// Number of reconnect attempts made by a peer
    pub async fn reconnect_attempts(&self, id: &PeerId) -> usize {
        self.peers
            .read()
            .await
            .get(id)
            .map(|entry| entry.reconnect_attempts)
            .unwrap_or(0)
    }

    /// Check whether a peer holds a live signaling link
    pub async fn is_online(&self, id: &PeerId) -> bool {
        self.peers.read().await.get(id).map(|entry| entry.online).unwrap_or(false)
    }

    /// Number of registered peers
    pub async fn peer_count(&self) -> usize {
        self.peers.read().await.len()
    }
}

#[async_trait]
impl ProviderFactory for LoopbackHub {
    async fn bind(&self, id: &PeerId) -> Result<ProviderBinding> {
        self.register(id).await
    }
}

/// Provider handle for one peer on a loopback hub
pub struct LoopbackProvider {
    hub: LoopbackHub,
    id: PeerId,
}

#[async_trait]
impl SignalingProvider for LoopbackProvider {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    async fn connect(&self, remote: &PeerId) -> Arc<dyn DataConnection> {
        let (local_end, remote_end) = LoopbackConnection::pair(&self.id, remote);
        let peers = self.hub.peers.read().await;

        let own_online = peers.get(&self.id).map(|entry| entry.online).unwrap_or(false);
        let delivered = own_online
            && peers
                .get(remote)
                .filter(|entry| entry.online)
                .map(|entry| entry.emit(ProviderEvent::Connection(Arc::new(remote_end))))
                .unwrap_or(false);

        if delivered {
            debug!("{} opened connection {} to {}", self.id, local_end.connection_id(), remote);
        } else {
            local_end.mark_closed();
            let error = if own_online {
                ProviderError::new(ErrorKind::PeerUnavailable, format!("Could not connect to peer {}", remote))
            } else {
                ProviderError::new(
                    ErrorKind::Disconnected,
                    "Cannot connect to new Peer after disconnecting from server.",
                )
            };
            if let Some(entry) = peers.get(&self.id) {
                entry.emit(ProviderEvent::Error(error));
            }
        }

        Arc::new(local_end)
    }

    async fn reconnect(&self) -> Result<()> {
        let mut peers = self.hub.peers.write().await;
        let entry = peers.get_mut(&self.id).ok_or_else(|| {
            SessionError::provider_error_with_kind(
                format!("Peer {} was destroyed", self.id),
                ErrorKind::Disconnected.as_str(),
            )
        })?;

        entry.reconnect_attempts += 1;
        if entry.online {
            trace!("{} is already online, reconnect is a no-op", self.id);
            return Ok(());
        }

        entry.online = true;
        entry.emit(ProviderEvent::Open);
        info!("{} reconnected to loopback hub", self.id);
        Ok(())
    }

    async fn destroy(&self) {
        if self.hub.peers.write().await.remove(&self.id).is_some() {
            debug!("Released {} from loopback hub", self.id);
        }
    }
}

/// One end of an in-process data connection
///
/// Both ends share a single closed flag, so closing either end closes the
/// connection for both peers.
pub struct LoopbackConnection {
    peer: PeerId,
    id: String,
    closed: Arc<watch::Sender<bool>>,
}

impl LoopbackConnection {
    /// Create both ends of a connection between two peers
    pub fn pair(local: &PeerId, remote: &PeerId) -> (Self, Self) {
        let id = format!("dc_{}", hex::encode(rand::random::<[u8; 8]>()));
        let (tx, _) = watch::channel(false);
        let closed = Arc::new(tx);
        let local_end = Self {
            peer: remote.clone(),
            id: id.clone(),
            closed: closed.clone(),
        };
        let remote_end = Self {
            peer: local.clone(),
            id,
            closed,
        };
        (local_end, remote_end)
    }

    fn mark_closed(&self) -> bool {
        !self.closed.send_replace(true)
    }
}

#[async_trait]
impl DataConnection for LoopbackConnection {
    fn peer(&self) -> &PeerId {
        &self.peer
    }

    fn connection_id(&self) -> &str {
        &self.id
    }

    fn is_open(&self) -> bool {
        !*self.closed.borrow()
    }

    async fn close(&self) -> Result<()> {
        if self.mark_closed() {
            debug!("Closed connection {} with {}", self.id, self.peer);
        }
        Ok(())
    }

    async fn closed(&self) {
        let mut rx = self.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }
}
