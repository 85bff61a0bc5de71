//! Peer session module
//!
//! Owns one local identity bound to a signaling provider. The session tracks
//! whether the provider has opened, forwards connect/disconnect requests to a
//! connection directory and reacts to provider lifecycle events. Events are
//! handled one at a time by a single reactor task.

use crate::error::SessionError;
use crate::peer::{
    ConnectionDirectory, DataConnection, PeerId, ProviderError, ProviderEvent, ProviderFactory,
    SessionState, SignalingProvider,
};
use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, trace, warn};

/// Delay before reconnecting after a signaling network error
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(50);

/// A local peer registered with a signaling provider
pub struct PeerSession {
    /// Our identity on the signaling service
    id: PeerId,
    /// Provider bound to our identity
    provider: Arc<dyn SignalingProvider>,
    /// Registry of live connections
    directory: Arc<dyn ConnectionDirectory>,
    /// Latest readiness value
    ready: watch::Receiver<bool>,
    /// Task consuming provider events
    reactor: JoinHandle<()>,
    /// Pending reconnection attempt, shared with the reactor
    reconnect: Arc<ReconnectScheduler>,
}

impl PeerSession {
    /// Create a new session with a fresh identity
    ///
    /// Binds a provider to the identity and starts reacting to its events.
    /// Returns without waiting for the provider to open.
    pub async fn new<F>(
        factory: &F,
        directory: Arc<dyn ConnectionDirectory>,
        reconnect_delay: Duration,
    ) -> Result<Self>
    where
        F: ProviderFactory + ?Sized,
    {
        let id = PeerId::generate();
        debug!("Binding provider for session {}", id);

        let binding = factory
            .bind(&id)
            .await
            .with_context(|| format!("Failed to bind provider for session {}", id))?;

        let (ready_tx, ready_rx) = watch::channel(false);
        let reconnect = Arc::new(ReconnectScheduler::new(binding.provider.clone(), reconnect_delay));
        let reactor = SessionReactor {
            id: id.clone(),
            directory: directory.clone(),
            ready: ready_tx,
            reconnect: reconnect.clone(),
        };
        let handle = tokio::spawn(reactor.run(binding.events));

        info!("Created peer session {}", id);
        Ok(Self {
            id,
            provider: binding.provider,
            directory,
            ready: ready_rx,
            reactor: handle,
            reconnect,
        })
    }

    /// Create a new session with the default reconnect delay
    pub async fn with_defaults<F>(factory: &F, directory: Arc<dyn ConnectionDirectory>) -> Result<Self>
    where
        F: ProviderFactory + ?Sized,
    {
        Self::new(factory, directory, DEFAULT_RECONNECT_DELAY).await
    }

    /// Our identity
    pub fn id(&self) -> &PeerId {
        &self.id
    }

    /// Check if the provider has opened
    pub fn is_ready(&self) -> bool {
        *self.ready.borrow()
    }

    /// Current session state
    pub fn state(&self) -> SessionState {
        SessionState::from_ready(self.is_ready())
    }

    /// Subscribe to readiness
    ///
    /// The receiver starts with the latest value and observes the single
    /// transition to `true`.
    pub fn subscribe_ready(&self) -> watch::Receiver<bool> {
        self.ready.clone()
    }

    /// Wait until the provider has opened
    pub async fn wait_ready(&self) -> Result<()> {
        let mut ready = self.ready.clone();
        ready
            .wait_for(|ready| *ready)
            .await
            .map_err(|_| SessionError::provider_error("Session stopped before the provider opened"))?;
        Ok(())
    }

    /// The connection directory this session registers with
    pub fn directory(&self) -> &Arc<dyn ConnectionDirectory> {
        &self.directory
    }

    /// Open a connection to a remote peer
    ///
    /// The handle is registered with the directory straight away; the outcome
    /// of the handshake is only visible through the provider.
    pub async fn connect(&self, remote_id: &str) -> Result<()> {
        if remote_id.is_empty() {
            return Err(SessionError::validation_error_with_field("Peer id cannot be empty", "remote_id").into());
        }

        let remote = PeerId::from(remote_id);
        info!("[{}] Connecting to peer {}", self.id, remote);
        let conn = self.provider.connect(&remote).await;
        trace!("[{}] Connection {} to {} initiated", self.id, conn.connection_id(), remote);
        self.directory.add(conn).await;
        Ok(())
    }

    /// Close and unregister the connection to a remote peer
    pub async fn disconnect(&self, remote_id: &str) -> Result<()> {
        let conn = self.directory.get(remote_id).await.ok_or_else(|| {
            warn!("[{}] Attempted to disconnect {} but no connection found", self.id, remote_id);
            SessionError::connection_not_found(remote_id)
        })?;

        info!("[{}] Disconnecting peer {}", self.id, remote_id);
        if let Err(e) = conn.close().await {
            warn!("[{}] Failed to close connection to {}: {}", self.id, remote_id, e);
        }
        // The close watcher of an incoming handle may already have removed it.
        if self.directory.remove_if(remote_id, conn.connection_id()).await.is_none() {
            trace!("[{}] Connection {} already unregistered", self.id, conn.connection_id());
        }
        Ok(())
    }

    /// Stop reacting to events and release the identity
    pub async fn shutdown(self) {
        info!("[{}] Shutting down peer session", self.id);
        self.reactor.abort();
        self.reconnect.cancel();
        self.provider.destroy().await;
    }
}

impl Drop for PeerSession {
    fn drop(&mut self) {
        self.reactor.abort();
        self.reconnect.cancel();
    }
}

/// Handles provider events for one session
struct SessionReactor {
    id: PeerId,
    directory: Arc<dyn ConnectionDirectory>,
    ready: watch::Sender<bool>,
    reconnect: Arc<ReconnectScheduler>,
}

impl SessionReactor {
    async fn run(self, mut events: mpsc::UnboundedReceiver<ProviderEvent>) {
        while let Some(event) = events.recv().await {
            trace!("[{}] Provider event: {:?}", self.id, event);
            match event {
                ProviderEvent::Open => self.on_open(),
                ProviderEvent::Connection(conn) => self.on_connection(conn).await,
                ProviderEvent::Disconnected => self.on_disconnected(),
                ProviderEvent::Error(err) => self.on_error(err),
            }
        }
        debug!("[{}] Provider event stream closed", self.id);
    }

    fn on_open(&self) {
        let opened = self.ready.send_if_modified(|ready| {
            if *ready {
                false
            } else {
                *ready = true;
                true
            }
        });

        if opened {
            info!("[{}] Connected to signaling server", self.id);
        } else {
            debug!("[{}] Signaling server opened again", self.id);
        }
    }

    async fn on_connection(&self, conn: Arc<dyn DataConnection>) {
        info!("[{}] Incoming connection from {}", self.id, conn.peer());
        self.directory.add(conn.clone()).await;

        let id = self.id.clone();
        let directory = self.directory.clone();
        tokio::spawn(async move {
            conn.closed().await;
            let peer = conn.peer().as_str();

            // Only drop the entry if it still belongs to this handle.
            if directory.remove_if(peer, conn.connection_id()).await.is_some() {
                info!("[{}] Connection from {} closed", id, peer);
            } else {
                trace!("[{}] Closed connection {} already unregistered", id, conn.connection_id());
            }
        });
    }

    fn on_disconnected(&self) {
        // Readiness is left untouched; recovery is driven by the network error.
        warn!("[{}] Lost connection to signaling server", self.id);
    }

    fn on_error(&self, err: ProviderError) {
        info!("[{}] Peer error. Type: {}", self.id, err.kind);
        debug!("[{}] Peer error detail: {}", self.id, err.message);

        if err.kind.is_network() {
            self.reconnect.schedule(&self.id);
        }
    }
}

/// Schedules reconnection attempts, at most one in flight
struct ReconnectScheduler {
    provider: Arc<dyn SignalingProvider>,
    delay: Duration,
    in_flight: Arc<AtomicBool>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl ReconnectScheduler {
    fn new(provider: Arc<dyn SignalingProvider>, delay: Duration) -> Self {
        Self {
            provider,
            delay,
            in_flight: Arc::new(AtomicBool::new(false)),
            pending: Mutex::new(None),
        }
    }

    fn schedule(&self, id: &PeerId) -> bool {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("[{}] Reconnect already scheduled", id);
            return false;
        }

        info!("[{}] Reconnecting to signaling server in {:?}", id, self.delay);
        let id = id.clone();
        let provider = self.provider.clone();
        let in_flight = self.in_flight.clone();
        let delay = self.delay;
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = provider.reconnect().await {
                error!("[{}] Reconnect to signaling server failed: {:#}", id, e);
            }
            in_flight.store(false, Ordering::Release);
        });
        if let Ok(mut pending) = self.pending.lock() {
            *pending = Some(task);
        }
        true
    }

    /// Abort the scheduled attempt, if any
    fn cancel(&self) {
        if let Some(task) = self.pending.lock().ok().and_then(|mut pending| pending.take()) {
            task.abort();
        }
    }
}
