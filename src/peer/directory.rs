//! Connection directory module
//!
//! Registry of live data connections keyed by remote peer identity.

use crate::peer::{DataConnection, PeerId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, trace};

/// Registry of active connections
///
/// Incoming connections and outgoing connect/disconnect calls may interleave,
/// so implementations must tolerate mutation from any task.
#[async_trait]
pub trait ConnectionDirectory: Send + Sync {
    /// Register a connection under its remote peer identity
    ///
    /// Replaces any connection already registered for that peer.
    async fn add(&self, conn: Arc<dyn DataConnection>);

    /// Remove the connection registered for a peer
    async fn remove(&self, peer: &str) -> Option<Arc<dyn DataConnection>>;

    /// Remove the connection registered for a peer only if it is the handle
    /// identified by `connection_id`
    ///
    /// The check and the removal happen as one step, so two tasks racing to
    /// unregister the same handle remove it once between them.
    async fn remove_if(&self, peer: &str, connection_id: &str) -> Option<Arc<dyn DataConnection>>;

    /// Look up the connection registered for a peer
    async fn get(&self, peer: &str) -> Option<Arc<dyn DataConnection>>;

    /// Identities of all registered peers
    async fn peer_ids(&self) -> Vec<PeerId>;

    /// Number of registered connections
    async fn len(&self) -> usize;

    /// Check if no connections are registered
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// In-memory connection directory
#[derive(Default)]
pub struct InMemoryDirectory {
    connections: RwLock<HashMap<PeerId, Arc<dyn DataConnection>>>,
}

impl InMemoryDirectory {
    /// Create an empty directory
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionDirectory for InMemoryDirectory {
    async fn add(&self, conn: Arc<dyn DataConnection>) {
        let peer = conn.peer().clone();
        let mut connections = self.connections.write().await;
        if let Some(previous) = connections.insert(peer.clone(), conn) {
            debug!("Replaced connection {} to {}", previous.connection_id(), peer);
        }
        debug!("Registered connection to {} (total: {})", peer, connections.len());
    }

    async fn remove(&self, peer: &str) -> Option<Arc<dyn DataConnection>> {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(peer);
        if removed.is_some() {
            debug!("Unregistered connection to {} (remaining: {})", peer, connections.len());
        } else {
            trace!("No connection to {} to unregister", peer);
        }
        removed
    }

    async fn remove_if(&self, peer: &str, connection_id: &str) -> Option<Arc<dyn DataConnection>> {
        let mut connections = self.connections.write().await;
        match connections.get(peer) {
            Some(current) if current.connection_id() == connection_id => {
                let removed = connections.remove(peer);
                debug!("Unregistered connection {} to {} (remaining: {})", connection_id, peer, connections.len());
                removed
            }
            Some(current) => {
                trace!("Connection to {} is now {}, keeping it", peer, current.connection_id());
                None
            }
            None => {
                trace!("No connection to {} to unregister", peer);
                None
            }
        }
    }

    async fn get(&self, peer: &str) -> Option<Arc<dyn DataConnection>> {
        self.connections.read().await.get(peer).cloned()
    }

    async fn peer_ids(&self) -> Vec<PeerId> {
        self.connections.read().await.keys().cloned().collect()
    }

    async fn len(&self) -> usize {
        self.connections.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    struct StubConnection {
        peer: PeerId,
        id: String,
    }

    #[async_trait]
    impl DataConnection for StubConnection {
        fn peer(&self) -> &PeerId {
            &self.peer
        }

        fn connection_id(&self) -> &str {
            &self.id
        }

        fn is_open(&self) -> bool {
            true
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }

        async fn closed(&self) {}
    }

    fn stub(peer: &str, id: &str) -> Arc<dyn DataConnection> {
        Arc::new(StubConnection {
            peer: PeerId::from(peer),
            id: id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_add_and_get() {
        let directory = InMemoryDirectory::new();
        assert!(directory.is_empty().await);

        directory.add(stub("alice", "c1")).await;

        let conn = directory.get("alice").await.unwrap();
        assert_eq!(conn.connection_id(), "c1");
        assert_eq!(directory.len().await, 1);
        assert_eq!(directory.peer_ids().await, vec![PeerId::from("alice")]);
    }

    #[tokio::test]
    async fn test_add_replaces_same_peer() {
        let directory = InMemoryDirectory::new();
        directory.add(stub("alice", "c1")).await;
        directory.add(stub("alice", "c2")).await;

        assert_eq!(directory.len().await, 1);
        assert_eq!(directory.get("alice").await.unwrap().connection_id(), "c2");
    }

    #[tokio::test]
    async fn test_remove() {
        let directory = InMemoryDirectory::new();
        directory.add(stub("alice", "c1")).await;
        directory.add(stub("bob", "c2")).await;

        let removed = directory.remove("alice").await.unwrap();
        assert_eq!(removed.connection_id(), "c1");
        assert!(directory.get("alice").await.is_none());
        assert!(directory.remove("alice").await.is_none());
        assert_eq!(directory.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_if_matches_connection_id() {
        let directory = InMemoryDirectory::new();
        directory.add(stub("alice", "c2")).await;

        assert!(directory.remove_if("alice", "c1").await.is_none());
        assert_eq!(directory.get("alice").await.unwrap().connection_id(), "c2");

        let removed = directory.remove_if("alice", "c2").await.unwrap();
        assert_eq!(removed.connection_id(), "c2");
        assert!(directory.remove_if("alice", "c2").await.is_none());
        assert!(directory.is_empty().await);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_remove_if_removes_once() {
        let directory = Arc::new(InMemoryDirectory::new());
        for round in 0..200 {
            let id = format!("c{}", round);
            directory.add(stub("alice", &id)).await;

            let tasks: Vec<_> = (0..4)
                .map(|_| {
                    let directory = directory.clone();
                    let id = id.clone();
                    tokio::spawn(async move { directory.remove_if("alice", &id).await.is_some() })
                })
                .collect();

            let mut removed = 0;
            for task in tasks {
                if task.await.unwrap() {
                    removed += 1;
                }
            }
            assert_eq!(removed, 1, "round {}", round);
        }
    }

    #[tokio::test]
    async fn test_get_missing() {
        let directory = InMemoryDirectory::new();
        assert!(directory.get("nobody").await.is_none());
    }
}
