//! Peer registry: last-known peer set, replaced wholesale on every peer-list notification.

use std::sync::Arc;

use crate::error::LinkError;
use crate::peer::{Peer, PeerId};

/// Ordered peer set in provider-reported order. Snapshots are shared, never mutated in place,
/// so a reader holding one never sees a half-applied update.
#[derive(Debug, Clone)]
pub struct PeerRegistry {
    peers: Arc<[Peer]>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self {
            peers: Arc::from(Vec::new()),
        }
    }

    /// Replace the whole set. Each update is authoritative; nothing is merged.
    pub fn update(&mut self, peers: Vec<Peer>) {
        self.peers = Arc::from(peers);
    }

    pub fn clear(&mut self) {
        self.update(Vec::new());
    }

    pub fn lookup(&self, id: &PeerId) -> Result<&Peer, LinkError> {
        self.peers
            .iter()
            .find(|p| p.id == *id)
            .ok_or(LinkError::PeerNotFound(*id))
    }

    /// Read-only snapshot for views.
    pub fn snapshot(&self) -> Arc<[Peer]> {
        self.peers.clone()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
