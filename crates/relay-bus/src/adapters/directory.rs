//! In-memory peer directory with explicit subscriptions.

use parking_lot::RwLock;
use relay_types::{Message, MessageTypeId, Peer, PeerId};
use std::collections::HashMap;
use tracing::debug;

use crate::ports::PeerDirectory;

/// Peer directory populated by hand.
///
/// Only peers flagged `is_up` are returned by lookups.
#[derive(Debug, Default)]
pub struct StaticPeerDirectory {
    subscriptions: RwLock<HashMap<MessageTypeId, Vec<Peer>>>,
}

impl StaticPeerDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `peer` handles messages of type `M`.
    pub fn subscribe<M: Message>(&self, peer: Peer) {
        self.add_subscription(M::type_name(), peer);
    }

    /// Declare that `peer` handles `message_type`, replacing any previous
    /// entry for the same peer id.
    pub fn add_subscription(&self, message_type: MessageTypeId, peer: Peer) {
        debug!(peer = %peer, message_type = %message_type, "Subscription added");
        let mut subscriptions = self.subscriptions.write();
        let peers = subscriptions.entry(message_type).or_default();
        match peers.iter_mut().find(|p| p.id == peer.id) {
            Some(existing) => *existing = peer,
            None => peers.push(peer),
        }
    }

    /// Mark `peer_id` up or down in every subscription.
    pub fn set_peer_up(&self, peer_id: &PeerId, is_up: bool) {
        for peer in self.subscriptions.write().values_mut().flatten() {
            if &peer.id == peer_id {
                peer.is_up = is_up;
            }
        }
    }

    /// Drop every subscription of `peer_id`.
    pub fn remove_peer(&self, peer_id: &PeerId) {
        let mut subscriptions = self.subscriptions.write();
        for peers in subscriptions.values_mut() {
            peers.retain(|p| &p.id != peer_id);
        }
        subscriptions.retain(|_, peers| !peers.is_empty());
    }
}

impl PeerDirectory for StaticPeerDirectory {
    fn get_peers_handling_message(&self, message_type: &MessageTypeId) -> Vec<Peer> {
        self.subscriptions
            .read()
            .get(message_type)
            .map(|peers| peers.iter().filter(|p| p.is_up).cloned().collect())
            .unwrap_or_default()
    }
}
