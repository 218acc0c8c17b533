//! Room entry and peer handle types
//!
//! This module defines the per-room state stored in the registry.

use std::collections::HashMap;
use std::time::Instant;

use tokio::sync::mpsc;

use super::frame::{ConnectionId, Payload};
use super::transcript::Transcript;

/// Result of handing a payload to one peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Payload was queued on the peer's outbound channel
    Delivered,
    /// The peer's channel is closed; its own teardown will remove it
    PeerUnreachable,
}

/// Non-owning handle to a connection's outbound queue
///
/// The registry stores one of these per member. The transport side owns the
/// receiving end and the socket; once it goes away every send reports
/// [`Delivery::PeerUnreachable`].
#[derive(Debug, Clone)]
pub struct PeerHandle {
    id: ConnectionId,
    tx: mpsc::Sender<Payload>,
}

impl PeerHandle {
    /// Create a handle for connection `id` that writes into `tx`
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Payload>) -> Self {
        Self { id, tx }
    }

    /// Connection identity
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queue a payload for this peer
    ///
    /// Waits while the peer's queue is full.
    pub async fn send(&self, payload: Payload) -> Delivery {
        match self.tx.send(payload).await {
            Ok(()) => Delivery::Delivered,
            Err(_) => Delivery::PeerUnreachable,
        }
    }
}

impl PartialEq for PeerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for PeerHandle {}

/// Entry for a single room in the registry
pub struct Room {
    /// Current members keyed by connection ID
    members: HashMap<ConnectionId, PeerHandle>,

    /// Captions received in this room
    pub transcript: Transcript,

    /// When the room was created
    pub created_at: Instant,
}

impl Room {
    /// Create an empty room
    pub(super) fn new(transcript: Transcript) -> Self {
        Self {
            members: HashMap::new(),
            transcript,
            created_at: Instant::now(),
        }
    }

    /// Add a member. Returns false if the connection was already a member.
    pub(super) fn insert(&mut self, peer: PeerHandle) -> bool {
        if self.members.contains_key(&peer.id) {
            return false;
        }
        self.members.insert(peer.id, peer);
        true
    }

    /// Remove a member. Returns false if it was not a member.
    pub(super) fn remove(&mut self, id: ConnectionId) -> bool {
        self.members.remove(&id).is_some()
    }

    /// Whether the connection is a member
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.members.contains_key(&id)
    }

    /// Number of members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Whether the room has no members left
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Copy of every member handle except `excluding`
    pub fn snapshot_excluding(&self, excluding: Option<ConnectionId>) -> Vec<PeerHandle> {
        self.members
            .values()
            .filter(|peer| Some(peer.id) != excluding)
            .cloned()
            .collect()
    }
}

/// Statistics for a room
#[derive(Debug, Clone)]
pub struct RoomStats {
    /// Number of connected members
    pub member_count: usize,
    /// Number of transcript lines
    pub transcript_len: usize,
    /// When the room was created
    pub created_at: Instant,
}

/// Result of [`RoomRegistry::join`](super::RoomRegistry::join)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinOutcome {
    /// The room did not exist and was created by this join
    pub room_created: bool,
    /// The connection was already a member; nothing changed
    pub already_member: bool,
    /// Members after the join
    pub member_count: usize,
}

/// Result of [`RoomRegistry::leave`](super::RoomRegistry::leave)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The connection was a member and has been removed
    pub removed: bool,
    /// The room became empty and was deleted
    pub room_deleted: bool,
}
