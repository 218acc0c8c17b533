//! Room fan-out
//!
//! Sends one payload to every member of a room except the sender. The member
//! list is a snapshot taken from the registry, so no registry lock is held
//! while peers are being written to.

use std::sync::Arc;

use futures_util::future::join_all;

use crate::registry::{ConnectionId, Delivery, Payload, RoomRegistry};

/// Outcome of one fan-out
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Peers whose queue accepted the payload
    pub delivered: usize,
    /// Peers whose connection was already gone
    pub unreachable: usize,
}

impl BroadcastReport {
    /// Total peers the payload was offered to
    pub fn attempted(&self) -> usize {
        self.delivered + self.unreachable
    }
}

/// Fans payloads out to room members
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<RoomRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        Self { registry }
    }

    /// Send `payload` to every member of `room` other than `excluding`
    ///
    /// Each peer is attempted independently. An unreachable peer is counted
    /// and skipped; it is not removed here; its own connection teardown does
    /// that.
    pub async fn broadcast(
        &self,
        room: &str,
        payload: Payload,
        excluding: Option<ConnectionId>,
    ) -> BroadcastReport {
        let peers = self.registry.members_excluding(room, excluding).await;
        if peers.is_empty() {
            return BroadcastReport::default();
        }

        let sends = peers.iter().map(|peer| {
            let payload = payload.clone();
            async move { (peer.id(), peer.send(payload).await) }
        });

        let mut report = BroadcastReport::default();
        for (peer_id, delivery) in join_all(sends).await {
            match delivery {
                Delivery::Delivered => report.delivered += 1,
                Delivery::PeerUnreachable => {
                    report.unreachable += 1;
                    tracing::debug!(room = %room, connection_id = peer_id, "Peer unreachable");
                }
            }
        }

        report
    }
}
