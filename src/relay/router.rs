//! Per-message routing
//!
//! Decides what happens to each inbound payload: captions are recorded and
//! rebroadcast in normalized form, everything else is relayed untouched.

use std::sync::Arc;

use crate::registry::{ConnectionId, Payload, RoomRegistry, TranscriptLine};

use super::broadcast::{BroadcastReport, Broadcaster};
use super::message::RelayMessage;

/// What the router did with one payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Caption recorded and rebroadcast
    Caption {
        line: TranscriptLine,
        report: BroadcastReport,
    },
    /// Caption with empty text; dropped
    EmptyCaption,
    /// Opaque payload relayed verbatim
    Relayed { report: BroadcastReport },
}

/// Routes inbound payloads for all connections
#[derive(Clone)]
pub struct MessageRouter {
    registry: Arc<RoomRegistry>,
    broadcaster: Broadcaster,
}

impl MessageRouter {
    pub fn new(registry: Arc<RoomRegistry>) -> Self {
        let broadcaster = Broadcaster::new(Arc::clone(&registry));
        Self {
            registry,
            broadcaster,
        }
    }

    /// Route one payload received from `from` in `room`
    pub async fn route(&self, room: &str, from: ConnectionId, payload: Payload) -> RouteOutcome {
        match RelayMessage::classify(payload) {
            RelayMessage::Caption(event) if event.is_empty() => RouteOutcome::EmptyCaption,
            RelayMessage::Caption(event) => {
                let line = event.to_line();
                if !self.registry.append_transcript(room, line.clone()).await {
                    tracing::debug!(
                        room = %room,
                        connection_id = from,
                        "Caption for a room that no longer exists"
                    );
                }

                let report = match event.to_json() {
                    Ok(json) => {
                        self.broadcaster
                            .broadcast(room, Payload::Text(json), Some(from))
                            .await
                    }
                    Err(e) => {
                        tracing::warn!(room = %room, error = %e, "Failed to encode caption");
                        BroadcastReport::default()
                    }
                };

                RouteOutcome::Caption { line, report }
            }
            RelayMessage::Opaque(payload) => {
                let report = self.broadcaster.broadcast(room, payload, Some(from)).await;
                RouteOutcome::Relayed { report }
            }
        }
    }
}
