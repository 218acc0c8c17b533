//! Room registry implementation
//!
//! The central registry that tracks which connections belong to which room
//! and owns each room's transcript.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use super::config::RegistryConfig;
use super::frame::{ConnectionId, RoomId};
use super::room::{JoinOutcome, LeaveOutcome, PeerHandle, Room, RoomStats};
use super::transcript::{Transcript, TranscriptLine};

/// Everything the report generator reads for one room
#[derive(Debug, Clone, Serialize)]
pub struct RoomReport {
    /// Room identifier
    pub room: String,
    /// Caption lines in arrival order
    pub transcript: Vec<TranscriptLine>,
    /// Data attached under the same room key (e.g. resume analysis)
    pub attachment: Option<serde_json::Value>,
}

/// Central registry for all live rooms
///
/// Thread-safe via `RwLock`. The outer map lock is taken for writing only
/// when a room is created or deleted; member snapshots and transcript appends
/// take it for reading and lock the single room entry.
///
/// No lock is ever held while a payload is delivered: callers take a
/// snapshot with [`members_excluding`](Self::members_excluding), the locks
/// are released, and only then do sends happen.
pub struct RoomRegistry {
    /// Map of room key to room entry
    rooms: RwLock<HashMap<RoomId, Arc<RwLock<Room>>>>,

    /// Transcripts of deleted rooms (only with `retain_transcripts`)
    archived: RwLock<HashMap<RoomId, Transcript>>,

    /// Opaque collaborator data stored by room key
    attachments: RwLock<HashMap<RoomId, serde_json::Value>>,

    /// Configuration
    config: RegistryConfig,
}

impl RoomRegistry {
    /// Create a new room registry with default configuration
    pub fn new() -> Self {
        Self::with_config(RegistryConfig::default())
    }

    /// Create a new room registry with custom configuration
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            archived: RwLock::new(HashMap::new()),
            attachments: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Add a connection to a room
    ///
    /// The room is created if it doesn't exist. Joining twice with the same
    /// connection ID leaves the member set unchanged.
    pub async fn join(&self, room: &RoomId, peer: PeerHandle) -> JoinOutcome {
        let mut rooms = self.rooms.write().await;
        let connection_id = peer.id();

        if let Some(entry_arc) = rooms.get(room) {
            let mut entry = entry_arc.write().await;
            let inserted = entry.insert(peer);

            tracing::debug!(
                room = %room,
                connection_id = connection_id,
                members = entry.member_count(),
                "Connection joined room"
            );

            return JoinOutcome {
                room_created: false,
                already_member: !inserted,
                member_count: entry.member_count(),
            };
        }

        let transcript = if self.config.retain_transcripts {
            self.archived.write().await.remove(room).unwrap_or_default()
        } else {
            Transcript::new()
        };

        let mut entry = Room::new(transcript);
        entry.insert(peer);
        rooms.insert(room.clone(), Arc::new(RwLock::new(entry)));

        tracing::info!(
            room = %room,
            connection_id = connection_id,
            "Room created"
        );

        JoinOutcome {
            room_created: true,
            already_member: false,
            member_count: 1,
        }
    }

    /// Remove a connection from a room
    ///
    /// Deletes the room once its last member leaves. Leaving a room that
    /// doesn't exist, or that the connection isn't in, is a no-op.
    pub async fn leave(&self, room: &str, connection_id: ConnectionId) -> LeaveOutcome {
        let mut rooms = self.rooms.write().await;

        let Some(entry_arc) = rooms.get(room) else {
            return LeaveOutcome {
                removed: false,
                room_deleted: false,
            };
        };

        let (removed, empty) = {
            let mut entry = entry_arc.write().await;
            (entry.remove(connection_id), entry.is_empty())
        };

        if removed {
            tracing::debug!(
                room = %room,
                connection_id = connection_id,
                "Connection left room"
            );
        }

        if !empty {
            return LeaveOutcome {
                removed,
                room_deleted: false,
            };
        }

        if let Some((key, entry_arc)) = rooms.remove_entry(room) {
            if self.config.retain_transcripts {
                let transcript = std::mem::take(&mut entry_arc.write().await.transcript);
                let mut archived = self.archived.write().await;
                archived.entry(key.clone()).or_default().extend(transcript);
            }
            tracing::info!(room = %key, "Room deleted");
        }

        LeaveOutcome {
            removed,
            room_deleted: true,
        }
    }

    /// Snapshot of every member of `room` except `excluding`
    ///
    /// The returned handles are a copy; later joins and leaves don't affect
    /// it. Returns an empty list if the room doesn't exist.
    pub async fn members_excluding(
        &self,
        room: &str,
        excluding: Option<ConnectionId>,
    ) -> Vec<PeerHandle> {
        let rooms = self.rooms.read().await;

        if let Some(entry_arc) = rooms.get(room) {
            entry_arc.read().await.snapshot_excluding(excluding)
        } else {
            Vec::new()
        }
    }

    /// Append a caption line to a room's transcript
    ///
    /// Returns false if the room doesn't exist; no room is created.
    pub async fn append_transcript(&self, room: &str, line: TranscriptLine) -> bool {
        let rooms = self.rooms.read().await;

        if let Some(entry_arc) = rooms.get(room) {
            entry_arc.write().await.transcript.push(line);
            true
        } else {
            false
        }
    }

    /// Point-in-time copy of a room's transcript
    ///
    /// Falls back to the archived transcript of a deleted room when
    /// `retain_transcripts` is enabled. Empty if neither exists.
    pub async fn transcript(&self, room: &str) -> Vec<TranscriptLine> {
        {
            let rooms = self.rooms.read().await;
            if let Some(entry_arc) = rooms.get(room) {
                return entry_arc.read().await.transcript.lines().to_vec();
            }
        }

        self.archived
            .read()
            .await
            .get(room)
            .map(|transcript| transcript.lines().to_vec())
            .unwrap_or_default()
    }

    /// Transcript lines spoken by one sender label, in order
    ///
    /// Same lookup rules as [`transcript`](Self::transcript).
    pub async fn transcript_from(&self, room: &str, sender: &str) -> Vec<TranscriptLine> {
        {
            let rooms = self.rooms.read().await;
            if let Some(entry_arc) = rooms.get(room) {
                return entry_arc
                    .read()
                    .await
                    .transcript
                    .lines_from(sender)
                    .cloned()
                    .collect();
            }
        }

        self.archived
            .read()
            .await
            .get(room)
            .map(|transcript| transcript.lines_from(sender).cloned().collect())
            .unwrap_or_default()
    }

    /// Store collaborator data under a room key, replacing any previous value
    ///
    /// The value is never inspected and doesn't depend on the room being live.
    pub async fn attach(&self, room: &RoomId, value: serde_json::Value) {
        self.attachments.write().await.insert(room.clone(), value);
        tracing::debug!(room = %room, "Attachment stored");
    }

    /// Data stored with [`attach`](Self::attach)
    pub async fn attachment(&self, room: &str) -> Option<serde_json::Value> {
        self.attachments.read().await.get(room).cloned()
    }

    /// Transcript and attachment of a room in one snapshot
    pub async fn report(&self, room: &str) -> RoomReport {
        RoomReport {
            room: room.to_string(),
            transcript: self.transcript(room).await,
            attachment: self.attachment(room).await,
        }
    }

    /// Check if a room currently exists
    pub async fn room_exists(&self, room: &str) -> bool {
        self.rooms.read().await.contains_key(room)
    }

    /// Number of members in a room (0 if it doesn't exist)
    pub async fn member_count(&self, room: &str) -> usize {
        let rooms = self.rooms.read().await;

        if let Some(entry_arc) = rooms.get(room) {
            entry_arc.read().await.member_count()
        } else {
            0
        }
    }

    /// Check if a connection is a member of a room
    pub async fn is_member(&self, room: &str, connection_id: ConnectionId) -> bool {
        let rooms = self.rooms.read().await;

        if let Some(entry_arc) = rooms.get(room) {
            entry_arc.read().await.contains(connection_id)
        } else {
            false
        }
    }

    /// Get room statistics
    pub async fn room_stats(&self, room: &str) -> Option<RoomStats> {
        let rooms = self.rooms.read().await;
        let entry_arc = rooms.get(room)?;
        let entry = entry_arc.read().await;

        Some(RoomStats {
            member_count: entry.member_count(),
            transcript_len: entry.transcript.len(),
            created_at: entry.created_at,
        })
    }

    /// Get total number of live rooms
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use crate::registry::frame::Payload;

    fn peer(id: ConnectionId) -> (PeerHandle, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(8);
        (PeerHandle::new(id, tx), rx)
    }

    #[tokio::test]
    async fn test_join_creates_room() {
        let registry = RoomRegistry::new();
        let room = RoomId::new("r1");
        let (a, _ra) = peer(1);
        let (b, _rb) = peer(2);

        let outcome = registry.join(&room, a).await;
        assert!(outcome.room_created);
        assert_eq!(outcome.member_count, 1);

        let outcome = registry.join(&room, b).await;
        assert!(!outcome.room_created);
        assert_eq!(outcome.member_count, 2);

        assert!(registry.room_exists("r1").await);
        assert_eq!(registry.room_count().await, 1);
    }

    #[tokio::test]
    async fn test_join_twice_is_idempotent() {
        let registry = RoomRegistry::new();
        let room = RoomId::new("r1");
        let (a, _ra) = peer(1);

        registry.join(&room, a.clone()).await;
        let outcome = registry.join(&room, a).await;

        assert!(outcome.already_member);
        assert_eq!(registry.member_count("r1").await, 1);
    }

    #[tokio::test]
    async fn test_last_leave_deletes_room() {
        let registry = RoomRegistry::new();
        let room = RoomId::new("r1");
        let (a, _ra) = peer(1);
        let (b, _rb) = peer(2);
        registry.join(&room, a).await;
        registry.join(&room, b).await;

        let outcome = registry.leave("r1", 2).await;
        assert!(outcome.removed);
        assert!(!outcome.room_deleted);
        assert_eq!(registry.member_count("r1").await, 1);

        let outcome = registry.leave("r1", 1).await;
        assert!(outcome.removed);
        assert!(outcome.room_deleted);
        assert!(!registry.room_exists("r1").await);
        assert_eq!(registry.room_count().await, 0);
        assert!(registry.members_excluding("r1", None).await.is_empty());
    }

    #[tokio::test]
    async fn test_leave_absent_is_noop() {
        let registry = RoomRegistry::new();
        let room = RoomId::new("r1");
        let (a, _ra) = peer(1);

        let outcome = registry.leave("nowhere", 1).await;
        assert!(!outcome.removed);
        assert!(!outcome.room_deleted);

        registry.join(&room, a).await;
        let outcome = registry.leave("r1", 99).await;
        assert!(!outcome.removed);
        assert!(!outcome.room_deleted);
        assert!(registry.is_member("r1", 1).await);

        registry.leave("r1", 1).await;
        let outcome = registry.leave("r1", 1).await;
        assert!(!outcome.removed);
    }

    #[tokio::test]
    async fn test_members_excluding_is_snapshot() {
        let registry = RoomRegistry::new();
        let room = RoomId::new("r1");
        let (a, _ra) = peer(1);
        let (b, _rb) = peer(2);
        registry.join(&room, a).await;
        registry.join(&room, b).await;

        let snapshot = registry.members_excluding("r1", Some(1)).await;
        registry.leave("r1", 2).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), 2);
        assert!(registry.members_excluding("r1", Some(1)).await.is_empty());
    }

    #[tokio::test]
    async fn test_transcript_dropped_with_room() {
        let registry = RoomRegistry::new();
        let room = RoomId::new("r1");
        let (a, _ra) = peer(1);
        registry.join(&room, a).await;

        assert!(
            registry
                .append_transcript("r1", TranscriptLine::new("Alice", "Hello"))
                .await
        );
        assert_eq!(
            registry.transcript("r1").await,
            vec![TranscriptLine::new("Alice", "Hello")]
        );
        assert_eq!(registry.room_stats("r1").await.unwrap().transcript_len, 1);

        registry.leave("r1", 1).await;
        assert!(registry.transcript("r1").await.is_empty());
        assert!(registry.room_stats("r1").await.is_none());
    }

    #[tokio::test]
    async fn test_transcript_from_sender() {
        let registry = RoomRegistry::with_config(RegistryConfig::default().retain_transcripts(true));
        let room = RoomId::new("r1");
        let (a, _ra) = peer(1);
        registry.join(&room, a).await;

        for (sender, text) in [
            ("Interviewer", "Tell me about a project"),
            ("Candidate", "I built a relay"),
            ("Interviewer", "In what language?"),
            ("Candidate", "Rust"),
        ] {
            registry
                .append_transcript("r1", TranscriptLine::new(sender, text))
                .await;
        }

        let expected = vec![
            TranscriptLine::new("Candidate", "I built a relay"),
            TranscriptLine::new("Candidate", "Rust"),
        ];
        assert_eq!(registry.transcript_from("r1", "Candidate").await, expected);
        assert!(registry.transcript_from("r1", "Observer").await.is_empty());

        // Still readable from the archive once the room is gone
        registry.leave("r1", 1).await;
        assert!(!registry.room_exists("r1").await);
        assert_eq!(registry.transcript_from("r1", "Candidate").await, expected);
        assert!(registry.transcript_from("nowhere", "Candidate").await.is_empty());
    }

    #[tokio::test]
    async fn test_append_to_absent_room() {
        let registry = RoomRegistry::new();

        assert!(
            !registry
                .append_transcript("ghost", TranscriptLine::new("Alice", "Hello"))
                .await
        );
        assert!(!registry.room_exists("ghost").await);
    }

    #[tokio::test]
    async fn test_retained_transcript() {
        let registry = RoomRegistry::with_config(RegistryConfig::default().retain_transcripts(true));
        let room = RoomId::new("r1");

        let (a, _ra) = peer(1);
        registry.join(&room, a).await;
        registry
            .append_transcript("r1", TranscriptLine::new("Candidate", "First"))
            .await;
        registry.leave("r1", 1).await;

        assert!(!registry.room_exists("r1").await);
        assert_eq!(registry.transcript("r1").await.len(), 1);

        // Rejoining continues the same transcript
        let (b, _rb) = peer(2);
        registry.join(&room, b).await;
        registry
            .append_transcript("r1", TranscriptLine::new("Candidate", "Second"))
            .await;

        let texts: Vec<_> = registry
            .transcript("r1")
            .await
            .into_iter()
            .map(|line| line.text)
            .collect();
        assert_eq!(texts, vec!["First", "Second"]);
    }

    #[tokio::test]
    async fn test_report() {
        let registry = RoomRegistry::new();
        let room = RoomId::new("r1");

        // Attachments may arrive before anyone joins
        registry
            .attach(&room, serde_json::json!({ "candidate_name": "Jane Doe" }))
            .await;
        assert!(!registry.room_exists("r1").await);

        let (a, _ra) = peer(1);
        registry.join(&room, a).await;
        registry
            .append_transcript("r1", TranscriptLine::new("Candidate", "Hello"))
            .await;

        let report = registry.report("r1").await;
        assert_eq!(report.room, "r1");
        assert_eq!(report.transcript.len(), 1);
        assert_eq!(
            report.attachment.unwrap()["candidate_name"],
            serde_json::json!("Jane Doe")
        );

        registry.leave("r1", 1).await;
        assert!(registry.attachment("r1").await.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_join_leave() {
        let registry = Arc::new(RoomRegistry::new());
        let room = RoomId::new("busy");
        let mut handles = Vec::new();

        for id in 0..64u64 {
            let registry = Arc::clone(&registry);
            let room = room.clone();
            handles.push(tokio::spawn(async move {
                let (tx, _rx) = mpsc::channel(1);
                let peer = PeerHandle::new(id, tx);
                registry.join(&room, peer.clone()).await;
                registry.join(&room, peer).await;
                if id % 2 == 0 {
                    registry.leave(room.as_str(), id).await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let mut ids: Vec<_> = registry
            .members_excluding("busy", None)
            .await
            .iter()
            .map(|peer| peer.id())
            .collect();
        ids.sort();
        let expected: Vec<u64> = (0..64).filter(|id| id % 2 == 1).collect();
        assert_eq!(ids, expected);

        for id in expected {
            registry.leave("busy", id).await;
        }
        assert!(!registry.room_exists("busy").await);
    }
}
