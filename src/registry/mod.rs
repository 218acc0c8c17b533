//! Room registry for peer routing
//!
//! The registry tracks which connections belong to which room and owns each
//! room's caption transcript. Rooms are created by the first `join` and
//! deleted by the last `leave`; an empty room never stays in the map.
//!
//! # Architecture
//!
//! ```text
//!                          Arc<RoomRegistry>
//!                     ┌─────────────────────────┐
//!                     │ rooms: HashMap<RoomId,  │
//!                     │   Room {                │
//!                     │     members,            │
//!                     │     transcript,         │
//!                     │   }                     │
//!                     │ >                       │
//!                     └───────────┬─────────────┘
//!                                 │ members_excluding() (snapshot, lock released)
//!         ┌───────────────────────┼───────────────────────┐
//!         │                       │                       │
//!         ▼                       ▼                       ▼
//!    [Sender loop]           [PeerHandle]            [PeerHandle]
//!    router.route()          mpsc::Sender            mpsc::Sender
//!         │                       │                       │
//!         └──► broadcaster ──► peer.send() ──► writer task ──► WebSocket
//! ```
//!
//! Members are held as [`PeerHandle`]s: the registry can queue payloads for a
//! connection but never owns its socket.

pub mod config;
pub mod frame;
pub mod room;
pub mod store;
pub mod transcript;

pub use config::RegistryConfig;
pub use frame::{ConnectionId, Payload, RoomId};
pub use room::{Delivery, JoinOutcome, LeaveOutcome, PeerHandle, Room, RoomStats};
pub use store::{RoomRegistry, RoomReport};
pub use transcript::{Transcript, TranscriptLine};
