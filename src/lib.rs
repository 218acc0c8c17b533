//! Room-scoped WebSocket relay for peer-to-peer signaling and live captions
//!
//! Peers connect to `/ws/{room}` and every message they send is fanned out to
//! the other peers in the same room. Caption events (`{"type":"caption", ...}`)
//! are normalized and appended to the room's transcript; everything else
//! (SDP offers/answers, ICE candidates, malformed JSON) is relayed verbatim.
//!
//! # Example
//!
//! ```no_run
//! use room_relay::{RelayServer, ServerConfig};
//!
//! # async fn example() -> room_relay::error::Result<()> {
//! let server = RelayServer::new(ServerConfig::default());
//! let registry = server.registry().clone();
//!
//! tokio::spawn(async move { server.run().await });
//!
//! // Later, e.g. from a report generator:
//! let lines = registry.transcript("interview-42").await;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod registry;
pub mod relay;
pub mod server;

pub use error::{Error, Result};
pub use registry::{Payload, RegistryConfig, RoomId, RoomRegistry, TranscriptLine};
pub use relay::{Broadcaster, CaptionEvent, MessageRouter, RelayMessage};
pub use server::{RelayServer, ServerConfig};
