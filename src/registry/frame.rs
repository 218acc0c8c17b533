//! Identifiers and wire payloads for room routing
//!
//! This module defines the keys that identify rooms and connections, and the
//! payload that is fanned out to peers.

use std::borrow::Borrow;

use bytes::Bytes;
use tokio_tungstenite::tungstenite::Message;

/// Opaque identifier of a room (the `{room}` path segment)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoomId(String);

impl RoomId {
    /// Create a new room identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the room name
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for RoomId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RoomId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl std::fmt::Display for RoomId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identity of a connection for the lifetime of the process
pub type ConnectionId = u64;

/// A message as it travels between peers
///
/// Text is used for caption events and JSON signaling. Binary frames are
/// always opaque. `Bytes` keeps binary fan-out reference-counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text frame
    Text(String),
    /// Binary frame
    Binary(Bytes),
}

impl Payload {
    /// Create a text payload
    pub fn text(text: impl Into<String>) -> Self {
        Payload::Text(text.into())
    }

    /// Get the text content, if this is a text payload
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Binary(_) => None,
        }
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        match self {
            Payload::Text(text) => text.len(),
            Payload::Binary(data) => data.len(),
        }
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert an inbound WebSocket message
    ///
    /// Returns `None` for control frames (ping, pong, close), which are never
    /// relayed.
    pub fn from_message(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(Payload::Text(text.as_str().to_owned())),
            Message::Binary(data) => Some(Payload::Binary(data)),
            Message::Ping(_) | Message::Pong(_) | Message::Close(_) | Message::Frame(_) => None,
        }
    }
}

impl From<Payload> for Message {
    fn from(payload: Payload) -> Self {
        match payload {
            Payload::Text(text) => Message::Text(text.into()),
            Payload::Binary(data) => Message::Binary(data),
        }
    }
}
