//! Relay server
//!
//! Accepts TCP connections, upgrades them to WebSocket at `/ws/{room}` and
//! runs one receive loop per connection.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::ServerConfig;
pub use connection::{parse_room_path, Connection, ExitReason};
pub use listener::RelayServer;
