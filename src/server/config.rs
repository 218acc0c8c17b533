//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default port the relay binds to
pub const DEFAULT_PORT: u16 = 8000;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    ///
    /// This bounds sockets for the whole server; rooms themselves have no
    /// capacity limit.
    pub max_connections: usize,

    /// WebSocket handshake must complete within this time
    pub handshake_timeout: Duration,

    /// Disconnect a peer that sends nothing for this long (None = never)
    pub idle_timeout: Option<Duration>,

    /// How long a leaving peer's writer may take to flush before it is aborted
    pub close_timeout: Duration,

    /// Outbound messages buffered per peer before broadcasts wait on it
    pub peer_queue_capacity: usize,

    /// Largest inbound WebSocket message accepted
    pub max_message_size: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            handshake_timeout: Duration::from_secs(10),
            idle_timeout: None,
            close_timeout: Duration::from_secs(5),
            peer_queue_capacity: 256,
            max_message_size: 1024 * 1024, // 1MB
            tcp_nodelay: true, // Signaling is latency sensitive
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set handshake timeout
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Enable idle connection reaping
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Set writer close timeout
    pub fn close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    /// Set per-peer outbound queue capacity (at least 1)
    pub fn peer_queue_capacity(mut self, capacity: usize) -> Self {
        self.peer_queue_capacity = capacity.max(1);
        self
    }

    /// Set maximum inbound message size
    pub fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }
}
