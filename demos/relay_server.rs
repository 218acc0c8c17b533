//! Relay server binary
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                   # binds to 0.0.0.0:8000
//!   cargo run --example relay_server 127.0.0.1:9000    # binds to 127.0.0.1:9000
//!
//! Peers join a room by connecting to `ws://HOST:PORT/ws/{room}`. Anything a
//! peer sends is relayed to the other peers in the room. Caption events are
//! also recorded:
//!
//! ```text
//! {"type":"caption","text":"Hello","sender":"Candidate"}
//! ```
//!
//! Set `RUST_LOG=room_relay=debug` to see joins and leaves, or
//! `RUST_LOG=room_relay=trace` for every routed message. Transcripts are kept
//! after a room empties so they can still be read for reports.

use std::net::SocketAddr;
use std::time::Duration;

use room_relay::{RegistryConfig, RelayServer, ServerConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("room_relay=info")),
        )
        .init();

    let bind_addr: SocketAddr = match std::env::args().nth(1) {
        Some(addr) => addr.parse()?,
        None => "0.0.0.0:8000".parse()?,
    };

    let config = ServerConfig::with_addr(bind_addr).handshake_timeout(Duration::from_secs(5));
    let server = RelayServer::with_registry_config(
        config,
        RegistryConfig::default().retain_transcripts(true),
    );
    let registry = server.registry().clone();

    println!("Relay listening on ws://{}/ws/{{room}}", bind_addr);
    println!("Press Ctrl+C to stop\n");

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    println!("Live rooms at shutdown: {}", registry.room_count().await);

    Ok(())
}
