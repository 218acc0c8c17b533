//! Per-connection lifecycle
//!
//! Each accepted socket gets one `Connection`, which performs the WebSocket
//! handshake, binds the peer to the room named in the request path, runs the
//! receive loop and, on every exit path, removes the peer from its room.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::{Error, Result};
use crate::registry::{ConnectionId, Payload, PeerHandle, RoomId, RoomRegistry};
use crate::relay::MessageRouter;
use crate::server::config::ServerConfig;

/// Path prefix of the relay endpoint (`/ws/{room}`)
pub const ROOM_PATH_PREFIX: &str = "/ws/";

type WsStream = WebSocketStream<TcpStream>;

/// Extract the room from a request path
///
/// Accepts exactly one non-empty, percent-encoded segment after `/ws/`.
pub fn parse_room_path(path: &str) -> Option<RoomId> {
    let segment = path.strip_prefix(ROOM_PATH_PREFIX)?;
    if segment.is_empty() || segment.contains('/') {
        return None;
    }

    let decoded = urlencoding::decode(segment).ok()?;
    if decoded.is_empty() {
        return None;
    }

    Some(RoomId::new(decoded.into_owned()))
}

fn not_found() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some("Unknown relay endpoint".to_string()));
    *response.status_mut() = StatusCode::NOT_FOUND;
    response
}

/// Why a receive loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// Peer sent a close frame
    Closed,
    /// Stream ended or the transport failed
    Disconnected,
    /// Nothing received within the idle timeout
    Idle,
}

/// Room membership held by a running connection
///
/// `release` removes the peer from its room. If the guard is dropped without
/// being released (panic, task abort) the removal is spawned on the runtime
/// instead, so the room never keeps a dead member.
struct Membership {
    registry: Arc<RoomRegistry>,
    room: RoomId,
    connection_id: ConnectionId,
    active: bool,
}

impl Membership {
    async fn join(registry: Arc<RoomRegistry>, room: RoomId, peer: PeerHandle) -> Self {
        let connection_id = peer.id();
        registry.join(&room, peer).await;

        Self {
            registry,
            room,
            connection_id,
            active: true,
        }
    }

    async fn release(mut self) {
        self.registry
            .leave(self.room.as_str(), self.connection_id)
            .await;
        self.active = false;
    }
}

impl Drop for Membership {
    fn drop(&mut self) {
        if !self.active {
            return;
        }

        let registry = Arc::clone(&self.registry);
        let room = self.room.clone();
        let connection_id = self.connection_id;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    registry.leave(room.as_str(), connection_id).await;
                });
            }
            Err(_) => {
                tracing::warn!(
                    room = %room,
                    connection_id = connection_id,
                    "Runtime gone, membership not released"
                );
            }
        }
    }
}

/// A single relay connection
pub struct Connection {
    id: ConnectionId,
    peer_addr: SocketAddr,
    config: ServerConfig,
    registry: Arc<RoomRegistry>,
    router: MessageRouter,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        peer_addr: SocketAddr,
        config: ServerConfig,
        registry: Arc<RoomRegistry>,
        router: MessageRouter,
    ) -> Self {
        Self {
            id,
            peer_addr,
            config,
            registry,
            router,
        }
    }

    /// Run the connection to completion
    ///
    /// Returns after the peer is gone and has been removed from its room.
    /// Errors are handshake failures or protocol violations; ordinary
    /// disconnects return `Ok`.
    pub async fn run(self, socket: TcpStream) -> Result<ExitReason> {
        let (ws, room) = self.handshake(socket).await?;
        let (sink, mut stream) = ws.split();

        let (tx, rx) = mpsc::channel(self.config.peer_queue_capacity);
        let membership = Membership::join(
            Arc::clone(&self.registry),
            room.clone(),
            PeerHandle::new(self.id, tx),
        )
        .await;

        tracing::debug!(
            connection_id = self.id,
            peer = %self.peer_addr,
            room = %room,
            "Connection joined"
        );

        let mut writer = tokio::spawn(write_loop(self.id, sink, rx));

        let result = until_either(
            self.receive_loop(&room, &mut stream),
            &mut writer,
            self.id,
        )
        .await;

        membership.release().await;

        // The writer drains and closes once the registry drops our handle
        finish_writer(writer, self.config.close_timeout, self.id).await;

        result
    }

    async fn handshake(&self, socket: TcpStream) -> Result<(WsStream, RoomId)> {
        let mut room = None;
        let mut rejected = None;

        let callback = |request: &Request,
                        response: Response|
         -> std::result::Result<Response, ErrorResponse> {
            let path = request.uri().path();
            match parse_room_path(path) {
                Some(id) => {
                    room = Some(id);
                    Ok(response)
                }
                None => {
                    rejected = Some(path.to_string());
                    Err(not_found())
                }
            }
        };

        let ws_config =
            WebSocketConfig::default().max_message_size(Some(self.config.max_message_size));
        let accept =
            tokio_tungstenite::accept_hdr_async_with_config(socket, callback, Some(ws_config));

        let accepted = tokio::time::timeout(self.config.handshake_timeout, accept).await;
        let ws = match accepted {
            Err(_) => return Err(Error::HandshakeTimeout(self.config.handshake_timeout)),
            Ok(Err(e)) => {
                return Err(match rejected {
                    Some(path) => Error::InvalidRoom(path),
                    None => e.into(),
                })
            }
            Ok(Ok(ws)) => ws,
        };

        let room = room.ok_or_else(|| Error::InvalidRoom(String::new()))?;
        Ok((ws, room))
    }

    async fn receive_loop(
        &self,
        room: &RoomId,
        stream: &mut SplitStream<WsStream>,
    ) -> Result<ExitReason> {
        loop {
            let next = match self.config.idle_timeout {
                Some(idle) => match tokio::time::timeout(idle, stream.next()).await {
                    Ok(next) => next,
                    Err(_) => return Ok(ExitReason::Idle),
                },
                None => stream.next().await,
            };

            let message = match next {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    let e = Error::from(e);
                    return if e.is_disconnect() {
                        Ok(ExitReason::Disconnected)
                    } else {
                        Err(e)
                    };
                }
                None => return Ok(ExitReason::Disconnected),
            };

            if let Message::Close(_) = message {
                return Ok(ExitReason::Closed);
            }

            // Control frames are handled by the transport
            let Some(payload) = Payload::from_message(message) else {
                continue;
            };

            let outcome = self.router.route(room.as_str(), self.id, payload).await;
            tracing::trace!(
                room = %room,
                connection_id = self.id,
                outcome = ?outcome,
                "Message routed"
            );
        }
    }
}

/// Run the receive loop until it ends or the writer stops first
///
/// A stopped writer means the peer can no longer be written to, which ends
/// the connection as a disconnect.
async fn until_either<F>(
    receive: F,
    writer: &mut JoinHandle<()>,
    connection_id: ConnectionId,
) -> Result<ExitReason>
where
    F: Future<Output = Result<ExitReason>>,
{
    tokio::select! {
        result = receive => result,
        joined = writer => {
            if let Err(e) = joined {
                tracing::debug!(connection_id = connection_id, error = %e, "Writer task failed");
            }
            tracing::debug!(connection_id = connection_id, "Peer no longer writable");
            Ok(ExitReason::Disconnected)
        }
    }
}

/// Wait up to `timeout` for the writer to flush and close, then abort it
async fn finish_writer(mut writer: JoinHandle<()>, timeout: Duration, connection_id: ConnectionId) {
    if writer.is_finished() {
        return;
    }

    match tokio::time::timeout(timeout, &mut writer).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::debug!(connection_id = connection_id, error = %e, "Writer task failed");
        }
        Err(_) => {
            writer.abort();
            tracing::debug!(connection_id = connection_id, "Writer did not drain, aborted");
        }
    }
}

async fn write_loop(
    connection_id: ConnectionId,
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::Receiver<Payload>,
) {
    while let Some(payload) = rx.recv().await {
        if let Err(e) = sink.send(payload.into()).await {
            // Dropping rx marks this peer unreachable for broadcasters
            tracing::debug!(connection_id = connection_id, error = %e, "Write failed");
            return;
        }
    }

    let _ = sink.close().await;
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[test]
    fn test_parse_room_path() {
        assert_eq!(parse_room_path("/ws/r1"), Some(RoomId::new("r1")));
        assert_eq!(
            parse_room_path("/ws/interview%2042"),
            Some(RoomId::new("interview 42"))
        );
        assert_eq!(parse_room_path("/ws/"), None);
        assert_eq!(parse_room_path("/ws/r1/extra"), None);
        assert_eq!(parse_room_path("/ws"), None);
        assert_eq!(parse_room_path("/rooms/r1"), None);
        assert_eq!(parse_room_path("/ws/%FF"), None);
    }

    #[tokio::test]
    async fn test_membership_release() {
        let registry = Arc::new(RoomRegistry::new());
        let (tx, _rx) = mpsc::channel(1);

        let membership = Membership::join(
            Arc::clone(&registry),
            RoomId::new("r1"),
            PeerHandle::new(1, tx),
        )
        .await;
        assert!(registry.is_member("r1", 1).await);

        membership.release().await;
        assert!(!registry.room_exists("r1").await);
    }

    #[tokio::test]
    async fn test_membership_dropped_without_release() {
        let registry = Arc::new(RoomRegistry::new());
        let (tx, _rx) = mpsc::channel(1);

        let membership = Membership::join(
            Arc::clone(&registry),
            RoomId::new("r1"),
            PeerHandle::new(1, tx),
        )
        .await;
        drop(membership);

        for _ in 0..50 {
            if !registry.room_exists("r1").await {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("room still registered after membership was dropped");
    }

    #[tokio::test]
    async fn test_writer_exit_releases_membership() {
        let registry = Arc::new(RoomRegistry::new());
        let (tx, rx) = mpsc::channel(1);

        let membership = Membership::join(
            Arc::clone(&registry),
            RoomId::new("r1"),
            PeerHandle::new(1, tx),
        )
        .await;

        // Writer gives up on its socket and drops the queue
        let mut writer = tokio::spawn(async move { drop(rx) });
        let receive = std::future::pending::<Result<ExitReason>>();

        let reason = until_either(receive, &mut writer, 1).await.unwrap();
        assert_eq!(reason, ExitReason::Disconnected);

        membership.release().await;
        assert!(!registry.is_member("r1", 1).await);
        assert!(!registry.room_exists("r1").await);
    }

    #[tokio::test]
    async fn test_receive_exit_wins_while_writer_runs() {
        let mut writer = tokio::spawn(std::future::pending::<()>());
        let receive = async { Ok(ExitReason::Closed) };

        let reason = until_either(receive, &mut writer, 1).await.unwrap();

        assert_eq!(reason, ExitReason::Closed);
        writer.abort();
    }

    #[tokio::test]
    async fn test_stuck_writer_is_aborted() {
        let writer = tokio::spawn(std::future::pending::<()>());
        let abort = writer.abort_handle();

        let finished = tokio::time::timeout(
            Duration::from_secs(2),
            finish_writer(writer, Duration::from_millis(50), 1),
        )
        .await;

        assert!(finished.is_ok());
        for _ in 0..50 {
            if abort.is_finished() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("writer still running after close timeout");
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Connects but never sends an upgrade request
        let _client = TcpStream::connect(addr).await.unwrap();
        let (socket, peer_addr) = listener.accept().await.unwrap();

        let registry = Arc::new(RoomRegistry::new());
        let config = ServerConfig::default().handshake_timeout(Duration::from_millis(50));
        let connection = Connection::new(
            1,
            peer_addr,
            config,
            Arc::clone(&registry),
            MessageRouter::new(Arc::clone(&registry)),
        );

        let result = connection.run(socket).await;

        match result {
            Err(Error::HandshakeTimeout(timeout)) => {
                assert_eq!(timeout, Duration::from_millis(50))
            }
            other => panic!("expected handshake timeout, got {:?}", other),
        }
        assert_eq!(registry.room_count().await, 0);
    }
}
