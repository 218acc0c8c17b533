//! Relay server listener
//!
//! Handles the TCP accept loop and spawns one connection task per socket.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::Result;
use crate::registry::{RegistryConfig, RoomRegistry};
use crate::relay::MessageRouter;
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;

/// WebSocket relay server
pub struct RelayServer {
    config: ServerConfig,
    registry: Arc<RoomRegistry>,
    router: MessageRouter,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl RelayServer {
    /// Create a new server with the given configuration
    pub fn new(config: ServerConfig) -> Self {
        Self::with_registry_config(config, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(config: ServerConfig, registry_config: RegistryConfig) -> Self {
        Self::with_registry(config, Arc::new(RoomRegistry::with_config(registry_config)))
    }

    /// Create a new server sharing an existing registry
    pub fn with_registry(config: ServerConfig, registry: Arc<RoomRegistry>) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            router: MessageRouter::new(Arc::clone(&registry)),
            config,
            registry,
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the room registry
    pub fn registry(&self) -> &Arc<RoomRegistry> {
        &self.registry
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// Runs until the future is dropped or binding fails.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_until(listener, shutdown).await
    }

    /// Serve on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tracing::info!(addr = %listener.local_addr()?, "Relay server listening");
        self.accept_loop(&listener).await
    }

    /// Serve on an already bound listener until `shutdown` completes
    ///
    /// Connections already running keep going until their peers leave.
    pub async fn serve_until<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        tracing::info!(addr = %listener.local_addr()?, "Relay server listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit; the permit lives as long as the connection task
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            connection_id = connection_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::error!(error = %e, "Failed to configure socket");
                return;
            }
        }

        let connection = Connection::new(
            connection_id,
            peer_addr,
            self.config.clone(),
            Arc::clone(&self.registry),
            self.router.clone(),
        );

        tokio::spawn(async move {
            let _permit = permit;

            match connection.run(socket).await {
                Ok(reason) => {
                    tracing::debug!(
                        connection_id = connection_id,
                        reason = ?reason,
                        "Connection closed"
                    );
                }
                Err(e) if e.is_disconnect() => {
                    tracing::debug!(connection_id = connection_id, "Connection dropped");
                }
                Err(e) => {
                    tracing::warn!(
                        connection_id = connection_id,
                        peer = %peer_addr,
                        error = %e,
                        "Connection error"
                    );
                }
            }
        });
    }
}
