use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use stagelink_registry::SessionRegistry;

use crate::dispatcher::handle_connection;

/// Default maximum number of concurrent device connections.
const DEFAULT_MAX_CONNECTIONS: usize = 256;

/// WebSocket endpoint devices connect to.
///
/// Accepts TCP connections, performs the WebSocket handshake, and spawns one
/// dispatcher task per client until the cancellation token fires. A semaphore
/// caps concurrency; connections past the limit are dropped before the
/// handshake.
pub struct WsServer {
    addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    cancel: CancellationToken,
    max_connections: usize,
}

impl WsServer {
    pub fn new(addr: SocketAddr, registry: Arc<SessionRegistry>, cancel: CancellationToken) -> Self {
        Self {
            addr,
            registry,
            cancel,
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Set the maximum number of concurrent device connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Run the server: bind TCP, accept connections, and spawn per-client
    /// handlers until the cancellation token fires.
    pub async fn run(&self) -> std::io::Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!(addr = %self.addr, max_connections = self.max_connections, "ws server listening");
        self.serve(listener).await
    }

    /// Bind to the configured address and return the actual local address.
    /// Useful when binding to port 0 to get an OS-assigned ephemeral port.
    pub async fn bind(&self) -> std::io::Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(addr = %local_addr, max_connections = self.max_connections, "ws server bound");
        Ok((listener, local_addr))
    }

    /// Run the accept loop on a pre-bound listener.
    pub async fn serve(&self, listener: TcpListener) -> std::io::Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.max_connections));

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            let permit = match semaphore.clone().try_acquire_owned() {
                                Ok(permit) => permit,
                                Err(_) => {
                                    tracing::warn!(
                                        peer = %peer,
                                        max = self.max_connections,
                                        "connection limit reached, rejecting"
                                    );
                                    drop(stream);
                                    continue;
                                }
                            };
                            tracing::debug!(peer = %peer, "TCP connection accepted");
                            let registry = Arc::clone(&self.registry);
                            let cancel = self.cancel.clone();
                            tokio::spawn(async move {
                                let _permit = permit;
                                match tokio_tungstenite::accept_async(stream).await {
                                    Ok(ws_stream) => {
                                        handle_connection(ws_stream, registry, cancel).await;
                                    }
                                    Err(e) => {
                                        tracing::debug!(peer = %peer, error = %e, "ws handshake failed");
                                    }
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "TCP accept failed");
                        }
                    }
                }
                _ = self.cancel.cancelled() => {
                    tracing::info!("ws server: cancellation requested, shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
