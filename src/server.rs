//! HTTP server for the gateway
//!
//! Accepts connections on the configured address and hands every request to
//! the shared [`DownloadHandler`]. Each connection is served on its own task.

use crate::error::Result;
use crate::handler::DownloadHandler;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// Gateway HTTP server
pub struct GatewayServer {
    handler: Arc<DownloadHandler>,
    addr: SocketAddr,
}

impl GatewayServer {
    /// Create a new server
    ///
    /// # Arguments
    /// * `handler` - Request handler shared by all connections
    /// * `addr` - Address to bind the HTTP server to
    pub fn new(handler: Arc<DownloadHandler>, addr: SocketAddr) -> Self {
        Self { handler, addr }
    }

    /// Bind the configured address and serve until the process exits
    pub async fn start(self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let local = listener.local_addr()?;
        info!("Media gateway listening on http://{}", local);

        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    // Usually descriptor exhaustion; back off instead of spinning.
                    error!("Failed to accept connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    continue;
                }
            };
            debug!("Accepted connection from {}", peer);

            let io = TokioIo::new(stream);
            let handler = Arc::clone(&self.handler);

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let handler = Arc::clone(&handler);
                    async move { Ok::<_, Infallible>(handler.handle(req).await) }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Error serving connection from {}: {:?}", peer, err);
                }
            });
        }
    }
}
