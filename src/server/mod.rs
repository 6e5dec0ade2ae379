//! Status HTTP server
//!
//! Binding and serving are split so the caller learns the bound address
//! (and can flip `server_ready`) before any request is handled.

pub mod handlers;
pub mod router;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::error::{ReplyError, Result};
use crate::state::BotState;

pub struct StatusServer {
    state: Arc<BotState>,
}

impl StatusServer {
    pub fn new(state: Arc<BotState>) -> Self {
        Self { state }
    }

    /// Bind the listener. A failure here is fatal for the process.
    pub async fn bind(self, addr: &str) -> Result<BoundServer> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ReplyError::Server(format!("Failed to bind to {addr}: {e}")))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ReplyError::Server(format!("Failed to read local address: {e}")))?;

        Ok(BoundServer {
            listener,
            app: router::build(self.state),
            local_addr,
        })
    }
}

/// A bound, not yet serving, status server
pub struct BoundServer {
    listener: TcpListener,
    app: Router,
    local_addr: SocketAddr,
}

impl BoundServer {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` resolves.
    ///
    /// The bound address is sent on `ready` before the serve loop starts.
    pub async fn serve_with_ready<F>(self, ready: oneshot::Sender<SocketAddr>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        tracing::info!("Status server listening on {}", self.local_addr);
        if ready.send(self.local_addr).is_err() {
            tracing::debug!("Readiness receiver dropped before server start");
        }

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ReplyError::Server(format!("Server error: {e}")))?;

        tracing::info!("Status server stopped");
        Ok(())
    }
}
