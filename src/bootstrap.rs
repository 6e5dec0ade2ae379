//! Process wiring shared by the CLI and embedders
//!
//! Startup order: bind the status server, wait until it reports its
//! address, mark `server_ready`, then start session initialization in the
//! background. Shutdown stops initialization, disconnects the session and
//! stops the reply dispatcher before stopping HTTP.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::config::BotConfig;
use crate::error::{ReplyError, Result};
use crate::initializer::SessionInitializer;
use crate::server::StatusServer;
use crate::session::SessionProvider;
use crate::state::BotState;

/// A running bot: status server plus session initialization
pub struct BotHandle {
    pub state: Arc<BotState>,
    local_addr: SocketAddr,
    server: JoinHandle<Result<()>>,
    init: JoinHandle<()>,
    stop_tx: oneshot::Sender<()>,
}

impl BotHandle {
    /// Address the status server is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop initialization, disconnect the session, stop the reply
    /// dispatcher, then stop the status server and wait for it.
    pub async fn shutdown(self) -> Result<()> {
        // Initialization must not install a session or dispatcher after this
        self.init.abort();
        let _ = self.init.await;

        if let Some(session) = self.state.take_session().await {
            session.disconnect().await;
            tracing::info!("Session disconnected");
        }

        if let Some(dispatcher) = self.state.take_dispatcher().await {
            dispatcher.abort();
            if let Err(e) = dispatcher.await {
                if !e.is_cancelled() {
                    tracing::warn!(error = %e, "Reply dispatcher task failed");
                }
            }
            tracing::debug!("Reply dispatcher stopped");
        }

        let _ = self.stop_tx.send(());
        self.server
            .await
            .map_err(|e| ReplyError::Server(format!("Server task failed: {e}")))?
    }
}

/// Start the bot with the default reply table.
pub async fn start_bot(config: BotConfig, provider: Arc<dyn SessionProvider>) -> Result<BotHandle> {
    let state = BotState::new();
    let initializer = SessionInitializer::new(provider, state.clone(), config.clone());
    start_with(&config, state, initializer).await
}

/// Start the bot with a caller-built initializer sharing `state`.
pub async fn start_with(
    config: &BotConfig,
    state: Arc<BotState>,
    initializer: SessionInitializer,
) -> Result<BotHandle> {
    let bound = StatusServer::new(state.clone())
        .bind(&config.bind_address())
        .await?;

    let (ready_tx, ready_rx) = oneshot::channel();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(bound.serve_with_ready(ready_tx, async {
        let _ = stop_rx.await;
    }));

    let local_addr = ready_rx
        .await
        .map_err(|_| ReplyError::Server("Status server exited before becoming ready".to_string()))?;
    state.readiness.mark_server_ready();
    tracing::info!(%local_addr, "HTTP server is ready and listening");

    let init = initializer.spawn();

    Ok(BotHandle {
        state,
        local_addr,
        server,
        init,
        stop_tx,
    })
}

/// Resolve on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT"),
        _ = terminate => tracing::info!("Received SIGTERM"),
    }
}
