//! Session initializer
//!
//! Brings the session from "nothing" to "authenticated and dispatching":
//! open storage, register the event sink, connect, pair if needed, then
//! flip `client_ready`. Failures are logged and leave `client_ready` false;
//! the status server keeps running regardless.

use crate::config::BotConfig;
use crate::dirs;
use crate::dispatch::ReplyDispatcher;
use crate::error::{ReplyError, Result};
use crate::pairing;
use crate::reply::{Clock, ReplyTable, SystemClock};
use crate::session::{SessionHandle, SessionProvider};
use crate::state::BotState;
use crate::types::PairingEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Minimum backoff between connect attempts.
const MIN_BACKOFF: Duration = Duration::from_secs(2);
/// Maximum backoff cap.
const MAX_BACKOFF: Duration = Duration::from_secs(60);
/// Buffered session events before the collaborator is back-pressured.
const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct SessionInitializer {
    provider: Arc<dyn SessionProvider>,
    state: Arc<BotState>,
    config: BotConfig,
    table: Arc<ReplyTable>,
    clock: Arc<dyn Clock>,
}

impl SessionInitializer {
    pub fn new(provider: Arc<dyn SessionProvider>, state: Arc<BotState>, config: BotConfig) -> Self {
        Self {
            provider,
            state,
            config,
            table: Arc::new(ReplyTable::default()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_table(mut self, table: Arc<ReplyTable>) -> Self {
        self.table = table;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Run initialization in the background, logging any failure.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            if let Err(e) = self.run().await {
                tracing::error!(
                    provider = self.provider.name(),
                    error = %e,
                    "Session initialization failed, status server stays up"
                );
            }
        })
    }

    /// Initialize the session once. `client_ready` is set only on `Ok`.
    pub async fn run(&self) -> Result<()> {
        let data_dir = &self.config.data_dir;
        dirs::ensure_dir(data_dir).map_err(|e| {
            ReplyError::Storage(format!(
                "Failed to create data directory {}: {}",
                data_dir.display(),
                e
            ))
        })?;

        let store_path = self.config.session_path();
        let session = self.provider.open(&store_path).await?;
        tracing::info!(
            provider = self.provider.name(),
            store = %store_path.display(),
            "Session store opened"
        );
        self.state.set_session(session.clone()).await;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        session.register_event_handler(event_tx).await;
        let dispatcher = Arc::new(ReplyDispatcher::with_clock(
            session.clone(),
            self.table.clone(),
            self.clock.clone(),
        ));
        self.state
            .set_dispatcher(tokio::spawn(dispatcher.run(event_rx)))
            .await;

        self.connect(&session).await?;

        if session.is_logged_in().await {
            let account = account_label(&session).await;
            tracing::info!(account = %account, "Logged in");
        } else {
            tracing::info!("No authenticated account, waiting for pairing");
            self.await_pairing(&session).await?;
            if !session.is_logged_in().await {
                // Codes from this cycle have expired; stop advertising them
                self.state.pairing.clear().await;
                return Err(ReplyError::NotAuthenticated(
                    "pairing ended without a login".to_string(),
                ));
            }
            let account = account_label(&session).await;
            tracing::info!(account = %account, "Logged in after pairing");
        }

        self.state.pairing.clear().await;
        self.state.readiness.mark_client_ready();
        tracing::info!("Session initialization complete");
        Ok(())
    }

    async fn connect(&self, session: &Arc<dyn SessionHandle>) -> Result<()> {
        let attempts = self.config.connect_attempts.max(1);
        let mut backoff = MIN_BACKOFF;
        let mut attempt = 1;
        loop {
            match session.connect().await {
                Ok(()) => {
                    tracing::info!(attempt, "Session connected");
                    return Ok(());
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        backoff_secs = backoff.as_secs(),
                        "Connect failed, retrying after backoff"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Publish pairing codes until login, a terminal event, stream close,
    /// or the pairing deadline.
    async fn await_pairing(&self, session: &Arc<dyn SessionHandle>) -> Result<()> {
        let mut stream = session.open_pairing_stream().await?;
        // Timeouts too large to represent mean "no deadline"
        let deadline = tokio::time::Instant::now().checked_add(self.config.pairing_timeout());
        if deadline.is_none() {
            tracing::debug!(
                timeout_secs = self.config.pairing_timeout_secs,
                "Pairing timeout out of range, waiting without a deadline"
            );
        }

        loop {
            let next = match deadline {
                Some(deadline) => tokio::time::timeout_at(deadline, stream.next()).await,
                None => Ok(stream.next().await),
            };
            let event = match next {
                Ok(Ok(event)) => event,
                Ok(Err(e)) => {
                    tracing::error!(error = %e, "Pairing stream failed");
                    break;
                }
                Err(_) => {
                    tracing::warn!(
                        timeout_secs = self.config.pairing_timeout_secs,
                        "Pairing deadline reached"
                    );
                    break;
                }
            };

            match event {
                Some(PairingEvent::Code { code, ttl }) => self.publish_code(&code, ttl).await,
                Some(PairingEvent::Success { id }) => {
                    tracing::info!(account = %id, "Pairing succeeded");
                    break;
                }
                Some(PairingEvent::Timeout) => {
                    tracing::warn!("Pairing timed out on the collaborator side");
                    break;
                }
                Some(PairingEvent::Error(reason)) => {
                    tracing::error!(reason = %reason, "Pairing failed");
                    break;
                }
                None => {
                    tracing::debug!("Pairing stream closed");
                    break;
                }
            }
        }
        Ok(())
    }

    async fn publish_code(&self, code: &str, ttl: Duration) {
        let png = match pairing::render_png_base64(code) {
            Ok(png) => png,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping pairing code that failed to render");
                return;
            }
        };
        let generation = self.state.pairing.publish(code, png).await;
        tracing::info!(
            generation,
            ttl_secs = ttl.as_secs(),
            "QR code available at /qr endpoint"
        );

        if let Ok(terminal) = pairing::render_terminal(code) {
            tracing::info!("Scan to pair:\n{}", terminal);
        }
    }
}

async fn account_label(session: &Arc<dyn SessionHandle>) -> String {
    session
        .account()
        .await
        .map(|jid| jid.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{MemoryProvider, MemorySession};
    use crate::types::Jid;

    fn config_in(dir: &std::path::Path) -> BotConfig {
        BotConfig {
            data_dir: dir.join("data"),
            ..BotConfig::default()
        }
    }

    fn initializer(session: Arc<MemorySession>, config: BotConfig) -> (Arc<BotState>, SessionInitializer) {
        let state = BotState::new();
        let provider = Arc::new(MemoryProvider::new(session));
        (state.clone(), SessionInitializer::new(provider, state, config))
    }

    fn code(code: &str) -> PairingEvent {
        PairingEvent::Code {
            code: code.to_string(),
            ttl: Duration::from_secs(20),
        }
    }

    #[tokio::test]
    async fn test_logged_in_session_becomes_ready() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MemorySession::logged_in_as(Jid::user("628")));
        let (state, init) = initializer(session.clone(), config_in(dir.path()));

        init.run().await.unwrap();

        assert!(state.readiness.client_ready());
        assert!(session.is_connected());
        assert!(session.has_event_handler().await);
        assert!(state.session().await.is_some());
        assert!(state.take_dispatcher().await.is_some());
        assert!(dir.path().join("data").is_dir());
    }

    #[tokio::test]
    async fn test_run_can_be_spawned() {
        fn assert_send<T: Send>(_: &T) {}

        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MemorySession::new());
        session
            .push_pairing(PairingEvent::Success {
                id: Jid::user("628"),
            })
            .await
            .unwrap();
        let (state, init) = initializer(session, config_in(dir.path()));

        assert_send(&init.run());
        tokio::spawn(async move { init.run().await })
            .await
            .unwrap()
            .unwrap();
        assert!(state.readiness.client_ready());
    }

    #[tokio::test]
    async fn test_opens_session_file_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MemorySession::logged_in_as(Jid::user("628")));
        let provider = Arc::new(MemoryProvider::new(session));
        let config = config_in(dir.path());
        let expected = config.session_path();

        SessionInitializer::new(provider.clone(), BotState::new(), config)
            .run()
            .await
            .unwrap();
        assert_eq!(provider.opened_paths().await, vec![expected]);
    }

    #[tokio::test]
    async fn test_pairing_publishes_then_clears_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MemorySession::new());
        session.push_pairing(code("code-1")).await.unwrap();
        session.push_pairing(code("code-2")).await.unwrap();
        session
            .push_pairing(PairingEvent::Success {
                id: Jid::user("628"),
            })
            .await
            .unwrap();
        let (state, init) = initializer(session, config_in(dir.path()));

        init.run().await.unwrap();

        assert!(state.readiness.client_ready());
        assert_eq!(state.pairing.generation().await, 2);
        assert!(!state.pairing.is_available().await);
    }

    #[tokio::test]
    async fn test_stream_close_without_login_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MemorySession::new());
        session.push_pairing(code("code-1")).await.unwrap();
        session.close_pairing().await;
        let (state, init) = initializer(session, config_in(dir.path()));

        let result = init.run().await;

        assert!(matches!(result, Err(ReplyError::NotAuthenticated(_))));
        assert!(!state.readiness.client_ready());
        assert!(!state.pairing.is_available().await);
        assert_eq!(state.pairing.generation().await, 1);
    }

    #[tokio::test]
    async fn test_unbounded_pairing_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MemorySession::new());
        session.push_pairing(code("code-1")).await.unwrap();
        session
            .push_pairing(PairingEvent::Success {
                id: Jid::user("628"),
            })
            .await
            .unwrap();
        let config = BotConfig {
            pairing_timeout_secs: u64::MAX,
            ..config_in(dir.path())
        };
        let (state, init) = initializer(session, config);

        init.run().await.unwrap();

        assert!(state.readiness.client_ready());
        assert_eq!(state.pairing.generation().await, 1);
    }

    #[tokio::test]
    async fn test_pairing_error_event_ends_loop() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MemorySession::new());
        session
            .push_pairing(PairingEvent::Error("rejected".to_string()))
            .await
            .unwrap();
        let (state, init) = initializer(session, config_in(dir.path()));

        assert!(init.run().await.is_err());
        assert!(!state.readiness.client_ready());
    }

    #[tokio::test]
    async fn test_unrenderable_code_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MemorySession::new());
        session.push_pairing(code("")).await.unwrap();
        session.push_pairing(PairingEvent::Timeout).await.unwrap();
        let (state, init) = initializer(session, config_in(dir.path()));

        assert!(init.run().await.is_err());
        assert_eq!(state.pairing.generation().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pairing_deadline_ends_loop() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MemorySession::new());
        let config = BotConfig {
            pairing_timeout_secs: 5,
            ..config_in(dir.path())
        };
        let (state, init) = initializer(session, config);

        let result = init.run().await;

        assert!(matches!(result, Err(ReplyError::NotAuthenticated(_))));
        assert!(!state.readiness.client_ready());
        assert!(!state.pairing.is_available().await);
    }

    #[tokio::test]
    async fn test_connect_failure_is_not_ready() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MemorySession::logged_in_as(Jid::user("628")));
        session.fail_connects(1);
        let (state, init) = initializer(session.clone(), config_in(dir.path()));

        assert!(matches!(init.run().await, Err(ReplyError::Connection(_))));
        assert!(!state.readiness.client_ready());
        assert_eq!(session.connect_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_retries_are_bounded() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MemorySession::logged_in_as(Jid::user("628")));
        session.fail_connects(5);
        let config = BotConfig {
            connect_attempts: 3,
            ..config_in(dir.path())
        };
        let (state, init) = initializer(session.clone(), config);

        assert!(init.run().await.is_err());
        assert_eq!(session.connect_calls(), 3);
        assert!(!state.readiness.client_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_retry_recovers() {
        let dir = tempfile::tempdir().unwrap();
        let session = Arc::new(MemorySession::logged_in_as(Jid::user("628")));
        session.fail_connects(2);
        let config = BotConfig {
            connect_attempts: 3,
            ..config_in(dir.path())
        };
        let (state, init) = initializer(session.clone(), config);

        init.run().await.unwrap();
        assert_eq!(session.connect_calls(), 3);
        assert!(state.readiness.client_ready());
    }

    #[tokio::test]
    async fn test_data_dir_failure_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let config = BotConfig {
            data_dir: blocker.join("data"),
            ..BotConfig::default()
        };
        let session = Arc::new(MemorySession::logged_in_as(Jid::user("628")));
        let (state, init) = initializer(session, config);

        assert!(matches!(init.run().await, Err(ReplyError::Storage(_))));
        assert!(state.session().await.is_none());
    }
}
