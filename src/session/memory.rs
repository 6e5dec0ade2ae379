//! In-memory session collaborator
//!
//! Records every call and lets the caller script login state, connect
//! failures, pairing events, and send failures. Used by the test suite and
//! by embedders that want to drive the bot without a network.

use super::{ChannelPairingStream, PairingStream, SessionHandle, SessionProvider};
use crate::error::{ReplyError, Result};
use crate::types::{Jid, PairingEvent, SessionEvent};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

/// A message captured by `MemorySession::send_message`
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub recipient: Jid,
    pub text: String,
}

/// Scriptable in-memory session
#[derive(Default)]
pub struct MemorySession {
    logged_in: Arc<AtomicBool>,
    connected: AtomicBool,
    fail_sends: AtomicBool,
    connect_failures: AtomicUsize,
    connect_calls: AtomicUsize,
    disconnects: AtomicUsize,
    account: Arc<Mutex<Option<Jid>>>,
    events: Mutex<Option<mpsc::Sender<SessionEvent>>>,
    pairing_tx: Mutex<Option<mpsc::Sender<PairingEvent>>>,
    pairing_rx: Mutex<Option<ChannelPairingStream>>,
    sent: Mutex<Vec<SentMessage>>,
}

impl MemorySession {
    /// Unauthenticated session with an open pairing channel
    pub fn new() -> Self {
        let (tx, stream) = ChannelPairingStream::channel(16);
        Self {
            pairing_tx: Mutex::new(Some(tx)),
            pairing_rx: Mutex::new(Some(stream)),
            ..Self::default()
        }
    }

    /// Session that is already authenticated as `account`
    pub fn logged_in_as(account: Jid) -> Self {
        let mut session = Self::new();
        session.logged_in.store(true, Ordering::SeqCst);
        session.account = Arc::new(Mutex::new(Some(account)));
        session
    }

    /// Fail the next `count` calls to `connect()`
    pub fn fail_connects(&self, count: usize) {
        self.connect_failures.store(count, Ordering::SeqCst);
    }

    /// Make every `send_message` call fail (or succeed again)
    pub fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Push a pairing event to the open stream
    ///
    /// A `Success` event marks the session as logged in once the stream
    /// hands it to its reader.
    pub async fn push_pairing(&self, event: PairingEvent) -> Result<()> {
        let guard = self.pairing_tx.lock().await;
        let tx = guard
            .as_ref()
            .ok_or_else(|| ReplyError::Pairing("Pairing stream already closed".to_string()))?;
        tx.send(event)
            .await
            .map_err(|_| ReplyError::Pairing("Pairing stream receiver dropped".to_string()))
    }

    /// Close the pairing stream without a login
    pub async fn close_pairing(&self) {
        self.pairing_tx.lock().await.take();
    }

    /// Deliver an event to the registered handler
    pub async fn emit(&self, event: SessionEvent) -> Result<()> {
        let tx = self.events.lock().await.clone().ok_or_else(|| {
            ReplyError::Connection("No event handler registered".to_string())
        })?;
        tx.send(event)
            .await
            .map_err(|_| ReplyError::Connection("Event handler dropped".to_string()))
    }

    pub async fn has_event_handler(&self) -> bool {
        self.events.lock().await.is_some()
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionHandle for MemorySession {
    async fn register_event_handler(&self, events: mpsc::Sender<SessionEvent>) {
        *self.events.lock().await = Some(events);
    }

    async fn connect(&self) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ReplyError::Connection("scripted connect failure".to_string()));
        }
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) {
        self.events.lock().await.take();
        self.connected.store(false, Ordering::SeqCst);
        self.disconnects.fetch_add(1, Ordering::SeqCst);
    }

    async fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    async fn account(&self) -> Option<Jid> {
        self.account.lock().await.clone()
    }

    async fn open_pairing_stream(&self) -> Result<Box<dyn PairingStream>> {
        let stream = self
            .pairing_rx
            .lock()
            .await
            .take()
            .ok_or_else(|| ReplyError::Pairing("Pairing stream already opened".to_string()))?;
        Ok(Box::new(MemoryPairingStream {
            inner: stream,
            logged_in: self.logged_in.clone(),
            account: self.account.clone(),
        }))
    }

    async fn send_message(&self, recipient: &Jid, text: &str) -> Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(ReplyError::Send {
                recipient: recipient.to_string(),
                reason: "scripted send failure".to_string(),
            });
        }
        self.sent.lock().await.push(SentMessage {
            recipient: recipient.clone(),
            text: text.to_string(),
        });
        Ok(())
    }
}

/// Pairing stream that logs the owning session in when it yields `Success`
struct MemoryPairingStream {
    inner: ChannelPairingStream,
    logged_in: Arc<AtomicBool>,
    account: Arc<Mutex<Option<Jid>>>,
}

#[async_trait]
impl PairingStream for MemoryPairingStream {
    async fn next(&mut self) -> Result<Option<PairingEvent>> {
        let event = self.inner.next().await?;
        if let Some(PairingEvent::Success { id }) = &event {
            *self.account.lock().await = Some(id.clone());
            self.logged_in.store(true, Ordering::SeqCst);
        }
        Ok(event)
    }
}

/// Provider that always hands out the same `MemorySession`
pub struct MemoryProvider {
    session: Arc<MemorySession>,
    opened: Mutex<Vec<PathBuf>>,
}

impl MemoryProvider {
    pub fn new(session: Arc<MemorySession>) -> Self {
        Self {
            session,
            opened: Mutex::new(Vec::new()),
        }
    }

    /// Store paths passed to `open`, in call order
    pub async fn opened_paths(&self) -> Vec<PathBuf> {
        self.opened.lock().await.clone()
    }
}

#[async_trait]
impl SessionProvider for MemoryProvider {
    async fn open(&self, store_path: &Path) -> Result<Arc<dyn SessionHandle>> {
        self.opened.lock().await.push(store_path.to_path_buf());
        Ok(self.session.clone())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_connect_failures_are_consumed() {
        let session = MemorySession::new();
        session.fail_connects(2);
        assert!(session.connect().await.is_err());
        assert!(session.connect().await.is_err());
        assert!(session.connect().await.is_ok());
        assert!(session.is_connected());
        assert_eq!(session.connect_calls(), 3);
    }

    #[tokio::test]
    async fn test_send_records_and_fails() {
        let session = MemorySession::new();
        session.send_message(&Jid::user("U1"), "hi").await.unwrap();

        session.fail_sends(true);
        let err = session.send_message(&Jid::user("U1"), "x").await;
        assert!(matches!(err, Err(ReplyError::Send { .. })));

        let sent = session.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].text, "hi");
    }

    #[tokio::test]
    async fn test_pairing_success_logs_in() {
        let session = MemorySession::new();
        let mut stream = session.open_pairing_stream().await.unwrap();
        assert!(session.open_pairing_stream().await.is_err());

        session
            .push_pairing(PairingEvent::Code {
                code: "c1".to_string(),
                ttl: Duration::from_secs(20),
            })
            .await
            .unwrap();
        session
            .push_pairing(PairingEvent::Success {
                id: Jid::user("628"),
            })
            .await
            .unwrap();
        session.close_pairing().await;
        assert!(!session.is_logged_in().await);

        assert!(matches!(
            stream.next().await.unwrap(),
            Some(PairingEvent::Code { .. })
        ));
        assert!(!session.is_logged_in().await);
        assert!(session.account().await.is_none());
        assert!(matches!(
            stream.next().await.unwrap(),
            Some(PairingEvent::Success { .. })
        ));
        assert!(stream.next().await.unwrap().is_none());
        assert!(session.is_logged_in().await);
        assert_eq!(session.account().await, Some(Jid::user("628")));
    }

    #[tokio::test]
    async fn test_emit_requires_handler() {
        let session = MemorySession::new();
        assert!(session.emit(SessionEvent::Connected).await.is_err());

        let (tx, mut rx) = mpsc::channel(4);
        session.register_event_handler(tx).await;
        session.emit(SessionEvent::Connected).await.unwrap();
        assert!(matches!(rx.recv().await, Some(SessionEvent::Connected)));
    }

    #[tokio::test]
    async fn test_disconnect_drops_event_handler() {
        let session = MemorySession::new();
        let (tx, mut rx) = mpsc::channel(4);
        session.register_event_handler(tx).await;
        session.connect().await.unwrap();

        session.disconnect().await;
        assert!(!session.has_event_handler().await);
        assert!(session.emit(SessionEvent::Connected).await.is_err());
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_provider_returns_same_session() {
        let session = Arc::new(MemorySession::logged_in_as(Jid::user("1")));
        let provider = MemoryProvider::new(session.clone());
        let handle = provider.open(Path::new("/tmp/a")).await.unwrap();
        assert!(handle.is_logged_in().await);
        assert_eq!(provider.opened_paths().await, vec![PathBuf::from("/tmp/a")]);
        assert_eq!(provider.name(), "memory");
    }
}
