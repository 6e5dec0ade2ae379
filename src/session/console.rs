//! Console session collaborator
//!
//! A line-oriented stand-in for the messaging network, used for local
//! development. Input lines become inbound messages; replies are written
//! back as `-> <jid>: <text>`.
//!
//! Input format:
//! - `pair <code>`: link an unpaired device with the code it printed
//! - `#<group> <text>`: group message in `<group>@g.us`
//! - anything else: direct message from `console@local`

use super::device::{DeviceIdentity, DeviceStore, FileDeviceStore};
use super::{ChannelPairingStream, PairingStream, SessionHandle, SessionProvider};
use crate::error::{ReplyError, Result};
use crate::types::{servers, Jid, MessageContent, MessageEvent, PairingEvent, SessionEvent};
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, watch, Mutex, RwLock};

/// How long a console pairing code is advertised as valid
const PAIRING_CODE_TTL: Duration = Duration::from_secs(60);

type LineReader = Box<dyn AsyncBufRead + Send + Unpin>;
type LineWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// A parsed console input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Empty,
    Pair(String),
    Direct(String),
    Group { group: String, text: String },
}

/// Parse one console input line
pub fn parse_line(line: &str) -> ConsoleInput {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.trim().is_empty() {
        return ConsoleInput::Empty;
    }
    if let Some(code) = line.strip_prefix("pair ") {
        return ConsoleInput::Pair(code.trim().to_string());
    }
    if let Some(rest) = line.strip_prefix('#') {
        let (group, text) = rest.split_once(' ').unwrap_or((rest, ""));
        if !group.is_empty() {
            return ConsoleInput::Group {
                group: group.to_string(),
                text: text.to_string(),
            };
        }
    }
    ConsoleInput::Direct(line.to_string())
}

/// Identity used for console-originated messages
pub fn console_sender() -> Jid {
    Jid::new("console", servers::LOCAL)
}

fn new_pairing_code() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string().to_uppercase();
    format!("{}-{}", &hex[..4], &hex[4..8])
}

struct Inner {
    store: Arc<dyn DeviceStore>,
    device: RwLock<DeviceIdentity>,
    event_tx: RwLock<Option<mpsc::Sender<SessionEvent>>>,
    pairing_tx: Mutex<Option<mpsc::Sender<PairingEvent>>>,
    pending_code: Mutex<Option<String>>,
    reader: Mutex<Option<LineReader>>,
    writer: Mutex<LineWriter>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    connected: AtomicBool,
}

impl Inner {
    async fn emit(&self, event: SessionEvent) {
        let tx = self.event_tx.read().await.clone();
        if let Some(tx) = tx {
            if tx.send(event).await.is_err() {
                tracing::debug!("Console event handler dropped");
            }
        }
    }

    async fn write_line(&self, line: &str) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await
    }

    /// Operator notice; a closed output is not fatal to the session
    async fn notify(&self, line: &str) {
        if let Err(e) = self.write_line(line).await {
            tracing::debug!(error = %e, "Console output unavailable");
        }
    }

    async fn handle_line(&self, line: &str) {
        let linked = self.device.read().await.linked;
        match parse_line(line) {
            ConsoleInput::Empty => {}
            ConsoleInput::Pair(code) if !linked => self.try_pair(&code).await,
            _ if !linked => {
                self.notify("!! device not paired yet; type `pair <code>`")
                    .await;
            }
            ConsoleInput::Pair(code) => {
                self.emit_message(MessageEvent::direct(
                    console_sender(),
                    MessageContent::conversation(format!("pair {}", code)),
                ))
                .await
            }
            ConsoleInput::Direct(text) => {
                self.emit_message(MessageEvent::direct(
                    console_sender(),
                    MessageContent::conversation(text),
                ))
                .await
            }
            ConsoleInput::Group { group, text } => {
                self.emit_message(MessageEvent::group(
                    Jid::group(group),
                    console_sender(),
                    MessageContent::conversation(text),
                ))
                .await
            }
        }
    }

    async fn emit_message(&self, event: MessageEvent) {
        self.emit(SessionEvent::Message(event.with_push_name("console")))
            .await;
    }

    async fn try_pair(&self, code: &str) {
        let expected = self.pending_code.lock().await.clone();
        if expected.as_deref() != Some(code) {
            self.notify("!! invalid pairing code").await;
            return;
        }

        let account = {
            let mut device = self.device.write().await;
            let account = Jid::new(device.id.simple().to_string(), servers::LOCAL);
            device.link(account.clone());
            if let Err(e) = self.store.save(&device) {
                tracing::error!(error = %e, "Failed to persist linked device");
            }
            account
        };
        self.pending_code.lock().await.take();

        // Success, then close the stream
        if let Some(tx) = self.pairing_tx.lock().await.take() {
            let sent = tx
                .send(PairingEvent::Success {
                    id: account.clone(),
                })
                .await;
            if sent.is_err() {
                tracing::debug!("Pairing stream reader gone before success");
            }
        }
        self.notify(&format!("** linked as {}", account)).await;
        self.emit(SessionEvent::PairSuccess { id: account }).await;
    }

    async fn read_loop(self: Arc<Self>, reader: LineReader, mut shutdown_rx: watch::Receiver<bool>) {
        let mut lines = reader.lines();
        let reason = loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break "disconnect requested".to_string(),
                line = lines.next_line() => match line {
                    Ok(Some(line)) => self.handle_line(&line).await,
                    Ok(None) => break "input closed".to_string(),
                    Err(e) => break format!("read error: {}", e),
                },
            }
        };

        self.connected.store(false, Ordering::SeqCst);
        self.pairing_tx.lock().await.take();
        tracing::info!(reason = %reason, "Console session reader stopped");
        self.emit(SessionEvent::Disconnected { reason }).await;
    }
}

/// Session collaborator over a line reader and writer
pub struct ConsoleSession {
    inner: Arc<Inner>,
}

impl ConsoleSession {
    /// Build a console session over arbitrary I/O
    pub fn with_io(
        store: Arc<dyn DeviceStore>,
        device: DeviceIdentity,
        reader: impl AsyncBufRead + Send + Unpin + 'static,
        writer: impl AsyncWrite + Send + Unpin + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                device: RwLock::new(device),
                event_tx: RwLock::new(None),
                pairing_tx: Mutex::new(None),
                pending_code: Mutex::new(None),
                reader: Mutex::new(Some(Box::new(reader))),
                writer: Mutex::new(Box::new(writer)),
                shutdown_tx: Mutex::new(None),
                connected: AtomicBool::new(false),
            }),
        }
    }

    /// Build a console session over the process stdin/stdout
    pub fn stdio(store: Arc<dyn DeviceStore>, device: DeviceIdentity) -> Self {
        Self::with_io(
            store,
            device,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        )
    }
}

#[async_trait]
impl SessionHandle for ConsoleSession {
    async fn register_event_handler(&self, events: mpsc::Sender<SessionEvent>) {
        *self.inner.event_tx.write().await = Some(events);
    }

    async fn connect(&self) -> Result<()> {
        let reader = self
            .inner
            .reader
            .lock()
            .await
            .take()
            .ok_or_else(|| ReplyError::Connection("Console input already consumed".to_string()))?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.inner.shutdown_tx.lock().await = Some(shutdown_tx);
        self.inner.connected.store(true, Ordering::SeqCst);

        tokio::spawn(self.inner.clone().read_loop(reader, shutdown_rx));

        tracing::info!("Console session connected");
        self.inner.emit(SessionEvent::Connected).await;
        Ok(())
    }

    async fn disconnect(&self) {
        if let Some(tx) = self.inner.shutdown_tx.lock().await.take() {
            let _ = tx.send(true);
        }
        self.inner.connected.store(false, Ordering::SeqCst);
    }

    async fn is_logged_in(&self) -> bool {
        self.inner.device.read().await.linked
    }

    async fn account(&self) -> Option<Jid> {
        self.inner.device.read().await.account.clone()
    }

    async fn open_pairing_stream(&self) -> Result<Box<dyn PairingStream>> {
        if self.is_logged_in().await {
            return Err(ReplyError::Pairing("Device is already linked".to_string()));
        }

        let code = new_pairing_code();
        let (tx, stream) = ChannelPairingStream::channel(4);
        tx.send(PairingEvent::Code {
            code: code.clone(),
            ttl: PAIRING_CODE_TTL,
        })
        .await
        .map_err(|_| ReplyError::Pairing("Pairing stream closed".to_string()))?;

        *self.inner.pending_code.lock().await = Some(code.clone());
        *self.inner.pairing_tx.lock().await = Some(tx);

        self.inner
            .write_line(&format!("** pairing code: {} (type `pair {}`)", code, code))
            .await?;
        Ok(Box::new(stream))
    }

    async fn send_message(&self, recipient: &Jid, text: &str) -> Result<()> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(ReplyError::Send {
                recipient: recipient.to_string(),
                reason: "console session not connected".to_string(),
            });
        }
        self.inner
            .write_line(&format!("-> {}: {}", recipient, text))
            .await
            .map_err(|e| ReplyError::Send {
                recipient: recipient.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Provider opening console sessions on stdin/stdout
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleProvider;

#[async_trait]
impl SessionProvider for ConsoleProvider {
    async fn open(&self, store_path: &Path) -> Result<Arc<dyn SessionHandle>> {
        let store = Arc::new(FileDeviceStore::new(store_path));
        let device = store.load_or_create()?;
        tracing::info!(
            path = %store_path.display(),
            device = %device.id,
            linked = device.linked,
            "Opened console session store"
        );
        Ok(Arc::new(ConsoleSession::stdio(store, device)))
    }

    fn name(&self) -> &str {
        "console"
    }
}
