//! Session collaborator traits: the seam to the messaging network
//!
//! The bot never speaks the messaging protocol itself. A `SessionProvider`
//! opens persistent credential storage and hands back a `SessionHandle`;
//! everything else (encryption, sync, reconnects) lives behind that trait.

use crate::error::Result;
use crate::types::{Jid, PairingEvent, SessionEvent};
use async_trait::async_trait;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub mod console;
pub mod device;
pub mod memory;

pub use console::{ConsoleProvider, ConsoleSession};
pub use device::{DeviceIdentity, DeviceStore, FileDeviceStore, MemoryDeviceStore};
pub use memory::{MemoryProvider, MemorySession, SentMessage};

/// Opens a session from persistent storage
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Open credential storage at `store_path`, loading the stored device
    /// identity or creating a new one.
    ///
    /// Idempotent per datastore: opening the same path twice yields the same
    /// device identity.
    async fn open(&self, store_path: &Path) -> Result<Arc<dyn SessionHandle>>;

    /// Provider name (e.g., "console", "memory")
    fn name(&self) -> &str;
}

/// A live (or connectable) session on the messaging network
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Register the single event sink. Replaces any previous sink.
    ///
    /// Must be called before `connect()` so no event is dropped.
    async fn register_event_handler(&self, events: mpsc::Sender<SessionEvent>);

    /// Establish the network connection
    async fn connect(&self) -> Result<()>;

    /// Tear down the network connection
    async fn disconnect(&self);

    /// Whether the session holds an authenticated account
    async fn is_logged_in(&self) -> bool;

    /// Account identity, once authenticated
    async fn account(&self) -> Option<Jid>;

    /// Open a stream of pairing artifacts for an unauthenticated session
    ///
    /// The stream ends once login completes or the collaborator gives up.
    async fn open_pairing_stream(&self) -> Result<Box<dyn PairingStream>>;

    /// Send a plain text message
    async fn send_message(&self, recipient: &Jid, text: &str) -> Result<()>;
}

/// Async stream of pairing events
#[async_trait]
pub trait PairingStream: Send {
    /// Receive the next pairing event; `Ok(None)` once the stream is closed
    async fn next(&mut self) -> Result<Option<PairingEvent>>;
}

/// Pairing stream backed by an mpsc channel
///
/// Collaborators keep the sender; dropping it closes the stream.
pub struct ChannelPairingStream {
    inner: ReceiverStream<PairingEvent>,
}

impl ChannelPairingStream {
    pub fn new(rx: mpsc::Receiver<PairingEvent>) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
        }
    }

    /// Create a bounded channel and its stream
    pub fn channel(capacity: usize) -> (mpsc::Sender<PairingEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(rx))
    }
}

#[async_trait]
impl PairingStream for ChannelPairingStream {
    async fn next(&mut self) -> Result<Option<PairingEvent>> {
        Ok(self.inner.next().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_channel_pairing_stream_yields_then_closes() {
        let (tx, mut stream) = ChannelPairingStream::channel(4);
        tx.send(PairingEvent::Code {
            code: "abc".to_string(),
            ttl: Duration::from_secs(20),
        })
        .await
        .unwrap();
        drop(tx);

        assert!(matches!(
            stream.next().await.unwrap(),
            Some(PairingEvent::Code { .. })
        ));
        assert!(stream.next().await.unwrap().is_none());
    }
}
