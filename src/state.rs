//! Shared bot state
//!
//! Built once at startup and handed by `Arc` to the status server and the
//! session initializer. Readiness flags are one-way transitions; the pairing
//! artifact has a single writer (the initializer) and any number of readers.

use crate::session::SessionHandle;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;

/// "Server bound" and "session authenticated" signals
#[derive(Debug, Default)]
pub struct Readiness {
    server_ready: AtomicBool,
    client_ready: AtomicBool,
}

impl Readiness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the HTTP server as bound. Returns `true` on the first call only.
    pub fn mark_server_ready(&self) -> bool {
        !self.server_ready.swap(true, Ordering::AcqRel)
    }

    /// Mark the session as authenticated. Returns `true` on the first call only.
    pub fn mark_client_ready(&self) -> bool {
        !self.client_ready.swap(true, Ordering::AcqRel)
    }

    pub fn server_ready(&self) -> bool {
        self.server_ready.load(Ordering::Acquire)
    }

    pub fn client_ready(&self) -> bool {
        self.client_ready.load(Ordering::Acquire)
    }
}

/// A published pairing artifact
#[derive(Debug, Clone, PartialEq)]
pub struct PairingArtifact {
    /// Raw pairing payload as produced by the session
    pub code: String,
    /// Base64 of the rendered QR PNG
    pub png_base64: String,
    /// Publish counter; increases with every artifact
    pub generation: u64,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct PairingSlot {
    current: Option<PairingArtifact>,
    generation: u64,
}

/// Holds the latest pairing artifact for the current login cycle
#[derive(Debug, Default)]
pub struct PairingPublisher {
    slot: RwLock<PairingSlot>,
}

impl PairingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new artifact, replacing any previous one.
    ///
    /// Returns the artifact's generation.
    pub async fn publish(&self, code: impl Into<String>, png_base64: impl Into<String>) -> u64 {
        let mut slot = self.slot.write().await;
        slot.generation += 1;
        let generation = slot.generation;
        slot.current = Some(PairingArtifact {
            code: code.into(),
            png_base64: png_base64.into(),
            generation,
            published_at: Utc::now(),
        });
        generation
    }

    /// Snapshot of the current artifact, if any
    pub async fn current(&self) -> Option<PairingArtifact> {
        self.slot.read().await.current.clone()
    }

    pub async fn is_available(&self) -> bool {
        self.slot.read().await.current.is_some()
    }

    /// Generation of the most recent publish (0 if none yet)
    pub async fn generation(&self) -> u64 {
        self.slot.read().await.generation
    }

    /// Drop the current artifact (login finished). Generation is kept.
    pub async fn clear(&self) {
        self.slot.write().await.current = None;
    }
}

/// State shared between the status server and the session initializer
#[derive(Default)]
pub struct BotState {
    pub readiness: Readiness,
    pub pairing: PairingPublisher,
    session: RwLock<Option<Arc<dyn SessionHandle>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl BotState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Install the process's session handle. Replaces any previous handle.
    pub async fn set_session(&self, session: Arc<dyn SessionHandle>) {
        *self.session.write().await = Some(session);
    }

    pub async fn session(&self) -> Option<Arc<dyn SessionHandle>> {
        self.session.read().await.clone()
    }

    /// Remove and return the session handle (used on shutdown)
    pub async fn take_session(&self) -> Option<Arc<dyn SessionHandle>> {
        self.session.write().await.take()
    }

    /// Install the reply dispatcher task. A previous task is aborted.
    pub async fn set_dispatcher(&self, task: JoinHandle<()>) {
        if let Some(previous) = self.dispatcher.lock().await.replace(task) {
            previous.abort();
        }
    }

    /// Remove and return the dispatcher task (used on shutdown)
    pub async fn take_dispatcher(&self) -> Option<JoinHandle<()>> {
        self.dispatcher.lock().await.take()
    }
}
