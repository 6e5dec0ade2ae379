//! # a3s-reply
//!
//! Canned-reply messaging bot with session lifecycle coordination, pairing
//! QR publication, and a status HTTP server.
//!
//! ## Overview
//!
//! The messaging protocol lives behind the [`SessionHandle`] trait. The
//! crate decides what to answer ([`ReplyDispatcher`]), when the bot is
//! ready ([`SessionInitializer`]), and what pollers see ([`StatusServer`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use a3s_reply::{BotConfig, MemoryProvider, MemorySession, Jid};
//!
//! # async fn example() -> a3s_reply::Result<()> {
//! let session = Arc::new(MemorySession::logged_in_as(Jid::user("628123")));
//! let config = BotConfig { port: 0, ..BotConfig::default() };
//!
//! let bot = a3s_reply::bootstrap::start_bot(config, Arc::new(MemoryProvider::new(session))).await?;
//! println!("Status server on {}", bot.local_addr());
//! bot.shutdown().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Session collaborators
//!
//! - **memory**: scriptable in-memory session for tests and embedding
//! - **console**: stdin/stdout session for local development
//!
//! ## Architecture
//!
//! - **SessionProvider / SessionHandle**: seam to the messaging network
//! - **SessionInitializer**: connect, pair, then flip `client_ready`
//! - **ReplyDispatcher**: exact-match reply table over inbound messages
//! - **StatusServer**: `/health`, `/`, `/qr`, `/api/v1/status`

pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod dirs;
pub mod dispatch;
pub mod error;
pub mod initializer;
pub mod pairing;
pub mod reply;
pub mod server;
pub mod session;
pub mod state;
pub mod types;

// Re-export core types
pub use config::BotConfig;
pub use dispatch::{DispatchOutcome, OutboundReply, ReplyDispatcher};
pub use error::{ReplyError, Result};
pub use initializer::SessionInitializer;
pub use reply::{Clock, FixedClock, ReplyRule, ReplyTable, SystemClock};
pub use server::{BoundServer, StatusServer};
pub use session::{PairingStream, SessionHandle, SessionProvider};
pub use state::{BotState, PairingArtifact, PairingPublisher, Readiness};
pub use types::{
    ExtendedText, Jid, MessageContent, MessageEvent, MessageInfo, PairingEvent, SessionEvent,
};

// Re-export collaborators for convenience
pub use session::{ConsoleProvider, ConsoleSession, MemoryProvider, MemorySession, SentMessage};
