//! Core message and session-event types
//!
//! Events coming out of a session collaborator form a closed set
//! (`SessionEvent`), so consumers match on them exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ReplyError;

/// Well-known identity servers
pub mod servers {
    /// Individual user accounts
    pub const DEFAULT_USER: &str = "s.whatsapp.net";
    /// Group chats
    pub const GROUP: &str = "g.us";
    /// Local console collaborator
    pub const LOCAL: &str = "local";
}

/// Jabber-style identity: `user@server`
///
/// Used for both senders and chats. Group chats live on the `g.us` server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid {
    pub user: String,
    pub server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: server.into(),
        }
    }

    /// Individual account on the default user server
    pub fn user(user: impl Into<String>) -> Self {
        Self::new(user, servers::DEFAULT_USER)
    }

    /// Group chat identity
    pub fn group(id: impl Into<String>) -> Self {
        Self::new(id, servers::GROUP)
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}

impl FromStr for Jid {
    type Err = ReplyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('@') {
            Some((user, server)) if !user.is_empty() && !server.is_empty() => {
                Ok(Self::new(user, server))
            }
            _ => Err(ReplyError::Config(format!("Invalid JID: '{}'", s))),
        }
    }
}

impl TryFrom<String> for Jid {
    type Error = ReplyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.to_string()
    }
}

/// Delivery context of an inbound message
#[derive(Debug, Clone)]
pub struct MessageInfo {
    /// Collaborator-assigned message ID
    pub id: String,
    /// Who wrote the message
    pub sender: Jid,
    /// Conversation the message arrived in (group or direct)
    pub chat: Jid,
    /// Whether `chat` is a group
    pub is_group: bool,
    /// Sender display name, if the collaborator provides one
    pub push_name: Option<String>,
    /// Unix timestamp in milliseconds
    pub timestamp: i64,
}

/// Quoted / extended text payload
#[derive(Debug, Clone, Default)]
pub struct ExtendedText {
    pub text: String,
}

/// Message body
///
/// Plain chats carry `conversation`; replies and link previews carry
/// `extended_text` instead.
#[derive(Debug, Clone, Default)]
pub struct MessageContent {
    pub conversation: Option<String>,
    pub extended_text: Option<ExtendedText>,
}

impl MessageContent {
    pub fn conversation(text: impl Into<String>) -> Self {
        Self {
            conversation: Some(text.into()),
            extended_text: None,
        }
    }

    pub fn extended(text: impl Into<String>) -> Self {
        Self {
            conversation: None,
            extended_text: Some(ExtendedText { text: text.into() }),
        }
    }

    /// Text of the message: plain conversation first, then extended text.
    ///
    /// Returns `None` when both are empty.
    pub fn text(&self) -> Option<&str> {
        self.conversation
            .as_deref()
            .filter(|t| !t.is_empty())
            .or_else(|| {
                self.extended_text
                    .as_ref()
                    .map(|ext| ext.text.as_str())
                    .filter(|t| !t.is_empty())
            })
    }
}

/// An inbound message event
#[derive(Debug, Clone)]
pub struct MessageEvent {
    pub info: MessageInfo,
    pub content: MessageContent,
}

impl MessageEvent {
    /// Direct message from `sender`
    pub fn direct(sender: Jid, content: MessageContent) -> Self {
        Self {
            info: MessageInfo {
                id: new_message_id(),
                chat: sender.clone(),
                sender,
                is_group: false,
                push_name: None,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
            content,
        }
    }

    /// Group message from `sender` in `chat`
    pub fn group(chat: Jid, sender: Jid, content: MessageContent) -> Self {
        Self {
            info: MessageInfo {
                id: new_message_id(),
                sender,
                chat,
                is_group: true,
                push_name: None,
                timestamp: chrono::Utc::now().timestamp_millis(),
            },
            content,
        }
    }

    pub fn with_push_name(mut self, name: impl Into<String>) -> Self {
        self.info.push_name = Some(name.into());
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.content.text()
    }

    /// Where a reply to this message goes: the group for group messages,
    /// otherwise the sender.
    pub fn reply_target(&self) -> &Jid {
        if self.info.is_group {
            &self.info.chat
        } else {
            &self.info.sender
        }
    }
}

/// Events emitted by a session collaborator
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// New message received
    Message(MessageEvent),
    /// Network connection established
    Connected,
    /// Network connection lost
    Disconnected { reason: String },
    /// Pairing completed for the given account
    PairSuccess { id: Jid },
    /// Account unlinked on the remote side
    LoggedOut { reason: String },
    /// Anything the bot does not act on (receipts, presence, ...)
    Other { kind: String },
}

impl SessionEvent {
    /// Short name for logging
    pub fn kind(&self) -> &str {
        match self {
            SessionEvent::Message(_) => "message",
            SessionEvent::Connected => "connected",
            SessionEvent::Disconnected { .. } => "disconnected",
            SessionEvent::PairSuccess { .. } => "pair_success",
            SessionEvent::LoggedOut { .. } => "logged_out",
            SessionEvent::Other { kind } => kind,
        }
    }
}

/// Items produced by a pairing stream
#[derive(Debug, Clone, PartialEq)]
pub enum PairingEvent {
    /// New pairing payload; valid for roughly `ttl`
    Code { code: String, ttl: Duration },
    /// Login completed
    Success { id: Jid },
    /// The collaborator gave up waiting for a scan
    Timeout,
    /// Pairing failed
    Error(String),
}

fn new_message_id() -> String {
    format!("msg-{}", uuid::Uuid::new_v4().simple())
}
