//! Reply dispatcher
//!
//! Turns one inbound message event into at most one outbound send.
//! `plan` is the pure decision step; `dispatch` performs the send.

use crate::reply::{Clock, ReplyTable, SystemClock};
use crate::session::SessionHandle;
use crate::types::{Jid, MessageEvent, SessionEvent};
use std::sync::Arc;
use tokio::sync::mpsc;

/// A reply ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundReply {
    pub recipient: Jid,
    pub text: String,
}

/// What happened to one message event
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// No text; nothing sent
    Ignored,
    Sent(OutboundReply),
    /// The send failed; not retried
    Failed { reply: OutboundReply, error: String },
}

pub struct ReplyDispatcher {
    session: Arc<dyn SessionHandle>,
    table: Arc<ReplyTable>,
    clock: Arc<dyn Clock>,
}

impl ReplyDispatcher {
    pub fn new(session: Arc<dyn SessionHandle>, table: Arc<ReplyTable>) -> Self {
        Self::with_clock(session, table, Arc::new(SystemClock))
    }

    pub fn with_clock(
        session: Arc<dyn SessionHandle>,
        table: Arc<ReplyTable>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            session,
            table,
            clock,
        }
    }

    /// Decide the reply for `event` without sending anything
    pub fn plan(&self, event: &MessageEvent) -> Option<OutboundReply> {
        let text = event.text()?;
        Some(OutboundReply {
            recipient: event.reply_target().clone(),
            text: self.table.resolve(text, self.clock.now()),
        })
    }

    /// Plan and send the reply for `event`
    pub async fn dispatch(&self, event: &MessageEvent) -> DispatchOutcome {
        let Some(reply) = self.plan(event) else {
            tracing::debug!(id = %event.info.id, "Ignoring message without text");
            return DispatchOutcome::Ignored;
        };

        tracing::info!(
            sender = %event.info.sender,
            chat = %event.info.chat,
            text = event.text().unwrap_or_default(),
            "Received message"
        );

        match self.session.send_message(&reply.recipient, &reply.text).await {
            Ok(()) => {
                tracing::info!(recipient = %reply.recipient, text = %reply.text, "Message sent");
                DispatchOutcome::Sent(reply)
            }
            Err(e) => {
                tracing::warn!(recipient = %reply.recipient, error = %e, "Failed to send reply");
                DispatchOutcome::Failed {
                    reply,
                    error: e.to_string(),
                }
            }
        }
    }

    /// Drain session events until the channel closes
    ///
    /// Each message is handled in its own task; lifecycle events are logged.
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            tracing::debug!(kind = event.kind(), "Session event received");
            match event {
                SessionEvent::Message(message) => {
                    let dispatcher = self.clone();
                    tokio::spawn(async move {
                        dispatcher.dispatch(&message).await;
                    });
                }
                SessionEvent::Connected => tracing::info!("Session connected"),
                SessionEvent::Disconnected { reason } => {
                    tracing::warn!(reason = %reason, "Session disconnected")
                }
                SessionEvent::PairSuccess { id } => {
                    tracing::info!(account = %id, "Pairing succeeded")
                }
                SessionEvent::LoggedOut { reason } => {
                    tracing::warn!(reason = %reason, "Session logged out")
                }
                SessionEvent::Other { kind } => {
                    tracing::debug!(kind = %kind, "Unhandled session event")
                }
            }
        }
        tracing::debug!("Session event channel closed");
    }
}
