//! Message data model and line rendering
//!
//! A `Message` is what sessions hand to the distributor; a `Delivery` is
//! the rendered, sequence-stamped line the distributor fans out to peers.

use std::sync::Arc;

use crate::types::SessionId;

/// Prompt sent to a freshly accepted connection before anything else.
pub const NAME_PROMPT: &str = ">> SERVER: Hello! Please type a name for yourself.";

/// Notice sent back to a publisher whose message was dropped under load.
pub const DROPPED_NOTICE: &str = ">> SERVER: message dropped, the relay is busy.";

/// Message body: ordinary chat text or a server-originated notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// Chat text typed by the originating session.
    Chat(String),
    /// Lifecycle notice (welcome, farewell) attributed to the server.
    Notice(String),
}

/// One outgoing message as accepted by the distributor.
///
/// Carries the originating session id (for eviction bookkeeping and
/// optional sender exclusion) and the display name captured at send time.
/// The global sequence number is stamped by the distributor at dequeue,
/// the single point that observes true queue order.
#[derive(Debug, Clone)]
pub struct Message {
    /// Session that published this message
    pub origin: SessionId,
    /// Display name of the origin at send time
    pub from: String,
    /// Payload
    pub body: Body,
}

impl Message {
    /// A chat message from a named session
    pub fn chat(origin: SessionId, from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            origin,
            from: from.into(),
            body: Body::Chat(text.into()),
        }
    }

    /// A welcome notice for a session that just finished its handshake
    pub fn welcome(origin: SessionId, name: &str) -> Self {
        Self {
            origin,
            from: name.to_string(),
            body: Body::Notice(format!("Welcome, {}!", name)),
        }
    }

    /// A farewell notice for a session that is closing
    pub fn farewell(origin: SessionId, name: &str) -> Self {
        Self {
            origin,
            from: name.to_string(),
            body: Body::Notice(format!("Goodbye {}!", name)),
        }
    }

    /// Render the single line every recipient sees for this message
    pub fn render(&self) -> String {
        match &self.body {
            Body::Chat(text) => format!(">> {}: {}", self.from, text),
            Body::Notice(text) => format!(">> SERVER: {}", text),
        }
    }
}

/// One rendered message on its way to a recipient's writer task.
///
/// The line is rendered once and shared; every recipient of the same
/// delivery observes the same sequence number.
#[derive(Debug, Clone)]
pub struct Delivery {
    /// Global sequence number, total across all messages
    pub seq: u64,
    /// Rendered line
    pub line: Arc<str>,
}
