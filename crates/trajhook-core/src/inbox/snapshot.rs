//! Inbox snapshot types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A message delivered to a trajectory's inbox
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboxMessage {
    pub id: String,
    pub sender: String,
    #[serde(default)]
    pub body: serde_json::Value,
    /// Transport-assigned, increasing per inbox
    pub sequence: u64,
    pub received_at: DateTime<Utc>,
}

impl InboxMessage {
    pub fn new(id: impl Into<String>, sender: impl Into<String>, sequence: u64) -> Self {
        Self {
            id: id.into(),
            sender: sender.into(),
            body: serde_json::Value::Null,
            sequence,
            received_at: Utc::now(),
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = body;
        self
    }
}

/// Point-in-time view of an inbox, produced by the transport
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InboxSnapshot {
    /// Messages in delivery order
    pub messages: Vec<InboxMessage>,
    /// Sequence of the last message the consumer has already looked at
    pub last_checked_sequence: u64,
}

impl InboxSnapshot {
    pub fn new(messages: Vec<InboxMessage>, last_checked_sequence: u64) -> Self {
        Self {
            messages,
            last_checked_sequence,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn latest(&self) -> Option<&InboxMessage> {
        self.messages.last()
    }

    /// Messages newer than `last_checked_sequence`
    pub fn unread(&self) -> impl Iterator<Item = &InboxMessage> {
        self.messages
            .iter()
            .filter(move |message| message.sequence > self.last_checked_sequence)
    }
}
