//! Inbox snapshot sources
//!
//! The transport that actually receives messages lives outside this crate. It
//! only has to expose snapshots through a `watch` channel: the current value
//! serves pulls, and a change wakes any suspended gate.

use std::sync::Arc;
use tokio::sync::watch;

use super::snapshot::{InboxMessage, InboxSnapshot};

/// Anything that can hand out a subscription to inbox snapshots
pub trait InboxSource: Send + Sync {
    /// Subscribe to snapshot updates; the receiver starts at the current snapshot
    fn subscribe(&self) -> watch::Receiver<Arc<InboxSnapshot>>;
}

impl InboxSource for watch::Receiver<Arc<InboxSnapshot>> {
    fn subscribe(&self) -> watch::Receiver<Arc<InboxSnapshot>> {
        self.clone()
    }
}

/// In-process inbox feed driven by the transport collaborator
///
/// Dropping the last clone closes the feed; waiting gates then resolve as closed.
#[derive(Debug, Clone)]
pub struct InboxFeed {
    sender: Arc<watch::Sender<Arc<InboxSnapshot>>>,
}

impl InboxFeed {
    pub fn new(initial: InboxSnapshot) -> Self {
        let (sender, _) = watch::channel(Arc::new(initial));
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Replace the current snapshot and wake subscribers
    pub fn publish(&self, snapshot: InboxSnapshot) {
        self.sender.send_replace(Arc::new(snapshot));
    }

    /// Publish a snapshot with one more message appended
    pub fn append(&self, message: InboxMessage) {
        self.sender.send_modify(|current| {
            let mut next = InboxSnapshot::clone(current);
            next.messages.push(message);
            *current = Arc::new(next);
        });
    }

    /// The most recently published snapshot
    pub fn current(&self) -> Arc<InboxSnapshot> {
        Arc::clone(&self.sender.borrow())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InboxFeed {
    fn default() -> Self {
        Self::new(InboxSnapshot::default())
    }
}

impl InboxSource for InboxFeed {
    fn subscribe(&self) -> watch::Receiver<Arc<InboxSnapshot>> {
        self.sender.subscribe()
    }
}
