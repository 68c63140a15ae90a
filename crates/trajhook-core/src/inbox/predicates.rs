//! Inbox predicates

use std::fmt;
use std::sync::Arc;

use super::snapshot::InboxSnapshot;

/// Condition a gate waits for
#[derive(Clone)]
pub struct InboxPredicate(Arc<dyn Fn(&InboxSnapshot) -> bool + Send + Sync>);

impl InboxPredicate {
    pub fn new<F>(predicate: F) -> Self
    where
        F: Fn(&InboxSnapshot) -> bool + Send + Sync + 'static,
    {
        Self(Arc::new(predicate))
    }

    pub fn evaluate(&self, snapshot: &InboxSnapshot) -> bool {
        (self.0)(snapshot)
    }

    /// Both predicates must hold
    pub fn and(self, other: InboxPredicate) -> Self {
        Self::new(move |snapshot| self.evaluate(snapshot) && other.evaluate(snapshot))
    }
}

impl fmt::Debug for InboxPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InboxPredicate")
    }
}

/// At least `count` messages are present
pub fn at_least(count: usize) -> InboxPredicate {
    InboxPredicate::new(move |snapshot| snapshot.len() >= count)
}

/// Some message came from `sender`
pub fn from_sender(sender: impl Into<String>) -> InboxPredicate {
    let sender = sender.into();
    InboxPredicate::new(move |snapshot| snapshot.messages.iter().any(|m| m.sender == sender))
}

/// Some message has a sequence greater than `sequence`
pub fn newer_than(sequence: u64) -> InboxPredicate {
    InboxPredicate::new(move |snapshot| snapshot.messages.iter().any(|m| m.sequence > sequence))
}

/// Some message arrived after the snapshot's last checked sequence
pub fn has_unread() -> InboxPredicate {
    InboxPredicate::new(|snapshot| snapshot.unread().next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::snapshot::InboxMessage;

    fn snapshot() -> InboxSnapshot {
        InboxSnapshot::new(
            vec![
                InboxMessage::new("m1", "alice", 4),
                InboxMessage::new("m2", "bob", 5),
            ],
            4,
        )
    }

    #[test]
    fn test_at_least() {
        assert!(at_least(2).evaluate(&snapshot()));
        assert!(!at_least(3).evaluate(&snapshot()));
        assert!(at_least(0).evaluate(&InboxSnapshot::default()));
    }

    #[test]
    fn test_from_sender() {
        assert!(from_sender("bob").evaluate(&snapshot()));
        assert!(!from_sender("carol").evaluate(&snapshot()));
    }

    #[test]
    fn test_newer_than_and_unread() {
        assert!(newer_than(4).evaluate(&snapshot()));
        assert!(!newer_than(5).evaluate(&snapshot()));
        assert!(has_unread().evaluate(&snapshot()));
        assert!(!has_unread().evaluate(&InboxSnapshot::new(vec![], 9)));
    }

    #[test]
    fn test_and() {
        let both = from_sender("alice").and(at_least(2));
        assert!(both.evaluate(&snapshot()));
        let neither = from_sender("alice").and(at_least(5));
        assert!(!neither.evaluate(&snapshot()));
    }
}
