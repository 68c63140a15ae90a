//! Inbox-check gating
//!
//! Lets a hook chain pause until an external message arrives. Snapshots are
//! supplied by the transport through an [`InboxSource`]; the gate only reads
//! them.

pub mod gate;
pub mod predicates;
pub mod snapshot;
pub mod source;

pub use gate::{GateDecision, GateStatus, InboxGate, gate};
pub use predicates::InboxPredicate;
pub use snapshot::{InboxMessage, InboxSnapshot};
pub use source::{InboxFeed, InboxSource};
