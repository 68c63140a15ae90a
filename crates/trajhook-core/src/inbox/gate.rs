//! Inbox-check gate
//!
//! A gate holds up an emission until an inbox predicate is satisfied. It never
//! mutates the inbox; it only reads snapshots from an [`InboxSource`].

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::predicates::InboxPredicate;
use super::snapshot::InboxSnapshot;
use super::source::InboxSource;
use crate::hooks::{Event, HookHandler, Outcome, RetryHint};

/// Shared count of currently suspended waits
///
/// Trajectories read this to report `AwaitingInbox`.
#[derive(Debug, Clone, Default)]
pub struct GateStatus {
    suspended: Arc<AtomicUsize>,
}

impl GateStatus {
    pub fn is_suspended(&self) -> bool {
        self.suspended_count() > 0
    }

    pub fn suspended_count(&self) -> usize {
        self.suspended.load(Ordering::Acquire)
    }

    fn enter(&self) -> SuspendGuard<'_> {
        self.suspended.fetch_add(1, Ordering::AcqRel);
        SuspendGuard(self)
    }
}

// Decrements on drop so a wait abandoned mid-flight is still accounted for.
struct SuspendGuard<'a>(&'a GateStatus);

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.0.suspended.fetch_sub(1, Ordering::AcqRel);
    }
}

/// How a gate wait ended
#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    /// The predicate held on this snapshot
    Satisfied(Arc<InboxSnapshot>),
    /// No satisfying snapshot arrived in time
    TimedOut { waited: Duration },
    /// The cancellation token fired while waiting
    Cancelled,
    /// The inbox feed went away while waiting
    Closed,
}

impl GateDecision {
    pub fn into_outcome(self) -> Outcome {
        match self {
            GateDecision::Satisfied(_) => Outcome::Continue,
            GateDecision::TimedOut { waited } => Outcome::Retry(RetryHint::InboxTimeout { waited }),
            GateDecision::Cancelled => Outcome::cancelled(),
            GateDecision::Closed => Outcome::Retry(RetryHint::InboxClosed),
        }
    }

    pub fn is_satisfied(&self) -> bool {
        matches!(self, GateDecision::Satisfied(_))
    }
}

/// Hook that suspends an emission until the inbox satisfies a predicate
#[derive(Clone)]
pub struct InboxGate {
    predicate: InboxPredicate,
    source: Arc<dyn InboxSource>,
    timeout: Duration,
    status: GateStatus,
}

impl InboxGate {
    pub fn new(predicate: InboxPredicate, source: Arc<dyn InboxSource>, timeout: Duration) -> Self {
        Self {
            predicate,
            source,
            timeout,
            status: GateStatus::default(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Handle for observing whether this gate is currently suspended
    pub fn status(&self) -> GateStatus {
        self.status.clone()
    }

    /// Check the inbox, suspending if the predicate does not hold yet
    pub async fn wait(&self, cancel: &CancellationToken) -> GateDecision {
        wait_for(
            &self.predicate,
            self.source.as_ref(),
            self.timeout,
            cancel,
            &self.status,
        )
        .await
    }
}

impl std::fmt::Debug for InboxGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InboxGate")
            .field("timeout", &self.timeout)
            .field("suspended", &self.status.suspended_count())
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl HookHandler for InboxGate {
    async fn handle(&self, event: &Event, cancel: &CancellationToken) -> anyhow::Result<Outcome> {
        debug!(
            trajectory_id = %event.trajectory_id,
            sequence = event.sequence,
            "inbox gate checking"
        );
        Ok(self.wait(cancel).await.into_outcome())
    }
}

/// One-shot gate: wait for `predicate` on snapshots from `source`
pub async fn gate(
    predicate: &InboxPredicate,
    source: &dyn InboxSource,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Outcome {
    wait_for(predicate, source, timeout, cancel, &GateStatus::default())
        .await
        .into_outcome()
}

async fn wait_for(
    predicate: &InboxPredicate,
    source: &dyn InboxSource,
    timeout: Duration,
    cancel: &CancellationToken,
    status: &GateStatus,
) -> GateDecision {
    let mut updates = source.subscribe();

    let current = Arc::clone(&updates.borrow_and_update());
    if predicate.evaluate(&current) {
        return GateDecision::Satisfied(current);
    }

    let _suspended = status.enter();
    let started = Instant::now();
    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);

    debug!(?timeout, "awaiting inbox");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("inbox wait cancelled");
                return GateDecision::Cancelled;
            }
            _ = &mut deadline => {
                let waited = started.elapsed();
                warn!(?waited, "inbox wait timed out");
                return GateDecision::TimedOut { waited };
            }
            changed = updates.changed() => {
                if changed.is_err() {
                    warn!("inbox feed closed while waiting");
                    return GateDecision::Closed;
                }
                let snapshot = Arc::clone(&updates.borrow_and_update());
                if predicate.evaluate(&snapshot) {
                    debug!(messages = snapshot.len(), "inbox predicate satisfied");
                    return GateDecision::Satisfied(snapshot);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::predicates::{at_least, from_sender};
    use crate::inbox::snapshot::InboxMessage;
    use crate::inbox::source::InboxFeed;

    fn snapshot_with(messages: usize, last_checked: u64) -> InboxSnapshot {
        InboxSnapshot::new(
            (0..messages)
                .map(|i| InboxMessage::new(format!("m{}", i), "alice", i as u64 + 1))
                .collect(),
            last_checked,
        )
    }

    #[tokio::test]
    async fn test_satisfied_immediately_without_suspending() {
        let feed = Arc::new(InboxFeed::new(snapshot_with(1, 0)));
        let gate = InboxGate::new(at_least(1), feed, Duration::from_secs(5));

        let decision = gate.wait(&CancellationToken::new()).await;
        assert!(decision.is_satisfied());
        assert!(!gate.status().is_suspended());
    }

    #[tokio::test]
    async fn test_times_out_with_retry() {
        let feed = Arc::new(InboxFeed::default());
        let started = std::time::Instant::now();

        let outcome = gate(
            &at_least(1),
            feed.as_ref(),
            Duration::from_millis(50),
            &CancellationToken::new(),
        )
        .await;

        let elapsed = started.elapsed();
        match outcome {
            Outcome::Retry(RetryHint::InboxTimeout { waited }) => {
                assert!(waited >= Duration::from_millis(50));
            }
            other => panic!("expected inbox timeout, got {:?}", other),
        }
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_wait() {
        let feed = Arc::new(InboxFeed::default());
        let gate = InboxGate::new(at_least(1), feed, Duration::from_secs(30));
        let cancel = CancellationToken::new();

        let waiter = {
            let gate = gate.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.wait(&cancel).await })
        };

        while !gate.status().is_suspended() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();

        let decision = waiter.await.unwrap();
        assert_eq!(decision, GateDecision::Cancelled);
        assert!(decision.into_outcome().is_cancelled());
        assert!(!gate.status().is_suspended());
    }

    #[tokio::test]
    async fn test_unbounded_timeout_waits_until_cancelled() {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter("trajhook_core=debug")
            .try_init();

        let feed = Arc::new(InboxFeed::default());
        let gate = InboxGate::new(at_least(1), feed, Duration::MAX);
        let cancel = CancellationToken::new();

        let waiter = {
            let gate = gate.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { gate.wait(&cancel).await })
        };
        while !gate.status().is_suspended() {
            tokio::task::yield_now().await;
        }
        assert!(!waiter.is_finished());

        cancel.cancel();
        assert_eq!(waiter.await.unwrap(), GateDecision::Cancelled);
    }

    #[tokio::test]
    async fn test_wakes_on_matching_snapshot() {
        let feed = Arc::new(InboxFeed::default());
        let gate = InboxGate::new(from_sender("bob"), feed.clone(), Duration::from_secs(30));

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait(&CancellationToken::new()).await })
        };
        while !gate.status().is_suspended() {
            tokio::task::yield_now().await;
        }

        feed.append(InboxMessage::new("m1", "alice", 1));
        feed.append(InboxMessage::new("m2", "bob", 2));

        match waiter.await.unwrap() {
            GateDecision::Satisfied(snapshot) => {
                assert_eq!(snapshot.latest().map(|m| m.sender.as_str()), Some("bob"));
            }
            other => panic!("expected satisfied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_closed_feed_resolves_as_retry() {
        let feed = InboxFeed::default();
        let source: Arc<dyn InboxSource> = Arc::new(feed.subscribe());
        let gate = InboxGate::new(at_least(1), source, Duration::from_secs(30));

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.wait(&CancellationToken::new()).await })
        };
        while !gate.status().is_suspended() {
            tokio::task::yield_now().await;
        }
        drop(feed);

        let decision = waiter.await.unwrap();
        assert_eq!(decision, GateDecision::Closed);
        assert_eq!(decision.into_outcome(), Outcome::Retry(RetryHint::InboxClosed));
    }

    #[tokio::test]
    async fn test_gate_as_hook_handler() {
        let initial = snapshot_with(2, 0);
        let feed = Arc::new(InboxFeed::new(initial.clone()));
        let gate = InboxGate::new(at_least(2), feed.clone(), Duration::from_millis(20));
        let event = Event::new(crate::hooks::EventKind::StepStart, "traj-1", 1);

        let outcome = gate.handle(&event, &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, Outcome::Continue);

        // The gate only reads; the snapshot is unchanged
        assert_eq!(*feed.current(), initial);
    }
}
