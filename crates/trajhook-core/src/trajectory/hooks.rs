//! Lifecycle-phase hooks for a single trajectory
//!
//! A [`Trajectory`] bundles its own registry, emitter and transition tracker.
//! Drivers emit through it so that illegal transitions are rejected before any
//! hook runs, and callers attach hooks by lifecycle phase instead of raw
//! kind/priority pairs.

use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{TrajectoryState, TransitionTracker};
use crate::config::EngineConfig;
use crate::error::HookResult;
use crate::hooks::{
    EmitReport, Event, EventKind, HookDescriptor, HookEmitter, HookHandle, HookHandler, HookId,
    HookRegistry, TrajectoryId,
};
use crate::inbox::{GateStatus, InboxGate, InboxPredicate, InboxSource};

/// One agent run: hooks, emitter and lifecycle state
#[derive(Debug)]
pub struct Trajectory {
    id: TrajectoryId,
    emitter: HookEmitter,
    tracker: Mutex<TransitionTracker>,
    next_sequence: AtomicU64,
    /// Gates registered through `attach_gate`, keyed by their hook id
    gates: Mutex<Vec<(HookId, GateStatus)>>,
    config: EngineConfig,
}

impl Trajectory {
    pub fn new(id: impl Into<TrajectoryId>) -> Self {
        Self::with_config(id, EngineConfig::default())
    }

    pub fn with_config(id: impl Into<TrajectoryId>, config: EngineConfig) -> Self {
        let id = id.into();
        Self {
            tracker: Mutex::new(TransitionTracker::new(id.clone())),
            id,
            emitter: HookEmitter::new(HookRegistry::new()),
            next_sequence: AtomicU64::new(0),
            gates: Mutex::new(Vec::new()),
            config,
        }
    }

    pub fn id(&self) -> &TrajectoryId {
        &self.id
    }

    pub fn registry(&self) -> &HookRegistry {
        self.emitter.registry()
    }

    pub fn emitter(&self) -> &HookEmitter {
        &self.emitter
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Current lifecycle state, reporting `AwaitingInbox` while an attached gate waits
    pub fn state(&self) -> TrajectoryState {
        let base = self.tracker.lock().state();
        if !base.is_terminal() && self.any_gate_suspended() {
            TrajectoryState::AwaitingInbox
        } else {
            base
        }
    }

    /// Build the next event of this trajectory with a fresh sequence number
    pub fn next_event(&self, kind: EventKind, payload: serde_json::Value) -> Event {
        let sequence = self.next_sequence.fetch_add(1, Ordering::AcqRel) + 1;
        Event::new(kind, self.id.clone(), sequence).with_payload(payload)
    }

    /// Emit a lifecycle event built by [`Trajectory::next_event`]
    pub async fn emit(
        &self,
        kind: EventKind,
        payload: serde_json::Value,
        cancel: &CancellationToken,
    ) -> HookResult<EmitReport> {
        let event = self.next_event(kind, payload);
        self.emit_event(&event, cancel).await
    }

    /// Validate and emit a driver-built event
    ///
    /// An illegal transition is returned as an error before any hook runs.
    /// Otherwise the folded verdict is returned and an abort makes the
    /// trajectory terminal.
    pub async fn emit_event(&self, event: &Event, cancel: &CancellationToken) -> HookResult<EmitReport> {
        let state = self.tracker.lock().apply(event)?;
        self.next_sequence.fetch_max(event.sequence, Ordering::AcqRel);

        debug!(
            trajectory_id = %self.id,
            kind = %event.kind,
            sequence = event.sequence,
            %state,
            "lifecycle transition"
        );

        let report = self.emitter.emit(event, cancel).await;

        if report.outcome.is_abort() {
            self.tracker.lock().record_outcome(&report.outcome);
            if report.outcome.is_cancelled() {
                info!(trajectory_id = %self.id, kind = %event.kind, "trajectory cancelled");
            } else {
                warn!(
                    trajectory_id = %self.id,
                    kind = %event.kind,
                    aborted_by = ?report.aborted_by,
                    outcome = %report.outcome,
                    "trajectory aborted"
                );
            }
        }

        Ok(report)
    }

    /// Detach a hook by id; unknown ids are ignored
    pub fn unregister(&self, id: &HookId) -> bool {
        self.registry().unregister(id)
    }

    pub fn on_run_start(&self, handler: impl HookHandler + 'static) -> PhaseHook<'_> {
        self.phase(EventKind::RunStart, Arc::new(handler))
    }

    pub fn on_step_start(&self, handler: impl HookHandler + 'static) -> PhaseHook<'_> {
        self.phase(EventKind::StepStart, Arc::new(handler))
    }

    pub fn on_step_end(&self, handler: impl HookHandler + 'static) -> PhaseHook<'_> {
        self.phase(EventKind::StepEnd, Arc::new(handler))
    }

    pub fn on_tool_call(&self, handler: impl HookHandler + 'static) -> PhaseHook<'_> {
        self.phase(EventKind::ToolCall, Arc::new(handler))
    }

    pub fn on_tool_result(&self, handler: impl HookHandler + 'static) -> PhaseHook<'_> {
        self.phase(EventKind::ToolResult, Arc::new(handler))
    }

    pub fn on_error(&self, handler: impl HookHandler + 'static) -> PhaseHook<'_> {
        self.phase(EventKind::Error, Arc::new(handler))
    }

    pub fn on_run_end(&self, handler: impl HookHandler + 'static) -> PhaseHook<'_> {
        self.phase(EventKind::RunEnd, Arc::new(handler))
    }

    pub fn on_custom(
        &self,
        name: impl Into<String>,
        handler: impl HookHandler + 'static,
    ) -> PhaseHook<'_> {
        self.phase(EventKind::custom(name), Arc::new(handler))
    }

    /// Build an inbox gate using this trajectory's configured timeout
    pub fn inbox_gate(&self, predicate: InboxPredicate, source: Arc<dyn InboxSource>) -> InboxGate {
        InboxGate::new(predicate, source, self.config.inbox.gate_timeout)
    }

    /// Attach an inbox gate to a phase; while it waits the trajectory reports `AwaitingInbox`
    pub fn attach_gate(&self, kind: EventKind, gate: InboxGate) -> PhaseHook<'_> {
        let status = gate.status();
        let mut hook = self.phase(kind, Arc::new(gate));
        hook.gate = Some(status);
        hook
    }

    /// Attach a hook to any event kind
    pub fn on(&self, kind: EventKind, handler: impl HookHandler + 'static) -> PhaseHook<'_> {
        self.phase(kind, Arc::new(handler))
    }

    fn phase(&self, kind: EventKind, handler: Arc<dyn HookHandler>) -> PhaseHook<'_> {
        PhaseHook {
            trajectory: self,
            descriptor: HookDescriptor::from_arc(kind, handler)
                .with_priority(self.config.hooks.default_priority),
            gate: None,
        }
    }

    fn track_gate(&self, id: HookId, status: GateStatus) {
        let mut gates = self.gates.lock();
        self.prune_gates(&mut gates);
        gates.push((id, status));
    }

    fn any_gate_suspended(&self) -> bool {
        let mut gates = self.gates.lock();
        self.prune_gates(&mut gates);
        gates.iter().any(|(_, status)| status.is_suspended())
    }

    // A gate unregistered mid-wait stays tracked until its wait ends.
    fn prune_gates(&self, gates: &mut Vec<(HookId, GateStatus)>) {
        let registry = self.registry();
        gates.retain(|(id, status)| status.is_suspended() || registry.contains(id));
    }
}

/// Pending registration for a lifecycle phase
#[must_use = "a phase hook does nothing until registered"]
pub struct PhaseHook<'a> {
    trajectory: &'a Trajectory,
    descriptor: HookDescriptor,
    gate: Option<GateStatus>,
}

impl PhaseHook<'_> {
    pub fn id(mut self, id: impl Into<HookId>) -> Self {
        self.descriptor = self.descriptor.with_id(id);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.descriptor = self.descriptor.with_priority(priority);
        self
    }

    pub fn once(mut self) -> Self {
        self.descriptor = self.descriptor.once();
        self
    }

    /// Register the hook; the returned handle detaches it again
    pub fn register(self) -> HookResult<HookHandle> {
        let handle = self.trajectory.registry().register(self.descriptor)?;
        if let Some(status) = self.gate {
            self.trajectory.track_gate(handle.id().clone(), status);
        }
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::hooks::{CallbackHook, Outcome};
    use crate::inbox::{InboxFeed, predicates};
    use serde_json::json;
    use std::time::Duration;

    fn noop() -> CallbackHook {
        CallbackHook::new(|_| Outcome::Continue)
    }

    #[tokio::test]
    async fn test_phase_wrappers_register_by_kind() {
        let trajectory = Trajectory::new("traj-1");
        let cases = [
            (trajectory.on_run_start(noop()).register().unwrap(), EventKind::RunStart),
            (trajectory.on_step_start(noop()).register().unwrap(), EventKind::StepStart),
            (trajectory.on_step_end(noop()).register().unwrap(), EventKind::StepEnd),
            (trajectory.on_tool_call(noop()).register().unwrap(), EventKind::ToolCall),
            (trajectory.on_tool_result(noop()).register().unwrap(), EventKind::ToolResult),
            (trajectory.on_error(noop()).register().unwrap(), EventKind::Error),
            (trajectory.on_run_end(noop()).register().unwrap(), EventKind::RunEnd),
            (
                trajectory.on_custom("checkpoint", noop()).register().unwrap(),
                EventKind::custom("checkpoint"),
            ),
        ];

        for (handle, kind) in &cases {
            assert_eq!(handle.kind(), kind);
            assert!(trajectory.registry().has_hooks(kind));
        }
        assert_eq!(trajectory.registry().count(), 8);
    }

    #[tokio::test]
    async fn test_builder_options() {
        let trajectory = Trajectory::new("traj-1");
        trajectory
            .on_step_start(noop())
            .id("late")
            .priority(10)
            .register()
            .unwrap();
        trajectory
            .on_step_start(noop())
            .id("early")
            .priority(-10)
            .once()
            .register()
            .unwrap();

        let snapshot = trajectory.registry().resolve(&EventKind::StepStart);
        assert_eq!(snapshot.ids(), vec![HookId::from("early"), HookId::from("late")]);
        assert!(snapshot.iter().next().unwrap().is_once());

        let err = trajectory.on_step_start(noop()).id("late").register().unwrap_err();
        assert!(matches!(err, HookError::DuplicateHookId { .. }));
    }

    #[tokio::test]
    async fn test_default_priority_from_config() {
        let config = EngineConfig::default().with_default_priority(100);
        let trajectory = Trajectory::with_config("traj-1", config);
        trajectory.on_tool_call(noop()).id("defaulted").register().unwrap();
        trajectory
            .on_tool_call(noop())
            .id("explicit")
            .priority(0)
            .register()
            .unwrap();

        let snapshot = trajectory.registry().resolve(&EventKind::ToolCall);
        assert_eq!(snapshot.ids(), vec![HookId::from("explicit"), HookId::from("defaulted")]);
    }

    #[tokio::test]
    async fn test_handle_unregisters() {
        let trajectory = Trajectory::new("traj-1");
        let handle = trajectory.on_run_end(noop()).register().unwrap();
        assert!(handle.unregister());
        assert!(!trajectory.registry().has_hooks(&EventKind::RunEnd));
        assert!(!trajectory.unregister(handle.id()));
    }

    #[tokio::test]
    async fn test_emit_assigns_increasing_sequences() {
        let trajectory = Trajectory::new("traj-1");
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        trajectory
            .on_custom(
                "tick",
                CallbackHook::new(move |event| {
                    log.lock().push(event.sequence);
                    Outcome::Continue
                }),
            )
            .register()
            .unwrap();

        let cancel = CancellationToken::new();
        trajectory.emit(EventKind::RunStart, json!({}), &cancel).await.unwrap();
        trajectory.emit(EventKind::custom("tick"), json!({}), &cancel).await.unwrap();
        trajectory.emit(EventKind::custom("tick"), json!({}), &cancel).await.unwrap();

        assert_eq!(*seen.lock(), vec![2, 3]);
    }

    #[tokio::test]
    async fn test_invalid_transition_runs_no_hooks() {
        let trajectory = Trajectory::new("traj-1");
        let calls = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&calls);
        trajectory
            .on_step_start(CallbackHook::new(move |_| {
                *counter.lock() += 1;
                Outcome::Continue
            }))
            .register()
            .unwrap();

        let cancel = CancellationToken::new();
        let err = trajectory
            .emit(EventKind::StepStart, json!({}), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::InvalidTransition { .. }));
        assert_eq!(*calls.lock(), 0);
        assert_eq!(trajectory.state(), TrajectoryState::Idle);
    }

    #[tokio::test]
    async fn test_abort_makes_trajectory_terminal() {
        let trajectory = Trajectory::new("traj-1");
        trajectory
            .on_tool_call(CallbackHook::new(|_| Outcome::abort("forbidden tool")))
            .register()
            .unwrap();

        let cancel = CancellationToken::new();
        trajectory.emit(EventKind::RunStart, json!({}), &cancel).await.unwrap();
        let report = trajectory
            .emit(EventKind::ToolCall, json!({"tool": "rm"}), &cancel)
            .await
            .unwrap();

        assert_eq!(report.outcome, Outcome::abort("forbidden tool"));
        assert_eq!(trajectory.state(), TrajectoryState::Aborted);

        let err = trajectory
            .emit(EventKind::StepStart, json!({}), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::InvalidTransition { .. }));

        // Teardown is still allowed
        trajectory.emit(EventKind::RunEnd, json!({}), &cancel).await.unwrap();
        assert_eq!(trajectory.state(), TrajectoryState::Aborted);
    }

    #[tokio::test]
    async fn test_emit_event_keeps_counter_ahead() {
        let trajectory = Trajectory::new("traj-1");
        let cancel = CancellationToken::new();
        let event = Event::new(EventKind::RunStart, "traj-1", 40);
        trajectory.emit_event(&event, &cancel).await.unwrap();

        let next = trajectory.next_event(EventKind::StepStart, json!(null));
        assert_eq!(next.sequence, 41);
    }

    #[tokio::test]
    async fn test_gate_tracking_follows_registration() {
        let trajectory = Trajectory::new("traj-1");
        let feed = Arc::new(InboxFeed::default());
        let gate = || trajectory.inbox_gate(predicates::at_least(1), feed.clone());

        let handle = trajectory
            .attach_gate(EventKind::StepStart, gate())
            .id("approval")
            .register()
            .unwrap();
        let err = trajectory
            .attach_gate(EventKind::StepStart, gate())
            .id("approval")
            .register()
            .unwrap_err();
        assert!(matches!(err, HookError::DuplicateHookId { .. }));
        assert_eq!(trajectory.gates.lock().len(), 1);

        trajectory
            .attach_gate(EventKind::custom("approve"), gate())
            .id("one_shot")
            .once()
            .register()
            .unwrap();
        assert_eq!(trajectory.gates.lock().len(), 2);

        assert!(handle.unregister());
        assert_eq!(trajectory.state(), TrajectoryState::Idle);
        assert_eq!(trajectory.gates.lock().len(), 1);

        // The once gate is removed after it runs, satisfied or not
        feed.append(crate::inbox::InboxMessage::new("m1", "operator", 1));
        let cancel = CancellationToken::new();
        trajectory.emit(EventKind::RunStart, json!({}), &cancel).await.unwrap();
        let report = trajectory
            .emit(EventKind::custom("approve"), json!({}), &cancel)
            .await
            .unwrap();
        assert!(report.outcome.is_continue());
        assert_eq!(trajectory.state(), TrajectoryState::Running);
        assert!(trajectory.gates.lock().is_empty());
    }

    #[tokio::test]
    async fn test_awaiting_inbox_while_gate_suspended() {
        let trajectory = Arc::new(Trajectory::with_config(
            "traj-1",
            EngineConfig::default().with_gate_timeout(Duration::from_secs(30)),
        ));
        let feed = Arc::new(InboxFeed::default());
        let gate = trajectory.inbox_gate(predicates::at_least(1), feed.clone());
        assert_eq!(gate.timeout(), Duration::from_secs(30));
        let status = gate.status();
        trajectory.attach_gate(EventKind::StepStart, gate).register().unwrap();

        let cancel = CancellationToken::new();
        trajectory.emit(EventKind::RunStart, json!({}), &cancel).await.unwrap();

        let emitting = {
            let trajectory = Arc::clone(&trajectory);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                trajectory.emit(EventKind::StepStart, json!({}), &cancel).await
            })
        };

        while !status.is_suspended() {
            tokio::task::yield_now().await;
        }
        assert_eq!(trajectory.state(), TrajectoryState::AwaitingInbox);

        feed.append(crate::inbox::InboxMessage::new("m1", "operator", 1));
        let report = emitting.await.unwrap().unwrap();

        assert!(report.outcome.is_continue());
        assert_eq!(trajectory.state(), TrajectoryState::Stepping);
    }
}
