//! Trajectory lifecycle state machine

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{HookError, HookResult};
use crate::hooks::{Event, EventKind, Outcome, TrajectoryId};

/// Lifecycle state of one trajectory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrajectoryState {
    /// No event seen yet
    Idle,
    /// Run started, no step open
    Running,
    /// A step is open
    Stepping,
    /// An inbox gate is suspended
    AwaitingInbox,
    /// The last lifecycle event was an error
    Erroring,
    /// RunEnd was emitted
    Completed,
    /// An emission was aborted
    Aborted,
}

impl TrajectoryState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TrajectoryState::Completed | TrajectoryState::Aborted)
    }
}

impl fmt::Display for TrajectoryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TrajectoryState::Idle => "Idle",
            TrajectoryState::Running => "Running",
            TrajectoryState::Stepping => "Stepping",
            TrajectoryState::AwaitingInbox => "AwaitingInbox",
            TrajectoryState::Erroring => "Erroring",
            TrajectoryState::Completed => "Completed",
            TrajectoryState::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

/// Validates lifecycle events against the legal transition table
///
/// Never reports `AwaitingInbox`; that state is derived from gate status by the
/// owning trajectory.
#[derive(Debug, Clone)]
pub struct TransitionTracker {
    trajectory_id: TrajectoryId,
    state: TrajectoryState,
    run_started: bool,
    run_ended: bool,
    step_open: bool,
    last_sequence: Option<u64>,
}

impl TransitionTracker {
    pub fn new(trajectory_id: TrajectoryId) -> Self {
        Self {
            trajectory_id,
            state: TrajectoryState::Idle,
            run_started: false,
            run_ended: false,
            step_open: false,
            last_sequence: None,
        }
    }

    pub fn trajectory_id(&self) -> &TrajectoryId {
        &self.trajectory_id
    }

    pub fn state(&self) -> TrajectoryState {
        self.state
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.last_sequence
    }

    pub fn step_open(&self) -> bool {
        self.step_open
    }

    /// Validate an event without changing state
    pub fn check(&self, event: &Event) -> HookResult<()> {
        self.clone().apply(event).map(|_| ())
    }

    /// Validate an event and advance the state machine
    ///
    /// On error nothing is changed.
    pub fn apply(&mut self, event: &Event) -> HookResult<TrajectoryState> {
        if event.trajectory_id != self.trajectory_id {
            return Err(self.reject(
                &event.kind,
                format!("event belongs to trajectory {}", event.trajectory_id),
            ));
        }
        if let Some(last) = self.last_sequence {
            if event.sequence <= last {
                return Err(self.reject(
                    &event.kind,
                    format!("sequence {} does not follow {}", event.sequence, last),
                ));
            }
        }

        let next = self.next_state(&event.kind)?;

        match event.kind {
            EventKind::RunStart => self.run_started = true,
            EventKind::StepStart => self.step_open = true,
            EventKind::StepEnd => self.step_open = false,
            EventKind::RunEnd => {
                self.run_ended = true;
                self.step_open = false;
            }
            _ => {}
        }
        self.state = next;
        self.last_sequence = Some(event.sequence);
        Ok(next)
    }

    /// Fold an emission verdict into the state; any abort is terminal
    pub fn record_outcome(&mut self, outcome: &Outcome) {
        if outcome.is_abort() {
            self.state = TrajectoryState::Aborted;
        }
    }

    fn next_state(&self, kind: &EventKind) -> HookResult<TrajectoryState> {
        match self.state {
            TrajectoryState::Completed => {
                return Err(self.reject(kind, "run already ended"));
            }
            TrajectoryState::Aborted => {
                // Only teardown is still accepted after an abort
                return if *kind == EventKind::RunEnd && !self.run_ended {
                    Ok(TrajectoryState::Aborted)
                } else if *kind == EventKind::RunEnd {
                    Err(self.reject(kind, "run already ended"))
                } else {
                    Err(self.reject(kind, "trajectory was aborted"))
                };
            }
            _ => {}
        }

        let open_or_running = if self.step_open {
            TrajectoryState::Stepping
        } else {
            TrajectoryState::Running
        };

        match kind {
            EventKind::RunStart if self.run_started => {
                Err(self.reject(kind, "run already started"))
            }
            EventKind::RunStart => Ok(TrajectoryState::Running),
            _ if !self.run_started => Err(self.reject(kind, "run has not started")),
            EventKind::StepStart if self.step_open => {
                Err(self.reject(kind, "previous step is still open"))
            }
            EventKind::StepStart => Ok(TrajectoryState::Stepping),
            EventKind::StepEnd if !self.step_open => Err(self.reject(kind, "no step is open")),
            EventKind::StepEnd => Ok(TrajectoryState::Running),
            EventKind::ToolCall | EventKind::ToolResult => Ok(open_or_running),
            EventKind::Error => Ok(TrajectoryState::Erroring),
            EventKind::RunEnd => Ok(TrajectoryState::Completed),
            EventKind::Custom(_) => Ok(self.state),
        }
    }

    fn reject(&self, kind: &EventKind, reason: impl Into<String>) -> HookError {
        HookError::invalid_transition(self.trajectory_id.clone(), kind.clone(), self.state, reason)
    }
}
