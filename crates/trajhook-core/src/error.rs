//! Error types for the hook engine
//!
//! Only caller misuse and configuration problems are errors. Faults raised by
//! handlers during an emission never surface here: the emitter converts them
//! into an [`Outcome`](crate::hooks::Outcome) so the driver has a single result
//! channel per event.

use thiserror::Error;

use crate::hooks::{EventKind, HookId, TrajectoryId};
use crate::trajectory::TrajectoryState;

/// Result type alias for hook engine operations
pub type HookResult<T> = Result<T, HookError>;

/// Main error type for the hook engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HookError {
    /// A hook with the same id is already registered
    #[error("Duplicate hook id: {id}")]
    DuplicateHookId { id: HookId },

    /// The driver emitted an event that is not legal in the trajectory's current state
    #[error("Invalid transition for trajectory {trajectory_id}: {kind} in state {state}: {reason}")]
    InvalidTransition {
        trajectory_id: TrajectoryId,
        kind: EventKind,
        state: TrajectoryState,
        reason: String,
    },

    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl HookError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid transition error
    pub fn invalid_transition(
        trajectory_id: TrajectoryId,
        kind: EventKind,
        state: TrajectoryState,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidTransition {
            trajectory_id,
            kind,
            state,
            reason: reason.into(),
        }
    }

    /// Stable code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            HookError::DuplicateHookId { .. } => "HOOK_DUPLICATE_ID",
            HookError::InvalidTransition { .. } => "HOOK_INVALID_TRANSITION",
            HookError::Config { .. } => "HOOK_CONFIG",
        }
    }

    /// Whether the error stems from incorrect use of the API rather than the environment
    pub fn is_caller_bug(&self) -> bool {
        matches!(
            self,
            HookError::DuplicateHookId { .. } | HookError::InvalidTransition { .. }
        )
    }
}

impl From<toml::de::Error> for HookError {
    fn from(err: toml::de::Error) -> Self {
        HookError::config(err.to_string())
    }
}

impl From<std::io::Error> for HookError {
    fn from(err: std::io::Error) -> Self {
        HookError::config(err.to_string())
    }
}
