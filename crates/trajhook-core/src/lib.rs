//! Trajhook Core Library
//!
//! Lifecycle hooks for agent trajectories. A driver emits typed events
//! (run start, step start, tool call, ...) and registered handlers run in
//! priority order, each able to continue, ask for a retry, or abort. An
//! inbox gate lets a handler suspend the chain until an external message
//! arrives.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//! use trajhook_core::{CallbackHook, EventKind, InboxFeed, Outcome, Trajectory, TrajectoryState};
//! use trajhook_core::inbox::predicates;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let trajectory = Trajectory::new("traj-1");
//! trajectory
//!     .on_tool_call(CallbackHook::new(|event| {
//!         if event.payload["tool"] == "shell" {
//!             Outcome::abort("shell disabled")
//!         } else {
//!             Outcome::Continue
//!         }
//!     }))
//!     .id("tool_policy")
//!     .register()?;
//!
//! let feed = Arc::new(InboxFeed::default());
//! let gate = trajectory.inbox_gate(predicates::at_least(1), feed.clone());
//! trajectory.attach_gate(EventKind::StepStart, gate).register()?;
//!
//! let cancel = CancellationToken::new();
//! trajectory.emit(EventKind::RunStart, json!({}), &cancel).await?;
//! feed.append(trajhook_core::InboxMessage::new("m1", "operator", 1));
//! trajectory.emit(EventKind::StepStart, json!({}), &cancel).await?;
//!
//! let report = trajectory
//!     .emit(EventKind::ToolCall, json!({"tool": "shell"}), &cancel)
//!     .await?;
//! assert!(report.outcome.is_abort());
//! assert_eq!(trajectory.state(), TrajectoryState::Aborted);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod hooks;
pub mod inbox;
pub mod trajectory;

pub use config::{EngineConfig, HookDefaults, InboxConfig};
pub use error::{HookError, HookResult};
pub use hooks::{
    AbortReason, AsyncCallbackHook, CallbackHook, EmitReport, Event, EventKind, HookDescriptor,
    HookEmitter, HookHandle, HookHandler, HookId, HookRegistry, Outcome, RetryHint, TrajectoryId,
};
pub use inbox::{
    GateDecision, GateStatus, InboxFeed, InboxGate, InboxMessage, InboxPredicate, InboxSnapshot,
    InboxSource, gate,
};
pub use trajectory::{PhaseHook, Trajectory, TrajectoryState};
