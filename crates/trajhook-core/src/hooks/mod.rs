//! Hook system for agent trajectories
//!
//! Handlers are registered per [`EventKind`] in a [`HookRegistry`] and driven by
//! a [`HookEmitter`], which runs them sequentially in priority order and folds
//! their results into one [`Outcome`].
//!
//! # Examples
//!
//! ```rust
//! use trajhook_core::hooks::{
//!     CallbackHook, Event, EventKind, HookDescriptor, HookEmitter, HookRegistry, Outcome,
//! };
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = HookRegistry::new();
//! registry.register(
//!     HookDescriptor::new(EventKind::ToolCall, CallbackHook::new(|event| {
//!         if event.payload["tool"] == "rm" {
//!             Outcome::abort("destructive tool")
//!         } else {
//!             Outcome::Continue
//!         }
//!     }))
//!     .with_id("tool_guard"),
//! )?;
//!
//! let emitter = HookEmitter::new(registry);
//! let event = Event::new(EventKind::ToolCall, "traj-1", 1)
//!     .with_payload(serde_json::json!({"tool": "rm"}));
//!
//! let report = emitter.emit(&event, &CancellationToken::new()).await;
//! assert_eq!(report.outcome, Outcome::abort("destructive tool"));
//! # Ok(())
//! # }
//! ```

pub mod emitter;
pub mod events;
pub mod registry;
pub mod types;

// Re-export main types
pub use emitter::{EmitReport, HookEmitter};
pub use events::EventKind;
pub use registry::{HookHandle, HookRegistry, HookSnapshot, RegisteredHook};
pub use types::{
    AbortReason, AsyncCallbackHook, CallbackHook, Event, HookDescriptor, HookHandler, HookId,
    Outcome, RetryHint, TrajectoryId,
};
