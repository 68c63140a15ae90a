//! Hook type definitions

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use super::events::EventKind;

/// Unique identifier for a hook within one registry
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HookId(pub String);

impl HookId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random hook id
    pub fn generate() -> Self {
        Self(format!("hook-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for HookId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for HookId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for HookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a trajectory
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrajectoryId(pub String);

impl TrajectoryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a random trajectory id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TrajectoryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TrajectoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for TrajectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A single lifecycle event of a trajectory
///
/// Built by the driver and handed to handlers by reference; handlers never see
/// live trajectory state, only the id carried here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub trajectory_id: TrajectoryId,
    /// Strictly increasing per trajectory
    pub sequence: u64,
    #[serde(default)]
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// Create an event with an empty payload, stamped now
    pub fn new(kind: EventKind, trajectory_id: impl Into<TrajectoryId>, sequence: u64) -> Self {
        Self {
            kind,
            trajectory_id: trajectory_id.into(),
            sequence,
            payload: serde_json::Value::Null,
            timestamp: Utc::now(),
        }
    }

    /// Attach a payload
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Why an emission was aborted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// A handler deliberately refused the event
    Rejected(String),
    /// A handler raised an error or panicked
    HandlerFailure { hook_id: HookId, cause: String },
    /// The emission's cancellation token fired
    Cancelled,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Rejected(reason) => write!(f, "{}", reason),
            AbortReason::HandlerFailure { hook_id, cause } => {
                write!(f, "hook {} failed: {}", hook_id, cause)
            }
            AbortReason::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why a handler asked the driver to retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryHint {
    /// A handler asked for a retry
    Requested(String),
    /// An inbox gate gave up waiting
    InboxTimeout { waited: Duration },
    /// The inbox feed closed while a gate was waiting
    InboxClosed,
}

impl fmt::Display for RetryHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryHint::Requested(hint) => write!(f, "{}", hint),
            RetryHint::InboxTimeout { waited } => {
                write!(f, "inbox timeout after {}ms", waited.as_millis())
            }
            RetryHint::InboxClosed => write!(f, "inbox closed"),
        }
    }
}

/// Result of running a handler, or of a whole emission once folded
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Outcome {
    #[default]
    Continue,
    Retry(RetryHint),
    Abort(AbortReason),
}

impl Outcome {
    /// Abort with a handler-supplied reason
    pub fn abort(reason: impl Into<String>) -> Self {
        Outcome::Abort(AbortReason::Rejected(reason.into()))
    }

    /// Retry with a handler-supplied hint
    pub fn retry(hint: impl Into<String>) -> Self {
        Outcome::Retry(RetryHint::Requested(hint.into()))
    }

    pub fn cancelled() -> Self {
        Outcome::Abort(AbortReason::Cancelled)
    }

    pub fn handler_failure(hook_id: HookId, cause: impl Into<String>) -> Self {
        Outcome::Abort(AbortReason::HandlerFailure {
            hook_id,
            cause: cause.into(),
        })
    }

    /// Abort > Retry > Continue
    pub fn severity(&self) -> u8 {
        match self {
            Outcome::Continue => 0,
            Outcome::Retry(_) => 1,
            Outcome::Abort(_) => 2,
        }
    }

    /// Combine two outcomes, keeping the more severe one (the earlier one on ties)
    pub fn fold(self, other: Outcome) -> Outcome {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, Outcome::Continue)
    }

    pub fn is_retry(&self) -> bool {
        matches!(self, Outcome::Retry(_))
    }

    pub fn is_abort(&self) -> bool {
        matches!(self, Outcome::Abort(_))
    }

    /// Whether this outcome came from cancellation rather than a hook decision
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Outcome::Abort(AbortReason::Cancelled))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Continue => write!(f, "continue"),
            Outcome::Retry(hint) => write!(f, "retry ({})", hint),
            Outcome::Abort(reason) => write!(f, "abort ({})", reason),
        }
    }
}

/// Contract every hook implements
///
/// Returning `Err` (or panicking) counts as a handler failure and aborts the
/// emission; it never escapes the emitter.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait HookHandler: Send + Sync {
    async fn handle(&self, event: &Event, cancel: &CancellationToken) -> anyhow::Result<Outcome>;
}

type SyncCallback = dyn Fn(&Event) -> anyhow::Result<Outcome> + Send + Sync;

/// Synchronous closure hook
#[derive(Clone)]
pub struct CallbackHook {
    callback: Arc<SyncCallback>,
}

impl CallbackHook {
    /// Create a callback hook from an infallible closure
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Event) -> Outcome + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(move |event: &Event| Ok(callback(event))),
        }
    }

    /// Create a callback hook from a closure that may fail
    pub fn fallible<F>(callback: F) -> Self
    where
        F: Fn(&Event) -> anyhow::Result<Outcome> + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl fmt::Debug for CallbackHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHook").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl HookHandler for CallbackHook {
    async fn handle(&self, event: &Event, _cancel: &CancellationToken) -> anyhow::Result<Outcome> {
        (self.callback)(event)
    }
}

type AsyncCallback =
    dyn Fn(Event, CancellationToken) -> BoxFuture<'static, anyhow::Result<Outcome>> + Send + Sync;

/// Asynchronous closure hook
///
/// The closure receives owned copies of the event and the cancellation token so
/// the returned future can be `'static`.
#[derive(Clone)]
pub struct AsyncCallbackHook {
    callback: Arc<AsyncCallback>,
}

impl AsyncCallbackHook {
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(Event, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Outcome>> + Send + 'static,
    {
        Self {
            callback: Arc::new(
                move |event: Event, cancel: CancellationToken| -> BoxFuture<'static, anyhow::Result<Outcome>> {
                    Box::pin(callback(event, cancel))
                },
            ),
        }
    }
}

impl fmt::Debug for AsyncCallbackHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncCallbackHook").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl HookHandler for AsyncCallbackHook {
    async fn handle(&self, event: &Event, cancel: &CancellationToken) -> anyhow::Result<Outcome> {
        (self.callback)(event.clone(), cancel.clone()).await
    }
}

/// A hook as handed to the registry
#[derive(Clone)]
pub struct HookDescriptor {
    pub id: HookId,
    pub kind: EventKind,
    /// Lower runs earlier
    pub priority: i32,
    /// Unregister after the first invocation
    pub once: bool,
    pub handler: Arc<dyn HookHandler>,
}

impl HookDescriptor {
    /// Create a descriptor with a generated id and priority 0
    pub fn new(kind: EventKind, handler: impl HookHandler + 'static) -> Self {
        Self::from_arc(kind, Arc::new(handler))
    }

    /// Create a descriptor around an already shared handler
    pub fn from_arc(kind: EventKind, handler: Arc<dyn HookHandler>) -> Self {
        Self {
            id: HookId::generate(),
            kind,
            priority: 0,
            once: false,
            handler,
        }
    }

    pub fn with_id(mut self, id: impl Into<HookId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
}

impl fmt::Debug for HookDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookDescriptor")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("priority", &self.priority)
            .field("once", &self.once)
            .finish()
    }
}

impl fmt::Display for HookDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, priority {})", self.id, self.kind, self.priority)
    }
}
