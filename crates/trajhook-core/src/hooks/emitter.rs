//! Hook emission engine
//!
//! Drives the hooks resolved for one event strictly in snapshot order, folding
//! their outcomes into a single verdict. Handler faults are isolated: an error
//! or panic becomes `Abort(HandlerFailure)` and never escapes [`HookEmitter::emit`].

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info_span, warn};

use super::registry::{HookRegistry, RegisteredHook};
use super::types::{Event, HookId, Outcome};

/// Result of one emission
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmitReport {
    /// Folded verdict for the driver
    pub outcome: Outcome,
    /// Hook whose outcome caused an abort, if it came from a hook
    pub aborted_by: Option<HookId>,
    /// Hooks that actually ran, in order
    pub invoked: Vec<HookId>,
    /// Hooks left unrun because of an abort or cancellation
    pub skipped: usize,
}

impl EmitReport {
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn into_outcome(self) -> Outcome {
        self.outcome
    }
}

/// Hook emitter
#[derive(Debug, Clone)]
pub struct HookEmitter {
    registry: HookRegistry,
}

impl HookEmitter {
    /// Create a new hook emitter over the given registry
    pub fn new(registry: HookRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &HookRegistry {
        &self.registry
    }

    /// Run every hook registered for the event's kind
    ///
    /// Hooks run one at a time; each is awaited before the next starts. The
    /// first abort stops the emission. Cancellation is observed before each
    /// hook and after the last one and turns the result into `Abort(Cancelled)`.
    /// A hook already running is allowed to finish; only its own abort outlives
    /// the cancellation.
    pub async fn emit(&self, event: &Event, cancel: &CancellationToken) -> EmitReport {
        let snapshot = self.registry.resolve(&event.kind);

        if snapshot.is_empty() {
            debug!(kind = %event.kind, "no hooks registered");
            return EmitReport::default();
        }

        let span = info_span!(
            "emit",
            kind = %event.kind,
            trajectory_id = %event.trajectory_id,
            sequence = event.sequence,
        );

        async {
            debug!("executing {} hook(s)", snapshot.len());

            let mut report = EmitReport::default();
            let total = snapshot.len();

            for (index, hook) in snapshot.iter().enumerate() {
                if cancel.is_cancelled() {
                    warn!(remaining = total - index, "emission cancelled");
                    report.outcome = report.outcome.fold(Outcome::cancelled());
                    report.skipped = total - index;
                    break;
                }

                if hook.is_once() && !hook.try_claim() {
                    debug!(hook_id = %hook.id(), "once hook already fired elsewhere");
                    continue;
                }

                debug!(hook_id = %hook.id(), priority = hook.priority(), "running hook");
                let result = self.invoke(hook, event, cancel).await;
                report.invoked.push(hook.id().clone());

                if hook.is_once() {
                    self.registry.unregister(hook.id());
                }

                match &result {
                    Outcome::Continue => debug!(hook_id = %hook.id(), "hook continued"),
                    Outcome::Retry(hint) => debug!(hook_id = %hook.id(), %hint, "hook asked for retry"),
                    Outcome::Abort(reason) => warn!(hook_id = %hook.id(), %reason, "hook aborted emission"),
                }

                if result.is_abort() {
                    report.aborted_by = Some(hook.id().clone());
                    report.outcome = report.outcome.fold(result);
                    report.skipped = total - index - 1;
                    break;
                }

                report.outcome = report.outcome.fold(result);
            }

            // A token fired while the last hook ran still cancels the emission
            if !report.invoked.is_empty() && !report.outcome.is_abort() && cancel.is_cancelled() {
                warn!("emission cancelled while its last hook ran");
                report.outcome = Outcome::cancelled();
            }

            report
        }
        .instrument(span)
        .await
    }

    /// Run one handler, converting errors and panics into handler failures
    async fn invoke(
        &self,
        hook: &RegisteredHook,
        event: &Event,
        cancel: &CancellationToken,
    ) -> Outcome {
        // Building the future may panic as well as polling it
        let call = async { hook.handler().handle(event, cancel).await };

        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => {
                error!(hook_id = %hook.id(), "hook failed: {:#}", err);
                Outcome::handler_failure(hook.id().clone(), format!("{:#}", err))
            }
            Err(panic) => {
                let cause = panic_message(panic.as_ref());
                error!(hook_id = %hook.id(), "hook panicked: {}", cause);
                Outcome::handler_failure(hook.id().clone(), cause)
            }
        }
    }
}

impl Default for HookEmitter {
    fn default() -> Self {
        Self::new(HookRegistry::new())
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", msg)
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        format!("panicked: {}", msg)
    } else {
        "panicked".to_string()
    }
}
