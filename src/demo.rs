//! Scripted trajectory driver
//!
//! Walks one run through the engine: an operator approval gate, one step per
//! tool, a tool policy hook and an audit hook. Retries requested by hooks are
//! honoured up to a limit; an abort ends the run.

use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use trajhook_core::inbox::predicates;
use trajhook_core::{
    CallbackHook, EngineConfig, Event, EventKind, HookHandler, InboxFeed, InboxMessage, Outcome,
    Trajectory, TrajectoryId, TrajectoryState,
};

const APPROVAL_EVENT: &str = "await_approval";
const OPERATOR: &str = "operator";

/// Knobs for one scripted run
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub trajectory_id: TrajectoryId,
    pub tools: Vec<String>,
    pub deny_tools: Vec<String>,
    /// `None` means nobody approves and the gate times out
    pub approval_delay: Option<Duration>,
    pub max_retries: u32,
}

/// One emitted event and its verdict
#[derive(Debug, Clone, Serialize)]
pub struct EmissionRecord {
    pub sequence: u64,
    pub kind: EventKind,
    pub outcome: String,
}

/// What the run did
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub trajectory_id: String,
    pub approved: bool,
    pub steps_completed: usize,
    pub final_state: TrajectoryState,
    pub emissions: Vec<EmissionRecord>,
}

/// Refuses tool calls on a deny list; tools named `flaky*` ask for one retry
struct ToolPolicy {
    denied: HashSet<String>,
}

#[async_trait::async_trait]
impl HookHandler for ToolPolicy {
    async fn handle(&self, event: &Event, _cancel: &CancellationToken) -> anyhow::Result<Outcome> {
        let tool = event.payload["tool"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("tool call without a tool name"))?;
        let attempt = event.payload["attempt"].as_u64().unwrap_or(0);

        if self.denied.contains(tool) {
            return Ok(Outcome::abort(format!("tool {} is denied", tool)));
        }
        if tool.starts_with("flaky") && attempt == 0 {
            return Ok(Outcome::retry(format!("{} is warming up", tool)));
        }
        Ok(Outcome::Continue)
    }
}

struct Driver {
    trajectory: Trajectory,
    cancel: CancellationToken,
    emissions: Vec<EmissionRecord>,
}

impl Driver {
    async fn emit(&mut self, kind: EventKind, payload: serde_json::Value) -> anyhow::Result<Outcome> {
        let event = self.trajectory.next_event(kind, payload);
        let report = self.trajectory.emit_event(&event, &self.cancel).await?;
        self.emissions.push(EmissionRecord {
            sequence: event.sequence,
            kind: event.kind,
            outcome: report.outcome.to_string(),
        });
        Ok(report.into_outcome())
    }

    /// Emit until hooks stop asking for a retry or the limit is reached
    async fn emit_with_retries(
        &mut self,
        kind: EventKind,
        payload: impl Fn(u32) -> serde_json::Value,
        max_retries: u32,
    ) -> anyhow::Result<Outcome> {
        let mut attempt = 0;
        loop {
            let outcome = self.emit(kind.clone(), payload(attempt)).await?;
            if !outcome.is_retry() || attempt >= max_retries {
                return Ok(outcome);
            }
            warn!(kind = %kind, attempt, %outcome, "hooks requested a retry");
            attempt += 1;
        }
    }
}

/// Drive one scripted run to completion
pub async fn run(
    options: DemoOptions,
    config: EngineConfig,
    cancel: CancellationToken,
) -> anyhow::Result<RunSummary> {
    let trajectory = Trajectory::with_config(options.trajectory_id.clone(), config);

    trajectory
        .on_tool_call(ToolPolicy {
            denied: options.deny_tools.iter().cloned().collect(),
        })
        .id("tool_policy")
        .register()?;

    for kind in EventKind::all() {
        trajectory
            .on(kind.clone(), audit_hook())
            .id(format!("audit_{}", kind).to_lowercase())
            .priority(i32::MIN)
            .register()?;
    }

    let feed = Arc::new(InboxFeed::default());
    let approval = trajectory
        .attach_gate(
            EventKind::custom(APPROVAL_EVENT),
            trajectory.inbox_gate(predicates::from_sender(OPERATOR), feed.clone()),
        )
        .id("operator_approval")
        .register()?;

    if let Some(delay) = options.approval_delay {
        let feed = Arc::clone(&feed);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            feed.append(
                InboxMessage::new("approval-1", OPERATOR, 1).with_body(json!({"approved": true})),
            );
        });
    }

    let mut driver = Driver {
        trajectory,
        cancel,
        emissions: Vec::new(),
    };
    let mut approved = false;
    let mut steps_completed = 0;

    let started = driver.emit(EventKind::RunStart, json!({})).await?;
    if !started.is_abort() {
        let verdict = driver
            .emit_with_retries(
                EventKind::custom(APPROVAL_EVENT),
                |attempt| json!({ "attempt": attempt }),
                options.max_retries,
            )
            .await?;
        approved = verdict.is_continue();
        approval.unregister();

        if verdict.is_retry() {
            driver
                .emit(EventKind::Error, json!({ "error": format!("not approved: {}", verdict) }))
                .await?;
        } else if approved {
            for tool in &options.tools {
                if !run_step(&mut driver, tool, options.max_retries).await? {
                    break;
                }
                steps_completed += 1;
            }
        }
    }

    driver.emit(EventKind::RunEnd, json!({ "steps": steps_completed })).await?;

    let final_state = driver.trajectory.state();
    info!(
        trajectory_id = %driver.trajectory.id(),
        %final_state,
        steps_completed,
        "run finished"
    );

    Ok(RunSummary {
        trajectory_id: driver.trajectory.id().to_string(),
        approved,
        steps_completed,
        final_state,
        emissions: driver.emissions,
    })
}

/// One step: open, call the tool, report the result, close
///
/// Returns `false` when the run should stop.
async fn run_step(driver: &mut Driver, tool: &str, max_retries: u32) -> anyhow::Result<bool> {
    if driver.emit(EventKind::StepStart, json!({ "tool": tool })).await?.is_abort() {
        return Ok(false);
    }

    let call = driver
        .emit_with_retries(
            EventKind::ToolCall,
            |attempt| json!({ "tool": tool, "attempt": attempt }),
            max_retries,
        )
        .await?;
    if call.is_abort() {
        return Ok(false);
    }
    if call.is_retry() {
        driver
            .emit(EventKind::Error, json!({ "tool": tool, "error": call.to_string() }))
            .await?;
    } else if driver
        .emit(EventKind::ToolResult, json!({ "tool": tool, "ok": true }))
        .await?
        .is_abort()
    {
        return Ok(false);
    }

    Ok(!driver.emit(EventKind::StepEnd, json!({ "tool": tool })).await?.is_abort())
}

fn audit_hook() -> CallbackHook {
    CallbackHook::new(|event| {
        debug!(
            trajectory_id = %event.trajectory_id,
            sequence = event.sequence,
            kind = %event.kind,
            payload = %event.payload,
            "audit"
        );
        Outcome::Continue
    })
}
