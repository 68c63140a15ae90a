//! Hook event kinds
//!
//! Defines the lifecycle points of a trajectory that can trigger hook execution.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle points that can trigger hook execution
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Trajectory run begins
    RunStart,
    /// A reasoning step begins
    StepStart,
    /// A reasoning step ends
    StepEnd,
    /// The agent issues a tool call
    ToolCall,
    /// A tool call produced a result
    ToolResult,
    /// The agent hit an error
    Error,
    /// Trajectory run ends
    RunEnd,
    /// Application-defined lifecycle point
    Custom(String),
}

impl EventKind {
    /// Create a custom event kind
    pub fn custom(name: impl Into<String>) -> Self {
        EventKind::Custom(name.into())
    }

    /// Get a human-readable description of this event kind
    pub fn description(&self) -> &str {
        match self {
            EventKind::RunStart => "Trajectory run begins",
            EventKind::StepStart => "Reasoning step begins",
            EventKind::StepEnd => "Reasoning step ends",
            EventKind::ToolCall => "Tool call issued",
            EventKind::ToolResult => "Tool result received",
            EventKind::Error => "Agent error",
            EventKind::RunEnd => "Trajectory run ends",
            EventKind::Custom(name) => name,
        }
    }

    /// Whether this is one of the built-in lifecycle kinds
    pub fn is_builtin(&self) -> bool {
        !matches!(self, EventKind::Custom(_))
    }

    /// Returns all built-in event kinds
    pub fn all() -> &'static [EventKind] {
        &[
            EventKind::RunStart,
            EventKind::StepStart,
            EventKind::StepEnd,
            EventKind::ToolCall,
            EventKind::ToolResult,
            EventKind::Error,
            EventKind::RunEnd,
        ]
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::RunStart => write!(f, "RunStart"),
            EventKind::StepStart => write!(f, "StepStart"),
            EventKind::StepEnd => write!(f, "StepEnd"),
            EventKind::ToolCall => write!(f, "ToolCall"),
            EventKind::ToolResult => write!(f, "ToolResult"),
            EventKind::Error => write!(f, "Error"),
            EventKind::RunEnd => write!(f, "RunEnd"),
            EventKind::Custom(name) => write!(f, "Custom({})", name),
        }
    }
}
