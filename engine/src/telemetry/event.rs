//! The telemetry event schema: `timestamp, sessionId, component, kind,
//! payload`. `Kind` is the closed set spec.md §4.10 names, plus
//! `ProjectSync` for label auto-sync to an external projects surface
//! (treated as an additional sink, not a special code path).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SchedulerState,
    GroupStart,
    GroupComplete,
    GroupFail,
    GroupRetry,
    SessionTimeout,
    AgentInvoke,
    AgentResult,
    ArtifactSave,
    PlatformRateLimit,
    SupervisorDecision,
    ProjectSync,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventKind::SchedulerState => "scheduler.state",
            EventKind::GroupStart => "group.start",
            EventKind::GroupComplete => "group.complete",
            EventKind::GroupFail => "group.fail",
            EventKind::GroupRetry => "group.retry",
            EventKind::SessionTimeout => "session.timeout",
            EventKind::AgentInvoke => "agent.invoke",
            EventKind::AgentResult => "agent.result",
            EventKind::ArtifactSave => "artifact.save",
            EventKind::PlatformRateLimit => "platform.ratelimit",
            EventKind::SupervisorDecision => "supervisor.decision",
            EventKind::ProjectSync => "project.sync",
        };
        write!(f, "{s}")
    }
}

/// One append-only telemetry record. `component` names the emitting
/// subsystem (`"supervisor"`, `"scheduler"`, `"dispatcher:codegen"`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub timestamp_ms: i64,
    pub session_id: String,
    pub component: String,
    pub kind: EventKind,
    pub payload: serde_json::Value,
}

impl Event {
    pub fn new(session_id: impl Into<String>, component: impl Into<String>, kind: EventKind, payload: serde_json::Value) -> Self {
        Self {
            timestamp_ms: taskstore::now_ms(),
            session_id: session_id.into(),
            component: component.into(),
            kind,
            payload,
        }
    }
}
