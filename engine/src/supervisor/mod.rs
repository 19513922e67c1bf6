//! The water-spider loop: one logical control thread that, per cycle,
//! lists open work items, scores and picks the single highest-priority
//! one, dispatches it through the Agent Dispatcher, advances its state
//! label, and falls back to scanning the repository tree for marker
//! comments when nothing else is actionable. Grounded on the teacher's
//! `LoopEngine::run` shape (a bounded iteration loop with a status enum
//! and a sleep between iterations), generalized from a fixed iteration
//! count to the wall-clock and error-budget stop conditions this loop
//! uses instead.

mod priority;
mod repo_identity;

pub use priority::compute_priority;
pub use repo_identity::RepoIdentity;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::artifact_store::ArtifactStore;
use crate::dispatcher::{AgentDispatcher, AgentOutput, artifact_kind_for};
use crate::domain::{AgentKind, ArtifactKind, ExecutionContext, State, Task, WorkItem};
use crate::errors::CoreError;
use crate::platform::{IssueDraft, LabelPatch, PlatformGateway};
use crate::state_machine::{self, RunOutcome};
use crate::telemetry::{Event, EventKind, TelemetryHandle};

/// Maximum markers converted into new items in a single todo-scan fallback.
const TODO_SCAN_BATCH: usize = 5;

/// One per-item outcome of step 2-3 of a cycle: either the item maps to
/// an agent and is eligible to run, or it is filtered out.
#[derive(Debug, Clone)]
pub enum Decision {
    Execute { item: WorkItem, agent: AgentKind, priority: i32, reason: String },
    Skip { item_number: u64, reason: String },
}

impl Decision {
    pub fn item_number(&self) -> u64 {
        match self {
            Decision::Execute { item, .. } => item.number,
            Decision::Skip { item_number, .. } => *item_number,
        }
    }
}

/// Score every open item and map its state to a next agent. Items in
/// `blocked` or `paused` are filtered out regardless of their mapped
/// agent; an explicit `agent:` owner label overrides the state-derived
/// routing from `state_machine::next_agent_for`.
pub fn compute_decisions(items: &[WorkItem]) -> Vec<Decision> {
    items
        .iter()
        .map(|item| {
            let state = item.state();
            if matches!(state, State::Blocked | State::Paused) {
                return Decision::Skip { item_number: item.number, reason: format!("{state} is not actionable") };
            }
            match item.agent_owner().or_else(|| state_machine::next_agent_for(state)) {
                Some(agent) => Decision::Execute {
                    priority: compute_priority(item),
                    reason: format!("{state} routes to {agent}"),
                    agent,
                    item: item.clone(),
                },
                None => Decision::Skip { item_number: item.number, reason: format!("{state} has no next agent") },
            }
        })
        .collect()
}

/// Pick the single highest-priority `Execute` decision, breaking ties by
/// the lower item number.
pub fn pick_highest_priority(decisions: &[Decision]) -> Option<&Decision> {
    decisions
        .iter()
        .filter_map(|d| match d {
            Decision::Execute { item, priority, .. } => Some((d, *priority, item.number)),
            Decision::Skip { .. } => None,
        })
        .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.2.cmp(&a.2)))
        .map(|(d, _, _)| d)
}

/// Tallies emitted on termination: spec.md's "cycles, executions, skips,
/// errors, duration" summary.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub cycles: u64,
    pub executions: u64,
    pub skips: u64,
    pub errors: u64,
    pub duration: Duration,
}

/// Why a run stopped, carried alongside the summary so the CLI can word
/// the final message without re-deriving the reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    MaxDuration,
    ErrorBudgetExhausted,
    Cancelled,
}

pub struct Supervisor {
    gateway: Arc<dyn PlatformGateway>,
    dispatcher: AgentDispatcher,
    artifacts: Arc<ArtifactStore>,
    telemetry: TelemetryHandle,
    repo_root: PathBuf,
    session_id: String,
    interval: Duration,
    max_duration: Option<Duration>,
    scan_todos: bool,
    dry_run: bool,
    has_platform_token: bool,
}

impl Supervisor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn PlatformGateway>,
        dispatcher: AgentDispatcher,
        artifacts: Arc<ArtifactStore>,
        telemetry: TelemetryHandle,
        repo_root: PathBuf,
        session_id: impl Into<String>,
        interval: Duration,
        max_duration_minutes: u64,
        scan_todos: bool,
        dry_run: bool,
        has_platform_token: bool,
    ) -> Self {
        Self {
            gateway,
            dispatcher,
            artifacts,
            telemetry,
            repo_root,
            session_id: session_id.into(),
            interval,
            max_duration: (max_duration_minutes > 0).then(|| Duration::from_secs(max_duration_minutes * 60)),
            scan_todos,
            dry_run,
            has_platform_token,
        }
    }

    fn emit(&self, component: &str, kind: EventKind, payload: serde_json::Value) {
        self.telemetry.emit(Event::new(self.session_id.clone(), component, kind, payload));
    }

    /// Converts a gateway error and, when it's a rate limit, emits the
    /// `platform.ratelimit` event alongside it.
    fn gateway_result<T>(&self, result: Result<T, crate::platform::GatewayError>) -> Result<T, CoreError> {
        result.map_err(|e| {
            if let Some(retry_after) = e.retry_after() {
                self.emit("platform", EventKind::PlatformRateLimit, serde_json::json!({"retry_after_ms": retry_after.as_millis() as u64}));
            }
            CoreError::from(e)
        })
    }

    /// Run cycles until a stop condition fires, sleeping `interval`
    /// between them. `should_cancel` is polled once per cycle as the
    /// operator cancel signal.
    pub async fn run(&self, mut should_cancel: impl FnMut() -> bool) -> (RunSummary, StopReason) {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        loop {
            summary.cycles += 1;
            match self.run_cycle().await {
                Ok(outcome) => {
                    summary.executions += outcome.executions;
                    summary.skips += outcome.skips;
                }
                Err(e) => {
                    warn!(error = %e, "supervisor: cycle failed");
                    summary.errors += 1;
                }
            }

            let stop = if let Some(bound) = self.max_duration
                && started.elapsed() >= bound
            {
                Some(StopReason::MaxDuration)
            } else if summary.errors >= 10 {
                Some(StopReason::ErrorBudgetExhausted)
            } else if should_cancel() {
                Some(StopReason::Cancelled)
            } else {
                None
            };

            if let Some(reason) = stop {
                summary.duration = started.elapsed();
                info!(cycles = summary.cycles, executions = summary.executions, skips = summary.skips, errors = summary.errors, ?reason, "supervisor: run terminated");
                return (summary, reason);
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    /// One cycle: resolve readiness, list items, pick and dispatch the
    /// single highest-priority decision, or fall back to a todo scan.
    async fn run_cycle(&self) -> Result<CycleOutcome, CoreError> {
        if !self.has_platform_token || RepoIdentity::resolve(&self.repo_root).await.is_none() {
            self.emit("supervisor", EventKind::SupervisorDecision, serde_json::json!({"ready": false}));
            return Ok(CycleOutcome::default());
        }

        let mut items = Vec::new();
        let (owner, repo) = self.current_repo().await?;
        let mut page = 0;
        loop {
            let fetched = self.gateway_result(self.gateway.list_work_items(&owner, &repo, page).await)?;
            items.extend(fetched.items);
            match fetched.next_page {
                Some(next) => page = next,
                None => break,
            }
        }

        let decisions = compute_decisions(&items);
        let skips = decisions.iter().filter(|d| matches!(d, Decision::Skip { .. })).count() as u64;

        match pick_highest_priority(&decisions) {
            Some(decision) => {
                self.emit(
                    "supervisor",
                    EventKind::SupervisorDecision,
                    serde_json::json!({"item": decision.item_number(), "dry_run": self.dry_run}),
                );
                if !self.dry_run {
                    self.dispatch(decision).await?;
                }
                Ok(CycleOutcome { executions: 1, skips })
            }
            None if self.scan_todos => {
                self.run_todo_scan_fallback(&owner, &repo).await?;
                Ok(CycleOutcome { executions: 0, skips })
            }
            None => Ok(CycleOutcome { executions: 0, skips }),
        }
    }

    async fn current_repo(&self) -> Result<(String, String), CoreError> {
        RepoIdentity::resolve(&self.repo_root)
            .await
            .map(|id| (id.owner, id.repo))
            .ok_or_else(|| CoreError::Config("could not resolve repo identity from the working directory's VCS remote".into()))
    }

    async fn dispatch(&self, decision: &Decision) -> Result<(), CoreError> {
        let Decision::Execute { item, agent, .. } = decision else {
            return Ok(());
        };

        let task = Task::new(item.title.clone(), item.type_tag().unwrap_or("feature").to_string(), *agent);
        let prompt = format!("{}\n\n{}", item.title, item.body);
        let ctx = ExecutionContext::new(task, item.clone(), prompt);

        let component = format!("dispatcher:{agent}");
        self.emit(&component, EventKind::AgentInvoke, serde_json::json!({"agent": agent.to_string(), "item": item.number}));
        let started = Instant::now();
        let result = self.dispatcher.dispatch(&ctx).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        let outcome = match &result {
            Ok(AgentOutput::Review(review)) if !review.passed => RunOutcome::NeedsReview,
            Ok(_) => RunOutcome::Success,
            Err(_) => RunOutcome::Failure,
        };

        self.emit(
            &component,
            EventKind::AgentResult,
            serde_json::json!({"agent_kind": agent.to_string(), "duration_ms": duration_ms, "success": matches!(outcome, RunOutcome::Success)}),
        );

        if let Ok(output) = &result {
            self.persist_artifact(item, *agent, output)?;
        }

        let next = state_machine::next_state(item.state(), *agent, outcome);
        if next != item.state() {
            let patch = LabelPatch::set_state("state:", &next.to_string(), &item.labels);
            self.gateway_result(self.gateway.patch_labels(&item.owner, &item.repo, item.number, patch).await)?;
        }

        result.map(|_| ())
    }

    fn persist_artifact(&self, item: &WorkItem, agent: AgentKind, output: &AgentOutput) -> Result<(), CoreError> {
        let Some(kind) = artifact_kind_for(agent) else {
            return Ok(());
        };
        let path = match (kind, output) {
            (ArtifactKind::CodegenOutput, AgentOutput::Codegen(out)) => self.artifacts.write(&item.owner, &item.repo, item.number, kind, out),
            (ArtifactKind::ReviewOutput, AgentOutput::Review(out)) => self.artifacts.write(&item.owner, &item.repo, item.number, kind, out),
            (ArtifactKind::PrOutput, AgentOutput::Pr(out)) => self.artifacts.write(&item.owner, &item.repo, item.number, kind, out),
            (ArtifactKind::DeployOutput, AgentOutput::Deploy(out)) => self.artifacts.write(&item.owner, &item.repo, item.number, kind, out),
            (ArtifactKind::TestOutput, AgentOutput::Test(out)) => self.artifacts.write(&item.owner, &item.repo, item.number, kind, out),
            _ => return Ok(()),
        };
        let path = path.map_err(|e| CoreError::Internal(e.to_string()))?;
        self.emit("artifact_store", EventKind::ArtifactSave, serde_json::json!({"path": path.to_string_lossy(), "kind": kind.to_string()}));
        Ok(())
    }

    async fn run_todo_scan_fallback(&self, owner: &str, repo: &str) -> Result<(), CoreError> {
        let markers = codescan::scan_markers(&self.repo_root, &[]).map_err(|e| CoreError::Internal(e.to_string()))?;
        if markers.is_empty() {
            return Ok(());
        }
        let batch = &markers[..markers.len().min(TODO_SCAN_BATCH)];
        if markers.len() > batch.len() {
            info!(found = markers.len(), converting = batch.len(), "supervisor: todo scan found more markers than one batch converts");
        }

        for marker in batch {
            let draft = IssueDraft {
                title: format!("{}: {}", marker.kind, marker.text),
                body: format!("Found at `{}:{}` by the repository marker scan.", marker.file, marker.line),
                labels: vec!["type:bug".to_string(), "source:todo-scan".to_string()],
            };
            if self.dry_run {
                continue;
            }
            self.gateway_result(self.gateway.create_issue(owner, repo, draft).await)?;
        }
        self.emit("supervisor", EventKind::ProjectSync, serde_json::json!({"markers_converted": batch.len()}));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct CycleOutcome {
    executions: u64,
    skips: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Label;

    fn item(number: u64, state_label: &str, priority_label: Option<&str>) -> WorkItem {
        let mut labels = vec![Label(state_label.to_string())];
        if let Some(p) = priority_label {
            labels.push(Label(p.to_string()));
        }
        WorkItem {
            owner: "acme".into(),
            repo: "widgets".into(),
            number,
            title: format!("item {number}"),
            body: String::new(),
            open: true,
            labels,
            assignee: None,
            created_at: 0,
            updated_at: 0,
            url: format!("https://example.test/{number}"),
        }
    }

    #[test]
    fn blocked_and_paused_items_are_always_skipped() {
        let items = vec![item(1, "state:blocked", None), item(2, "state:paused", None)];
        let decisions = compute_decisions(&items);
        assert!(decisions.iter().all(|d| matches!(d, Decision::Skip { .. })));
    }

    #[test]
    fn done_items_have_no_next_agent_and_are_skipped() {
        let decisions = compute_decisions(&[item(1, "state:done", None)]);
        assert!(matches!(decisions[0], Decision::Skip { .. }));
    }

    #[test]
    fn highest_priority_wins_and_ties_favor_the_lower_item_number() {
        let items = vec![item(5, "state:pending", None), item(3, "state:pending", None), item(9, "state:reviewing", None)];
        let decisions = compute_decisions(&items);
        let winner = pick_highest_priority(&decisions).unwrap();
        assert_eq!(winner.item_number(), 3);
    }

    #[test]
    fn critical_items_outrank_plain_pending_items_despite_a_higher_number() {
        let items = vec![item(1, "state:pending", None), item(2, "state:pending", Some("P0-critical"))];
        let decisions = compute_decisions(&items);
        let winner = pick_highest_priority(&decisions).unwrap();
        assert_eq!(winner.item_number(), 2);
    }
}
