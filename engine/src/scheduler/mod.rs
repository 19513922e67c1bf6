//! Scheduler: priority-ordered, dependency-gated dispatch of `TaskGroup`s
//! under a concurrency cap and a sliding-window rate limit. Generalizes
//! the request-level scheduler to group-level scheduling with a
//! `depends_on_groups` gate, retry-then-poison failure handling, and the
//! overall `idle -> running -> {completed, failed, paused}` state machine
//! from spec.md §4.6.

mod config;
mod queue;

pub use config::SchedulerConfig;
pub use queue::{QueueState, ScheduleResult, ScheduledGroup, SchedulerStats};

use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use crate::domain::{SchedulerStatus, TaskGroup};

/// What happened when a running group's attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOutcome {
    /// Under the retry budget: requeued as `waiting`.
    Retrying { attempt: u32 },
    /// Retry budget exhausted: marked `failed`, dependents poisoned.
    Failed,
}

struct Inner {
    queue: BinaryHeap<ScheduledGroup>,
    running: HashMap<String, ScheduledGroup>,
    completed: HashSet<String>,
    failed: HashSet<String>,
    skipped: HashSet<String>,
    /// All groups known to the scheduler, keyed by id, used to check
    /// `depends_on_groups` gating without a round-trip to the store.
    groups: HashMap<String, TaskGroup>,
    request_times: VecDeque<Instant>,
    stats: SchedulerStats,
    status: SchedulerStatus,
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
}

impl Inner {
    fn total_groups(&self) -> usize {
        self.groups.len()
    }

    /// Re-derive the overall status once queue/running are both empty:
    /// `completed` if nothing failed, `failed` otherwise. Never called
    /// while `paused`, and never leaves a terminal state.
    fn settle_if_drained(&mut self) {
        let terminal = matches!(self.status, SchedulerStatus::Completed | SchedulerStatus::Failed);
        if terminal || self.status == SchedulerStatus::Paused {
            return;
        }
        if self.queue.is_empty() && self.running.is_empty() && self.total_groups() > 0 {
            self.status = if self.failed.is_empty() { SchedulerStatus::Completed } else { SchedulerStatus::Failed };
            self.ended_at = Some(Instant::now());
        }
    }

    /// Poison every group (direct or transitive) that depends on
    /// `failed_id`, marking it `skipped` with reason "upstream failure"
    /// and removing it from the dispatch queue.
    fn poison_dependents(&mut self, failed_id: &str) {
        let mut frontier = vec![failed_id.to_string()];
        while let Some(id) = frontier.pop() {
            let dependents: Vec<String> = self
                .groups
                .values()
                .filter(|g| g.depends_on_groups.contains(&id) && !g.status.is_terminal())
                .map(|g| g.id.clone())
                .collect();
            for dep_id in dependents {
                if self.skipped.contains(&dep_id) {
                    continue;
                }
                if let Some(group) = self.groups.get_mut(&dep_id) {
                    group.skip("upstream failure");
                }
                self.skipped.insert(dep_id.clone());
                warn!(group_id = %dep_id, upstream = %id, "group skipped: upstream failure");
                frontier.push(dep_id);
            }
        }
        self.queue.retain(|g| !self.skipped.contains(&g.group_id));
    }
}

pub struct GroupScheduler {
    config: SchedulerConfig,
    inner: Mutex<Inner>,
    notify: Notify,
}

impl GroupScheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                queue: BinaryHeap::new(),
                running: HashMap::new(),
                completed: HashSet::new(),
                failed: HashSet::new(),
                skipped: HashSet::new(),
                groups: HashMap::new(),
                request_times: VecDeque::new(),
                stats: SchedulerStats::default(),
                status: SchedulerStatus::Idle,
                started_at: None,
                ended_at: None,
            }),
            notify: Notify::new(),
        }
    }

    /// Register a group with the scheduler and enqueue it. Dependency
    /// gating is evaluated lazily at dispatch time, not at enqueue time.
    pub async fn submit(&self, group: TaskGroup) -> ScheduleResult {
        let mut inner = self.inner.lock().await;

        if inner.running.contains_key(&group.id) || inner.groups.contains_key(&group.id) {
            return ScheduleResult::Rejected { reason: "already scheduled".to_string() };
        }

        let now = Instant::now();
        let window_start = now - self.config.rate_window();
        while inner.request_times.front().map(|t| *t < window_start).unwrap_or(false) {
            inner.request_times.pop_front();
        }
        if inner.request_times.len() >= self.config.max_requests_per_window as usize {
            inner.stats.total_rate_limited += 1;
            let oldest = *inner.request_times.front().unwrap();
            return ScheduleResult::RateLimited { retry_after: self.config.rate_window() - (now - oldest) };
        }

        let scheduled = ScheduledGroup::new(group.id.clone(), group.priority);
        inner.groups.insert(group.id.clone(), group.clone());
        inner.queue.push(scheduled);
        inner.stats.peak_queue_depth = inner.stats.peak_queue_depth.max(inner.queue.len());
        // New work arriving after the scheduler settled reopens it.
        if matches!(inner.status, SchedulerStatus::Completed | SchedulerStatus::Failed) {
            inner.status = SchedulerStatus::Idle;
            inner.ended_at = None;
        }
        debug!(group_id = %group.id, "submitted group to scheduler");
        ScheduleResult::Queued { position: inner.queue.len(), estimated_wait: Duration::from_secs(0) }
    }

    /// Pop the next group whose dependencies are all completed and that
    /// fits under the concurrency cap, or `None` if nothing is
    /// dispatchable right now (including while `paused`). A group whose
    /// dependency failed outright is poisoned as a side effect of this
    /// walk rather than left queued forever.
    pub async fn get_next_group(&self) -> Option<TaskGroup> {
        let mut inner = self.inner.lock().await;
        if inner.status == SchedulerStatus::Paused || inner.running.len() >= self.config.max_concurrent {
            return None;
        }

        let mut deferred = Vec::new();
        let mut chosen = None;

        while let Some(candidate) = inner.queue.pop() {
            if inner.skipped.contains(&candidate.group_id) {
                continue;
            }

            let deps_failed = inner
                .groups
                .get(&candidate.group_id)
                .map(|g| g.depends_on_groups.iter().any(|d| inner.failed.contains(d) || inner.skipped.contains(d)))
                .unwrap_or(false);

            if deps_failed {
                inner.poison_dependents_of_candidate(&candidate.group_id);
                continue;
            }

            let deps_ready = inner
                .groups
                .get(&candidate.group_id)
                .map(|g| g.depends_on_groups.iter().all(|d| inner.completed.contains(d)))
                .unwrap_or(true);

            if deps_ready {
                chosen = Some(candidate);
                break;
            }
            deferred.push(candidate);
        }

        for group in deferred {
            inner.queue.push(group);
        }

        let candidate = chosen?;
        let group = inner.groups.get_mut(&candidate.group_id)?;
        group.start();
        let group = group.clone();

        let now = Instant::now();
        let mut started = candidate;
        started.started_at = Some(now);
        inner.request_times.push_back(now);
        inner.stats.total_scheduled += 1;
        inner.running.insert(started.group_id.clone(), started);
        inner.stats.peak_concurrent = inner.stats.peak_concurrent.max(inner.running.len());
        if inner.status == SchedulerStatus::Idle {
            inner.status = SchedulerStatus::Running;
            inner.started_at = Some(now);
        }

        Some(group)
    }

    pub async fn complete_group(&self, group_id: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(scheduled) = inner.running.remove(group_id)
            && let Some(started) = scheduled.started_at
        {
            inner.stats.total_wait_time_ms += started.elapsed().as_millis() as u64;
        }
        inner.completed.insert(group_id.to_string());
        if let Some(group) = inner.groups.get_mut(group_id) {
            group.complete();
        }
        inner.stats.total_completed += 1;
        inner.settle_if_drained();
        drop(inner);
        self.notify.notify_waiters();
    }

    /// Record a failed attempt. Below the configured retry budget the
    /// group is requeued as `waiting`; at the budget it is marked
    /// `failed` and every transitive dependent is poisoned as `skipped`.
    pub async fn fail_group(&self, group_id: &str) -> FailOutcome {
        let mut inner = self.inner.lock().await;
        inner.running.remove(group_id);

        let retry_count = inner.groups.get(group_id).map(|g| g.retry_count).unwrap_or(0);
        let outcome = if retry_count < self.config.max_retries {
            if let Some(group) = inner.groups.get_mut(group_id) {
                group.retry();
            }
            let priority = inner.groups.get(group_id).map(|g| g.priority).unwrap_or(5);
            inner.queue.push(ScheduledGroup::new(group_id, priority));
            info!(group_id, attempt = retry_count + 1, "group failed, retrying");
            FailOutcome::Retrying { attempt: retry_count + 1 }
        } else {
            if let Some(group) = inner.groups.get_mut(group_id) {
                group.fail();
            }
            inner.failed.insert(group_id.to_string());
            inner.stats.total_failed += 1;
            warn!(group_id, "group failed, retry budget exhausted");
            inner.poison_dependents(group_id);
            FailOutcome::Failed
        };

        inner.settle_if_drained();
        drop(inner);
        self.notify.notify_waiters();
        outcome
    }

    /// `running -> paused`. In-flight groups are left alone; no new group
    /// is dispatched until `resume`.
    pub async fn pause(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if matches!(inner.status, SchedulerStatus::Running | SchedulerStatus::Idle) {
            inner.status = SchedulerStatus::Paused;
            true
        } else {
            false
        }
    }

    /// `paused -> running`.
    pub async fn resume(&self) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.status == SchedulerStatus::Paused {
            inner.status = SchedulerStatus::Running;
            self.notify.notify_waiters();
            true
        } else {
            false
        }
    }

    pub async fn status(&self) -> SchedulerStatus {
        self.inner.lock().await.status
    }

    pub async fn queue_state(&self) -> QueueState {
        let inner = self.inner.lock().await;
        QueueState {
            running: inner.running.len(),
            queued: inner.queue.len(),
            blocked: inner.skipped.len(),
            rate_limited: inner.request_times.len() >= self.config.max_requests_per_window as usize,
            stats: inner.stats.clone(),
        }
    }

    /// Percent of registered groups that have reached a terminal state
    /// (`completed`, `failed` or `skipped`).
    pub async fn get_progress(&self) -> f64 {
        let inner = self.inner.lock().await;
        let total = inner.total_groups();
        if total == 0 {
            return 0.0;
        }
        let done = inner.completed.len() + inner.failed.len() + inner.skipped.len();
        (done as f64 / total as f64) * 100.0
    }

    /// Estimate remaining wall-clock time from the observed mean
    /// completion rate. `None` until at least one group has completed.
    pub async fn get_estimated_time_remaining(&self) -> Option<Duration> {
        let inner = self.inner.lock().await;
        let completed = inner.stats.total_completed;
        if completed == 0 {
            return None;
        }
        let elapsed = inner.started_at?.elapsed();
        let mean_per_group = elapsed.as_secs_f64() / completed as f64;
        let remaining = inner.total_groups().saturating_sub(inner.completed.len() + inner.failed.len() + inner.skipped.len());
        Some(Duration::from_secs_f64(mean_per_group * remaining as f64))
    }

    pub async fn has_work_remaining(&self) -> bool {
        let inner = self.inner.lock().await;
        !inner.queue.is_empty() || !inner.running.is_empty()
    }

    pub async fn can_accept_work(&self) -> bool {
        let inner = self.inner.lock().await;
        inner.status == SchedulerStatus::Running && inner.running.len() < self.config.max_concurrent
    }

    pub async fn get_failed_groups(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        inner.failed.iter().cloned().collect()
    }

    /// `runningGroups + waitingGroups + completedGroups + failedGroups +
    /// skippedGroups = totalGroups`, the detail-floor invariant from
    /// spec.md §4.6.
    pub async fn detail_floor_holds(&self) -> bool {
        let inner = self.inner.lock().await;
        let waiting = inner.queue.len();
        inner.running.len() + waiting + inner.completed.len() + inner.failed.len() + inner.skipped.len() == inner.total_groups()
    }

    pub async fn generate_progress_summary(&self) -> String {
        let inner = self.inner.lock().await;
        format!(
            "{status}: {completed}/{total} completed, {running} running, {waiting} waiting, {failed} failed, {skipped} skipped",
            status = inner.status,
            completed = inner.completed.len(),
            total = inner.total_groups(),
            running = inner.running.len(),
            waiting = inner.queue.len(),
            failed = inner.failed.len(),
            skipped = inner.skipped.len(),
        )
    }

    pub async fn wait_for_work(&self) {
        self.notify.notified().await;
    }
}

impl Inner {
    /// Poison the dependents of a group discovered to have a failed or
    /// skipped dependency while still queued itself (it never ran).
    fn poison_dependents_of_candidate(&mut self, candidate_id: &str) {
        if let Some(group) = self.groups.get_mut(candidate_id) {
            group.skip("upstream failure");
        }
        self.skipped.insert(candidate_id.to_string());
        warn!(group_id = %candidate_id, "group skipped: upstream failure");
        self.poison_dependents(candidate_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentKind;

    fn group(id: &str, deps: &[&str], priority: i32) -> TaskGroup {
        let mut g = TaskGroup::new(AgentKind::CodeGen, vec!["t1".into()], 0, priority);
        g.id = id.to_string();
        g.depends_on_groups = deps.iter().map(|s| s.to_string()).collect();
        g
    }

    #[tokio::test]
    async fn dispatches_only_groups_with_satisfied_dependencies() {
        let scheduler = GroupScheduler::new(SchedulerConfig { max_concurrent: 4, ..Default::default() });
        scheduler.submit(group("a", &[], 5)).await;
        scheduler.submit(group("b", &["a"], 5)).await;

        let next = scheduler.get_next_group().await.unwrap();
        assert_eq!(next.id, "a");
        assert!(scheduler.get_next_group().await.is_none());

        scheduler.complete_group("a").await;
        let next = scheduler.get_next_group().await.unwrap();
        assert_eq!(next.id, "b");
    }

    #[tokio::test]
    async fn failing_a_group_retries_once_then_poisons_dependents() {
        let scheduler =
            GroupScheduler::new(SchedulerConfig { max_concurrent: 4, max_retries: 1, ..Default::default() });
        scheduler.submit(group("a", &[], 5)).await;
        scheduler.submit(group("b", &["a"], 5)).await;

        let a = scheduler.get_next_group().await.unwrap();
        assert_eq!(scheduler.fail_group(&a.id).await, FailOutcome::Retrying { attempt: 1 });

        // Retried: dispatchable again, and "b" is still untouched.
        let a_again = scheduler.get_next_group().await.unwrap();
        assert_eq!(a_again.id, "a");
        assert_eq!(scheduler.fail_group(&a_again.id).await, FailOutcome::Failed);

        assert!(scheduler.get_next_group().await.is_none());
        let state = scheduler.queue_state().await;
        assert_eq!(state.blocked, 1);
        assert_eq!(scheduler.get_failed_groups().await, vec!["a".to_string()]);
        assert_eq!(scheduler.status().await, SchedulerStatus::Failed);
    }

    #[tokio::test]
    async fn concurrency_cap_defers_dispatch() {
        let scheduler = GroupScheduler::new(SchedulerConfig { max_concurrent: 1, ..Default::default() });
        scheduler.submit(group("a", &[], 5)).await;
        scheduler.submit(group("b", &[], 5)).await;

        assert!(scheduler.get_next_group().await.is_some());
        assert!(scheduler.get_next_group().await.is_none());
    }

    #[tokio::test]
    async fn pause_blocks_dispatch_until_resumed() {
        let scheduler = GroupScheduler::new(SchedulerConfig { max_concurrent: 4, ..Default::default() });
        scheduler.submit(group("a", &[], 5)).await;
        assert!(scheduler.get_next_group().await.is_some());
        scheduler.complete_group("a").await;

        scheduler.submit(group("b", &[], 5)).await;
        assert!(scheduler.pause().await);
        assert!(scheduler.get_next_group().await.is_none());
        assert!(scheduler.resume().await);
        assert!(scheduler.get_next_group().await.is_some());
    }

    #[tokio::test]
    async fn all_groups_completed_settles_to_completed_status() {
        let scheduler = GroupScheduler::new(SchedulerConfig { max_concurrent: 4, ..Default::default() });
        scheduler.submit(group("a", &[], 5)).await;
        let a = scheduler.get_next_group().await.unwrap();
        scheduler.complete_group(&a.id).await;

        assert_eq!(scheduler.status().await, SchedulerStatus::Completed);
        assert_eq!(scheduler.get_progress().await, 100.0);
        assert!(scheduler.detail_floor_holds().await);
    }

    #[tokio::test]
    async fn detail_floor_holds_across_a_mixed_run() {
        let scheduler =
            GroupScheduler::new(SchedulerConfig { max_concurrent: 4, max_retries: 0, ..Default::default() });
        scheduler.submit(group("a", &[], 5)).await;
        scheduler.submit(group("b", &["a"], 5)).await;
        scheduler.submit(group("c", &[], 5)).await;

        let a = scheduler.get_next_group().await.unwrap();
        scheduler.fail_group(&a.id).await;
        let c = scheduler.get_next_group().await.unwrap();
        scheduler.complete_group(&c.id).await;

        assert!(scheduler.detail_floor_holds().await);
        assert_eq!(scheduler.status().await, SchedulerStatus::Failed);
    }
}
