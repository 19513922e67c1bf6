use std::time::{Duration, Instant};

/// A `TaskGroup` waiting for (or holding) a concurrency slot.
#[derive(Debug, Clone)]
pub struct ScheduledGroup {
    pub group_id: String,
    pub priority: i32,
    pub submitted_at: Instant,
    pub started_at: Option<Instant>,
}

impl ScheduledGroup {
    pub fn new(group_id: impl Into<String>, priority: i32) -> Self {
        Self {
            group_id: group_id.into(),
            priority,
            submitted_at: Instant::now(),
            started_at: None,
        }
    }
}

impl Eq for ScheduledGroup {}

impl PartialEq for ScheduledGroup {
    fn eq(&self, other: &Self) -> bool {
        self.group_id == other.group_id
    }
}

impl Ord for ScheduledGroup {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Lower priority value sorts first (spec.md convention: lower
        // means more urgent); `BinaryHeap` is a max-heap so the
        // comparison is inverted, then ties break FIFO on submission.
        other.priority.cmp(&self.priority).then_with(|| other.submitted_at.cmp(&self.submitted_at))
    }
}

impl PartialOrd for ScheduledGroup {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Debug, Clone)]
pub enum ScheduleResult {
    Ready,
    Queued { position: usize, estimated_wait: Duration },
    RateLimited { retry_after: Duration },
    Rejected { reason: String },
}

#[derive(Debug, Default, Clone)]
pub struct SchedulerStats {
    pub total_scheduled: u64,
    pub total_completed: u64,
    pub total_failed: u64,
    pub total_rate_limited: u64,
    pub total_wait_time_ms: u64,
    pub peak_queue_depth: usize,
    pub peak_concurrent: usize,
}

#[derive(Debug, Clone)]
pub struct QueueState {
    pub running: usize,
    pub queued: usize,
    pub blocked: usize,
    pub rate_limited: bool,
    pub stats: SchedulerStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_priority_value_sorts_ahead_in_the_heap() {
        let urgent = ScheduledGroup::new("urgent", 1);
        std::thread::sleep(std::time::Duration::from_millis(1));
        let normal = ScheduledGroup::new("normal", 5);
        assert!(urgent > normal);
    }

    #[test]
    fn equal_priority_breaks_ties_by_submission_order() {
        let first = ScheduledGroup::new("first", 5);
        std::thread::sleep(std::time::Duration::from_millis(1));
        let second = ScheduledGroup::new("second", 5);
        assert!(first > second);
    }
}
