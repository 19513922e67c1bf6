use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
    Failed,
}

impl std::fmt::Display for SchedulerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SchedulerStatus::Idle => "idle",
            SchedulerStatus::Running => "running",
            SchedulerStatus::Paused => "paused",
            SchedulerStatus::Completed => "completed",
            SchedulerStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SchedulerCounters {
    pub total: usize,
    pub completed: usize,
    pub running: usize,
    pub waiting: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl SchedulerCounters {
    /// Detail-floor invariant from spec.md 4.6: the counters must always
    /// sum to `total`.
    pub fn is_consistent(&self) -> bool {
        self.completed + self.running + self.waiting + self.failed + self.skipped == self.total
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerState {
    pub status: SchedulerStatus,
    pub max_concurrency: usize,
    pub counters: SchedulerCounters,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
}

impl SchedulerState {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            status: SchedulerStatus::Idle,
            max_concurrency,
            counters: SchedulerCounters::default(),
            start_time: None,
            end_time: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_counters_are_consistent_at_zero() {
        assert!(SchedulerCounters::default().is_consistent());
    }

    #[test]
    fn counters_must_sum_to_total() {
        let counters = SchedulerCounters {
            total: 10,
            completed: 3,
            running: 2,
            waiting: 4,
            failed: 1,
            skipped: 0,
        };
        assert!(counters.is_consistent());
        let bad = SchedulerCounters { total: 10, ..counters };
        let mut bad = bad;
        bad.waiting = 5;
        assert!(!bad.is_consistent());
    }
}
