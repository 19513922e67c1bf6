use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_max_requests_per_window")]
    pub max_requests_per_window: u32,

    #[serde(default = "default_rate_window_secs")]
    pub rate_window_secs: u64,

    /// Retry budget per group before it is marked `failed` and its
    /// transitive dependents are poisoned. Scenario in spec.md §8 #5
    /// exercises the default of 1 (one retry, then give up).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_max_concurrent() -> usize {
    4
}

fn default_max_requests_per_window() -> u32 {
    60
}

fn default_rate_window_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    1
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            max_requests_per_window: default_max_requests_per_window(),
            rate_window_secs: default_rate_window_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl SchedulerConfig {
    pub fn rate_window(&self) -> Duration {
        Duration::from_secs(self.rate_window_secs)
    }
}
