//! Periodic aggregation over the event stream: per-agent throughput,
//! duration percentiles, error rate, concurrency utilization and an
//! estimated cost, computed from `AgentResult` events.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::event::{Event, EventKind};

/// One `AgentResult` payload fields the aggregator reads. Invocations
/// that never finish contribute nothing; spec.md treats throughput and
/// duration as derived from completed runs only.
#[derive(Debug, Clone, Deserialize)]
struct AgentResultPayload {
    agent_kind: String,
    duration_ms: u64,
    success: bool,
    #[serde(default)]
    tokens_used: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DurationStats {
    pub mean_ms: f64,
    pub median_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentStats {
    pub runs: u64,
    pub failures: u64,
    pub duration: DurationStats,
}

/// Tariff for converting tokens into an estimated dollar cost. Dollars
/// per 1,000 tokens; defaults match the LLM config's documented model.
#[derive(Debug, Clone, Copy)]
pub struct CostTariff {
    pub dollars_per_1k_tokens: f64,
}

impl Default for CostTariff {
    fn default() -> Self {
        Self { dollars_per_1k_tokens: 0.003 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregateSnapshot {
    pub per_agent: HashMap<String, AgentStats>,
    pub throughput_per_minute: f64,
    pub error_rate: f64,
    pub concurrency_utilization: f64,
    pub estimated_cost_usd: f64,
}

/// Computes `percentile` (0-100) of a slice of already-sorted values.
/// Nearest-rank method, matching the simplicity of the teacher's
/// numeric helpers elsewhere in the crate.
fn percentile(sorted: &[u64], percentile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((percentile / 100.0) * sorted.len() as f64).ceil() as usize;
    let index = rank.saturating_sub(1).min(sorted.len() - 1);
    sorted[index] as f64
}

/// Aggregate a window of telemetry events into the published snapshot.
/// `window_minutes` is the span the caller sampled `events` over, used
/// to normalize throughput; `running`/`capacity` describe the
/// scheduler's concurrency at sample time.
pub fn aggregate(events: &[Event], window_minutes: f64, running: usize, capacity: usize, tariff: CostTariff) -> AggregateSnapshot {
    let mut durations: HashMap<String, Vec<u64>> = HashMap::new();
    let mut failures: HashMap<String, u64> = HashMap::new();
    let mut total_runs = 0u64;
    let mut total_failures = 0u64;
    let mut total_tokens = 0u64;

    for event in events {
        if event.kind != EventKind::AgentResult {
            continue;
        }
        let Ok(payload) = serde_json::from_value::<AgentResultPayload>(event.payload.clone()) else {
            continue;
        };
        durations.entry(payload.agent_kind.clone()).or_default().push(payload.duration_ms);
        total_runs += 1;
        total_tokens += payload.tokens_used;
        if !payload.success {
            *failures.entry(payload.agent_kind.clone()).or_default() += 1;
            total_failures += 1;
        }
    }

    let per_agent = durations
        .into_iter()
        .map(|(agent_kind, mut values)| {
            values.sort_unstable();
            let sum: u64 = values.iter().sum();
            let mean_ms = sum as f64 / values.len() as f64;
            let median_ms = percentile(&values, 50.0);
            let p95_ms = percentile(&values, 95.0);
            let p99_ms = percentile(&values, 99.0);
            let runs = values.len() as u64;
            let stats = AgentStats {
                runs,
                failures: failures.get(&agent_kind).copied().unwrap_or(0),
                duration: DurationStats { mean_ms, median_ms, p95_ms, p99_ms },
            };
            (agent_kind, stats)
        })
        .collect();

    let throughput_per_minute = if window_minutes > 0.0 { total_runs as f64 / window_minutes } else { 0.0 };
    let error_rate = if total_runs > 0 { total_failures as f64 / total_runs as f64 } else { 0.0 };
    let concurrency_utilization = if capacity > 0 { running as f64 / capacity as f64 } else { 0.0 };
    let estimated_cost_usd = (total_tokens as f64 / 1000.0) * tariff.dollars_per_1k_tokens;

    AggregateSnapshot { per_agent, throughput_per_minute, error_rate, concurrency_utilization, estimated_cost_usd }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result_event(agent_kind: &str, duration_ms: u64, success: bool) -> Event {
        Event::new(
            "s1",
            format!("dispatcher:{agent_kind}"),
            EventKind::AgentResult,
            serde_json::json!({ "agent_kind": agent_kind, "duration_ms": duration_ms, "success": success, "tokens_used": 100 }),
        )
    }

    #[test]
    fn aggregates_duration_percentiles_per_agent() {
        let events: Vec<Event> = (1..=10).map(|i| result_event("codegen", i * 100, true)).collect();
        let snapshot = aggregate(&events, 1.0, 2, 4, CostTariff::default());
        let stats = &snapshot.per_agent["codegen"];
        assert_eq!(stats.runs, 10);
        assert_eq!(stats.duration.median_ms, 500.0);
        assert_eq!(stats.duration.p95_ms, 900.0);
        assert_eq!(snapshot.concurrency_utilization, 0.5);
    }

    #[test]
    fn error_rate_reflects_failed_runs_across_all_agents() {
        let events = vec![result_event("codegen", 100, true), result_event("review", 200, false)];
        let snapshot = aggregate(&events, 1.0, 0, 4, CostTariff::default());
        assert_eq!(snapshot.error_rate, 0.5);
    }

    #[test]
    fn empty_window_never_divides_by_zero() {
        let snapshot = aggregate(&[], 0.0, 0, 0, CostTariff::default());
        assert_eq!(snapshot.throughput_per_minute, 0.0);
        assert_eq!(snapshot.error_rate, 0.0);
        assert_eq!(snapshot.concurrency_utilization, 0.0);
    }
}
