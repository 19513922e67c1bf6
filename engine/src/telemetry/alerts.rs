//! Threshold-based alerting over an `AggregateSnapshot`. CPU/memory
//! samples are supplied by the caller (the CLI's `status` command reads
//! them from the host) rather than self-sampled here, since nothing else
//! in the crate's dependency stack talks to the OS for that.

use serde::{Deserialize, Serialize};

use super::aggregator::AggregateSnapshot;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    pub max_cpu_percent: f64,
    pub max_mem_percent: f64,
    pub max_failure_rate: f64,
    pub min_throughput_per_minute: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            max_cpu_percent: 90.0,
            max_mem_percent: 85.0,
            max_failure_rate: 0.20,
            min_throughput_per_minute: 5.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Alert {
    HighCpu { percent: f64 },
    HighMemory { percent: f64 },
    HighFailureRate { rate: f64 },
    LowThroughput { per_minute: f64 },
}

/// Host resource samples, optional because nothing in this crate's
/// dependency stack self-samples them (see module doc).
#[derive(Debug, Clone, Copy, Default)]
pub struct HostSample {
    pub cpu_percent: Option<f64>,
    pub mem_percent: Option<f64>,
}

pub fn check_alerts(snapshot: &AggregateSnapshot, host: HostSample, thresholds: AlertThresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(cpu) = host.cpu_percent
        && cpu > thresholds.max_cpu_percent
    {
        alerts.push(Alert::HighCpu { percent: cpu });
    }
    if let Some(mem) = host.mem_percent
        && mem > thresholds.max_mem_percent
    {
        alerts.push(Alert::HighMemory { percent: mem });
    }
    if snapshot.error_rate > thresholds.max_failure_rate {
        alerts.push(Alert::HighFailureRate { rate: snapshot.error_rate });
    }
    // Throughput below the floor is only meaningful once work has
    // started; an idle coordinator with zero runs isn't "underperforming".
    if snapshot.throughput_per_minute > 0.0 && snapshot.throughput_per_minute < thresholds.min_throughput_per_minute {
        alerts.push(Alert::LowThroughput { per_minute: snapshot.throughput_per_minute });
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(error_rate: f64, throughput_per_minute: f64) -> AggregateSnapshot {
        AggregateSnapshot { error_rate, throughput_per_minute, ..Default::default() }
    }

    #[test]
    fn idle_coordinator_does_not_trigger_low_throughput() {
        let alerts = check_alerts(&snapshot(0.0, 0.0), HostSample::default(), AlertThresholds::default());
        assert!(alerts.is_empty());
    }

    #[test]
    fn failure_rate_above_threshold_fires() {
        let alerts = check_alerts(&snapshot(0.5, 10.0), HostSample::default(), AlertThresholds::default());
        assert_eq!(alerts, vec![Alert::HighFailureRate { rate: 0.5 }]);
    }

    #[test]
    fn host_samples_are_only_checked_when_present() {
        let host = HostSample { cpu_percent: Some(95.0), mem_percent: None };
        let alerts = check_alerts(&snapshot(0.0, 10.0), host, AlertThresholds::default());
        assert_eq!(alerts, vec![Alert::HighCpu { percent: 95.0 }]);
    }
}
