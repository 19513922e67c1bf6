//! Telemetry: a structured, append-only event bus. Adapted from the
//! teacher's `coordinator::core::Coordinator` mpsc-actor shape, repurposed
//! from inter-loop messaging to a single drain task that persists every
//! event and feeds the aggregator. The core never blocks on telemetry:
//! `TelemetryHandle::emit` is a non-blocking `try_send`.

mod aggregator;
mod alerts;
mod event;
mod store;

pub use aggregator::{AgentStats, AggregateSnapshot, CostTariff, DurationStats, aggregate};
pub use alerts::{Alert, AlertThresholds, HostSample, check_alerts};
pub use event::{Event, EventKind};
pub use store::EventStore;

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::warn;

const CHANNEL_CAPACITY: usize = 1024;

/// Cheap, cloneable sender half. Every component that emits telemetry
/// holds one; dropping the last handle lets the drain task exit.
#[derive(Clone)]
pub struct TelemetryHandle {
    tx: mpsc::Sender<Event>,
}

impl TelemetryHandle {
    /// Never blocks the caller: a full channel (the drain task stalled,
    /// e.g. on disk I/O) drops the event rather than stalling the control
    /// thread, per spec.md's "the core never blocks on telemetry".
    pub fn emit(&self, event: Event) {
        if let Err(mpsc::error::TrySendError::Full(_)) = self.tx.try_send(event) {
            warn!("telemetry channel full, dropping event");
        }
    }
}

/// Owns the receiving half and the on-disk store; `spawn` consumes it and
/// returns a `TelemetryHandle` plus a `JoinHandle` the caller can await on
/// shutdown to flush in-flight events.
pub struct Telemetry {
    rx: mpsc::Receiver<Event>,
    store: EventStore,
}

impl Telemetry {
    pub fn new(home_dir: impl Into<PathBuf>) -> (TelemetryHandle, Self) {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        (TelemetryHandle { tx }, Self { rx, store: EventStore::new(home_dir) })
    }

    /// Drains events until every `TelemetryHandle` is dropped, persisting
    /// each one. Intended to run as a background task.
    pub async fn run(mut self) {
        while let Some(event) = self.rx.recv().await {
            if let Err(e) = self.store.append(&event).await {
                warn!(error = %e, "telemetry: failed to persist event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emitted_events_are_persisted_once_the_drain_task_runs() {
        let dir = tempfile::tempdir().unwrap();
        let (handle, telemetry) = Telemetry::new(dir.path());
        let store_path = dir.path().to_path_buf();
        let task = tokio::spawn(telemetry.run());

        handle.emit(Event::new("s1", "supervisor", EventKind::SupervisorDecision, serde_json::json!({"ok": true})));
        drop(handle);
        task.await.unwrap();

        let events = EventStore::new(&store_path).read_all().await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::SupervisorDecision);
    }
}
