//! Append-only event log, one JSON object per line, mirroring the
//! teacher's `coordinator::persistence::EventStore` crash-recovery log.

use std::path::PathBuf;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::event::Event;

pub struct EventStore {
    home_dir: PathBuf,
}

impl EventStore {
    pub fn new(home_dir: impl Into<PathBuf>) -> Self {
        Self { home_dir: home_dir.into() }
    }

    fn events_file(&self) -> PathBuf {
        self.home_dir.join("telemetry").join("events.jsonl")
    }

    pub async fn append(&self, event: &Event) -> std::io::Result<()> {
        let path = self.events_file();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(event).unwrap_or_default();
        line.push('\n');

        let mut file = fs::OpenOptions::new().create(true).append(true).open(&path).await?;
        file.write_all(line.as_bytes()).await?;
        debug!(kind = %event.kind, "EventStore::append: event persisted");
        Ok(())
    }

    pub async fn read_all(&self) -> std::io::Result<Vec<Event>> {
        let path = self.events_file();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path).await?;
        Ok(content.lines().filter_map(|line| serde_json::from_str(line).ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::event::EventKind;

    #[tokio::test]
    async fn appended_events_round_trip_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path());
        store.append(&Event::new("s1", "supervisor", EventKind::SupervisorDecision, serde_json::json!({"n": 1}))).await.unwrap();
        store.append(&Event::new("s1", "supervisor", EventKind::SupervisorDecision, serde_json::json!({"n": 2}))).await.unwrap();

        let events = store.read_all().await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].payload["n"], 1);
        assert_eq!(events[1].payload["n"], 2);
    }

    #[tokio::test]
    async fn reading_before_any_write_is_an_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path());
        assert!(store.read_all().await.unwrap().is_empty());
    }
}
