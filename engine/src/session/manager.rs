use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use taskstore::Store;
use tracing::{info, warn};

use crate::domain::{Session, SessionStatus, Task, TaskGroup, TaskResult};

use super::error::SessionError;

/// A capability that can execute one `Task` inside a worktree. Supplied
/// by the agent dispatcher; kept as a trait here so the session manager
/// has no compile-time dependency on any particular agent kind.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &Task, worktree_path: &Path) -> Result<TaskResult, String>;
}

pub struct SessionManager {
    session_timeout_ms: u64,
    max_concurrent_sessions: usize,
    running: AtomicUsize,
}

impl SessionManager {
    pub fn new(session_timeout_ms: u64) -> Self {
        Self::with_max_concurrent_sessions(session_timeout_ms, usize::MAX)
    }

    pub fn with_max_concurrent_sessions(session_timeout_ms: u64, max_concurrent_sessions: usize) -> Self {
        Self { session_timeout_ms, max_concurrent_sessions, running: AtomicUsize::new(0) }
    }

    pub fn running_count(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Open a session binding `group` to `worktree_path` and persist it
    /// as `initializing`. Rejected with `SessionError::AtCapacity` if
    /// `maxConcurrentSessions` sessions are already running; the caller
    /// is expected to retry once a slot frees up via `run`'s completion.
    pub fn start(&self, store: &mut Store, group: &TaskGroup, worktree_path: impl Into<String>) -> Result<Session, SessionError> {
        let reserved = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        if reserved > self.max_concurrent_sessions {
            self.running.fetch_sub(1, Ordering::SeqCst);
            return Err(SessionError::AtCapacity { running: reserved - 1, max: self.max_concurrent_sessions });
        }

        let mut session = Session::new(group.id.clone(), worktree_path);
        if let Err(e) = store.create(session.clone()) {
            self.running.fetch_sub(1, Ordering::SeqCst);
            return Err(e.into());
        }
        session.mark_running();
        store.update(session.clone())?;
        info!(session_id = %session.id, group_id = %group.id, "session started");
        Ok(session)
    }

    /// Run every task in `tasks` sequentially against `executor`, bounded
    /// by the configured session timeout. The session is persisted as
    /// `completed`, `failed` or `timeout` on exit; no transition leaves a
    /// terminal state.
    pub async fn run(
        &self,
        store: &mut Store,
        mut session: Session,
        tasks: &[Task],
        worktree_path: &Path,
        executor: &dyn TaskExecutor,
    ) -> Result<Session, SessionError> {
        let timeout = Duration::from_millis(self.session_timeout_ms);
        match tokio::time::timeout(timeout, self.run_tasks(tasks, worktree_path, executor)).await {
            Ok(Ok(results)) => {
                session.complete(results);
            }
            Ok(Err((results, failure))) => {
                session.task_results = results;
                session.fail(failure);
            }
            Err(_) => {
                warn!(session_id = %session.id, "session exceeded timeout, marking timed out");
                session.timeout();
            }
        }
        self.running.fetch_sub(1, Ordering::SeqCst);
        store.update(session.clone())?;
        Ok(session)
    }

    async fn run_tasks(
        &self,
        tasks: &[Task],
        worktree_path: &Path,
        executor: &dyn TaskExecutor,
    ) -> Result<Vec<TaskResult>, (Vec<TaskResult>, String)> {
        let mut results = Vec::with_capacity(tasks.len());
        for task in tasks {
            match executor.execute(task, worktree_path).await {
                Ok(result) => {
                    let success = result.success;
                    results.push(result);
                    if !success {
                        return Err((results, format!("task {} reported failure", task.id)));
                    }
                }
                Err(message) => {
                    results.push(TaskResult { task_id: task.id.clone(), success: false, message: message.clone() });
                    return Err((results, message));
                }
            }
        }
        Ok(results)
    }

    pub fn is_timed_out(&self, session: &Session) -> bool {
        !session.status.is_terminal() && session.elapsed_ms() as u64 >= self.session_timeout_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AgentKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct AlwaysSucceeds(Arc<AtomicUsize>);

    #[async_trait]
    impl TaskExecutor for AlwaysSucceeds {
        async fn execute(&self, task: &Task, _worktree_path: &Path) -> Result<TaskResult, String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(TaskResult { task_id: task.id.clone(), success: true, message: "ok".into() })
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl TaskExecutor for AlwaysFails {
        async fn execute(&self, task: &Task, _worktree_path: &Path) -> Result<TaskResult, String> {
            Ok(TaskResult { task_id: task.id.clone(), success: false, message: "boom".into() })
        }
    }

    struct NeverReturns;

    #[async_trait]
    impl TaskExecutor for NeverReturns {
        async fn execute(&self, _task: &Task, _worktree_path: &Path) -> Result<TaskResult, String> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!()
        }
    }

    fn store(dir: &tempfile::TempDir) -> Store {
        Store::open(dir.path()).unwrap()
    }

    fn group() -> TaskGroup {
        TaskGroup::new(AgentKind::CodeGen, vec!["t1".into()], 0, 5)
    }

    #[tokio::test]
    async fn successful_run_marks_session_completed() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store(&dir);
        let manager = SessionManager::new(60_000);
        let g = group();
        let session = manager.start(&mut s, &g, "/tmp/wt-1").unwrap();

        let tasks = vec![Task::new("do thing", "feature", AgentKind::CodeGen)];
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = AlwaysSucceeds(counter.clone());
        let finished = manager.run(&mut s, session, &tasks, Path::new("/tmp/wt-1"), &executor).await.unwrap();

        assert_eq!(finished.status, SessionStatus::Completed);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_task_marks_session_failed() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store(&dir);
        let manager = SessionManager::new(60_000);
        let g = group();
        let session = manager.start(&mut s, &g, "/tmp/wt-1").unwrap();

        let tasks = vec![Task::new("do thing", "feature", AgentKind::CodeGen)];
        let finished = manager.run(&mut s, session, &tasks, Path::new("/tmp/wt-1"), &AlwaysFails).await.unwrap();

        assert_eq!(finished.status, SessionStatus::Failed);
    }

    #[tokio::test]
    async fn hung_task_marks_session_timed_out() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store(&dir);
        let manager = SessionManager::new(20);
        let g = group();
        let session = manager.start(&mut s, &g, "/tmp/wt-1").unwrap();

        let tasks = vec![Task::new("do thing", "feature", AgentKind::CodeGen)];
        let finished = manager.run(&mut s, session, &tasks, Path::new("/tmp/wt-1"), &NeverReturns).await.unwrap();

        assert_eq!(finished.status, SessionStatus::Timeout);
    }

    #[tokio::test]
    async fn rejects_a_new_session_once_at_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = store(&dir);
        let manager = SessionManager::with_max_concurrent_sessions(60_000, 1);
        let g = group();
        let first = manager.start(&mut s, &g, "/tmp/wt-1").unwrap();
        assert_eq!(manager.running_count(), 1);

        let second = manager.start(&mut s, &g, "/tmp/wt-2");
        assert!(matches!(second, Err(SessionError::AtCapacity { running: 1, max: 1 })));

        let tasks = vec![Task::new("do thing", "feature", AgentKind::CodeGen)];
        let counter = Arc::new(AtomicUsize::new(0));
        let executor = AlwaysSucceeds(counter.clone());
        manager.run(&mut s, first, &tasks, Path::new("/tmp/wt-1"), &executor).await.unwrap();
        assert_eq!(manager.running_count(), 0);

        assert!(manager.start(&mut s, &g, "/tmp/wt-3").is_ok());
    }
}
