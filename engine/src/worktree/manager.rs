//! Git worktree lifecycle for one issue-bound agent run: create, rebase,
//! auto-commit, validate, remove, and sweep orphans/idle trees.

use std::path::{Path, PathBuf};

use taskstore::{Filter, IndexValue, Store};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::WorktreeConfig;
use crate::domain::{AgentKind, AgentStatistics, AgentStatus, ExecutionContext, WorktreeInfo};

use super::error::WorktreeError;

pub struct WorktreeManager {
    config: WorktreeConfig,
    repo_root: PathBuf,
}

impl WorktreeManager {
    pub fn new(config: WorktreeConfig, repo_root: impl Into<PathBuf>) -> Self {
        Self { config, repo_root: repo_root.into() }
    }

    fn branch_name(&self, issue_number: u64) -> String {
        format!("{}issue-{issue_number}", self.config.branch_prefix)
    }

    fn worktree_path(&self, issue_number: u64) -> PathBuf {
        self.config.base_dir.join(format!("issue-{issue_number}"))
    }

    pub async fn create(&self, store: &mut Store, issue_number: u64, agent_kind: AgentKind) -> Result<WorktreeInfo, WorktreeError> {
        self.create_with_context(store, issue_number, agent_kind, None).await
    }

    /// Like `create`, but when `context` is supplied also materializes
    /// `.agent-context.json` (machine-readable) and `EXECUTION_CONTEXT.md`
    /// (the human-readable plan) at the root of the new worktree.
    pub async fn create_with_context(
        &self,
        store: &mut Store,
        issue_number: u64,
        agent_kind: AgentKind,
        context: Option<&ExecutionContext>,
    ) -> Result<WorktreeInfo, WorktreeError> {
        debug!(issue_number, "WorktreeManager::create: called");
        self.ensure_disk_space().await?;

        tokio::fs::create_dir_all(&self.config.base_dir)
            .await
            .map_err(|e| WorktreeError::CreateFailed(e.to_string()))?;

        let path = self.worktree_path(issue_number);
        let branch = self.branch_name(issue_number);

        let output = Command::new("git")
            .args(["worktree", "add", path.to_str().unwrap(), "-b", &branch, "HEAD"])
            .current_dir(&self.repo_root)
            .output()
            .await
            .map_err(|e| WorktreeError::GitError(e.to_string()))?;

        if !output.status.success() {
            return Err(WorktreeError::CreateFailed(String::from_utf8_lossy(&output.stderr).to_string()));
        }

        info!(issue_number, ?path, %branch, "worktree created");

        if let Some(ctx) = context {
            self.write_execution_context(&path, ctx).await?;
        }

        let info = WorktreeInfo::new(issue_number, path.to_string_lossy().to_string(), branch, agent_kind);
        store.create(info.clone())?;
        Ok(info)
    }

    async fn write_execution_context(&self, path: &Path, context: &ExecutionContext) -> Result<(), WorktreeError> {
        let json = serde_json::to_vec_pretty(context).map_err(|e| WorktreeError::CreateFailed(e.to_string()))?;
        tokio::fs::write(path.join(".agent-context.json"), json)
            .await
            .map_err(|e| WorktreeError::CreateFailed(e.to_string()))?;
        tokio::fs::write(path.join("EXECUTION_CONTEXT.md"), context.render_plan_markdown())
            .await
            .map_err(|e| WorktreeError::CreateFailed(e.to_string()))?;
        Ok(())
    }

    pub async fn remove(&self, store: &mut Store, issue_number: u64) -> Result<(), WorktreeError> {
        debug!(issue_number, "WorktreeManager::remove: called");
        let path = self.worktree_path(issue_number);

        if path.exists() {
            let output = Command::new("git")
                .args(["worktree", "remove", path.to_str().unwrap(), "--force"])
                .current_dir(&self.repo_root)
                .output()
                .await
                .map_err(|e| WorktreeError::GitError(e.to_string()))?;

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.contains("is not a working tree") {
                    return Err(WorktreeError::RemoveFailed(stderr.to_string()));
                }
            }
        } else {
            warn!(issue_number, "worktree already absent, skipping removal");
        }

        let branch = self.branch_name(issue_number);
        let _ = Command::new("git").args(["branch", "-D", &branch]).current_dir(&self.repo_root).output().await;

        let _ = store.delete::<WorktreeInfo>(&issue_number.to_string());
        info!(issue_number, "worktree removed");
        Ok(())
    }

    pub async fn rebase(&self, issue_number: u64, base_branch: &str) -> Result<(), WorktreeError> {
        let path = self.worktree_path(issue_number);
        if !path.exists() {
            return Err(WorktreeError::NotFound(issue_number));
        }

        self.auto_commit(&path, "wip: before rebase").await?;

        let output = Command::new("git")
            .args(["rebase", base_branch])
            .current_dir(&path)
            .output()
            .await
            .map_err(|e| WorktreeError::GitError(e.to_string()))?;

        if !output.status.success() {
            let _ = Command::new("git").args(["rebase", "--abort"]).current_dir(&path).output().await;
            return Err(WorktreeError::RebaseConflict(issue_number.to_string()));
        }

        Ok(())
    }

    pub async fn auto_commit(&self, worktree_path: &Path, message: &str) -> Result<(), WorktreeError> {
        let status = Command::new("git")
            .args(["status", "--porcelain"])
            .current_dir(worktree_path)
            .output()
            .await
            .map_err(|e| WorktreeError::GitError(e.to_string()))?;

        if status.stdout.is_empty() {
            return Ok(());
        }

        let _ = Command::new("git").args(["add", "-A"]).current_dir(worktree_path).output().await;
        let _ = Command::new("git")
            .args(["commit", "-m", message, "--allow-empty"])
            .current_dir(worktree_path)
            .output()
            .await;
        Ok(())
    }

    pub async fn validate(&self, issue_number: u64) -> Result<(), WorktreeError> {
        let path = self.worktree_path(issue_number);
        if !path.exists() {
            return Err(WorktreeError::NotFound(issue_number));
        }

        let output = Command::new("git")
            .args(["status"])
            .current_dir(&path)
            .output()
            .await
            .map_err(|e| WorktreeError::GitError(e.to_string()))?;

        if !output.status.success() {
            return Err(WorktreeError::Corrupted(issue_number));
        }
        Ok(())
    }

    pub fn exists(&self, issue_number: u64) -> bool {
        self.worktree_path(issue_number).exists()
    }

    async fn ensure_disk_space(&self) -> Result<(), WorktreeError> {
        let available_gb = self.check_disk_space().await?;
        if available_gb < self.config.min_disk_space_gb {
            return Err(WorktreeError::DiskSpace(format!(
                "only {available_gb}GB available, need {}GB minimum",
                self.config.min_disk_space_gb
            )));
        }
        Ok(())
    }

    async fn check_disk_space(&self) -> Result<u32, WorktreeError> {
        let output = Command::new("df")
            .args(["-BG", self.config.base_dir.to_str().unwrap_or("/tmp")])
            .output()
            .await
            .map_err(|e| WorktreeError::DiskSpace(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        for line in stdout.lines().skip(1) {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 4
                && let Ok(gb) = parts[3].trim_end_matches('G').parse::<u32>()
            {
                return Ok(gb);
            }
        }
        Ok(100)
    }

    /// Remove worktrees whose issue number is absent from `active_issue_numbers`.
    pub async fn cleanup_orphaned(&self, store: &mut Store, active_issue_numbers: &[u64]) -> Result<usize, WorktreeError> {
        let worktrees: Vec<WorktreeInfo> = store.list(&[])?;
        let mut cleaned = 0;
        for wt in worktrees {
            if !active_issue_numbers.contains(&wt.issue_number) {
                info!(issue_number = wt.issue_number, "cleaning up orphaned worktree");
                self.remove(store, wt.issue_number).await?;
                cleaned += 1;
            }
        }
        Ok(cleaned)
    }

    /// Remove worktrees whose agent has been idle longer than `max_idle_ms`.
    pub async fn sweep_idle(&self, store: &mut Store, max_idle_ms: i64) -> Result<usize, WorktreeError> {
        let worktrees: Vec<WorktreeInfo> = store.list(&[Filter::eq("agent_status", IndexValue::String(AgentStatus::Idle.to_string()))])?;
        let mut swept = 0;
        for wt in worktrees {
            if wt.is_idle_longer_than(max_idle_ms) {
                self.remove(store, wt.issue_number).await?;
                swept += 1;
            }
        }
        Ok(swept)
    }

    pub fn get_agent_statistics(&self, store: &Store) -> Result<AgentStatistics, WorktreeError> {
        let worktrees: Vec<WorktreeInfo> = store.list(&[])?;
        Ok(AgentStatistics::from_worktrees(&worktrees))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn setup_git_repo(dir: &Path) {
        Command::new("git").args(["init"]).current_dir(dir).output().await.unwrap();
        Command::new("git").args(["config", "user.email", "test@test.com"]).current_dir(dir).output().await.unwrap();
        Command::new("git").args(["config", "user.name", "Test"]).current_dir(dir).output().await.unwrap();
        Command::new("git").args(["commit", "--allow-empty", "-m", "initial"]).current_dir(dir).output().await.unwrap();
    }

    #[tokio::test]
    async fn create_then_remove_round_trips() {
        let repo_dir = tempdir().unwrap();
        let worktree_dir = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        setup_git_repo(repo_dir.path()).await;

        let config = WorktreeConfig {
            base_dir: worktree_dir.path().to_path_buf(),
            min_disk_space_gb: 1,
            branch_prefix: "agent/".to_string(),
            max_idle_ms: 1_000,
        };
        let manager = WorktreeManager::new(config, repo_dir.path());
        let mut store = Store::open(store_dir.path()).unwrap();

        let info = manager.create(&mut store, 42, AgentKind::CodeGen).await.unwrap();
        assert!(Path::new(&info.path).exists());
        manager.validate(42).await.unwrap();

        manager.remove(&mut store, 42).await.unwrap();
        assert!(!Path::new(&info.path).exists());
        assert!(store.get::<WorktreeInfo>("42").unwrap().is_none());
    }

    #[tokio::test]
    async fn create_with_context_writes_the_agent_context_files() {
        use crate::domain::{Task, WorkItem};

        let repo_dir = tempdir().unwrap();
        let worktree_dir = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        setup_git_repo(repo_dir.path()).await;

        let config = WorktreeConfig {
            base_dir: worktree_dir.path().to_path_buf(),
            min_disk_space_gb: 1,
            branch_prefix: "agent/".to_string(),
            max_idle_ms: 1_000,
        };
        let manager = WorktreeManager::new(config, repo_dir.path());
        let mut store = Store::open(store_dir.path()).unwrap();

        let task = Task::new("Fix crash on empty input", "bug", AgentKind::CodeGen);
        let work_item = WorkItem {
            owner: "acme".into(),
            repo: "widgets".into(),
            number: 7,
            title: "Crash on empty input".into(),
            body: String::new(),
            open: true,
            labels: Vec::new(),
            assignee: None,
            created_at: 0,
            updated_at: 0,
            url: "https://example.invalid/acme/widgets/issues/7".into(),
        };
        let ctx = crate::domain::ExecutionContext::new(task, work_item, "Write a fix.".into());

        let info = manager.create_with_context(&mut store, 7, AgentKind::CodeGen, Some(&ctx)).await.unwrap();
        let root = Path::new(&info.path);
        assert!(root.join(".agent-context.json").exists());
        let plan = tokio::fs::read_to_string(root.join("EXECUTION_CONTEXT.md")).await.unwrap();
        assert!(plan.contains("acme/widgets#7"));
    }

    #[tokio::test]
    async fn validate_missing_worktree_is_not_found() {
        let repo_dir = tempdir().unwrap();
        let worktree_dir = tempdir().unwrap();
        let config = WorktreeConfig {
            base_dir: worktree_dir.path().to_path_buf(),
            min_disk_space_gb: 1,
            branch_prefix: "agent/".to_string(),
            max_idle_ms: 1_000,
        };
        let manager = WorktreeManager::new(config, repo_dir.path());
        assert!(matches!(manager.validate(999).await, Err(WorktreeError::NotFound(999))));
    }

    #[tokio::test]
    async fn cleanup_orphaned_removes_inactive_worktrees() {
        let repo_dir = tempdir().unwrap();
        let worktree_dir = tempdir().unwrap();
        let store_dir = tempdir().unwrap();
        setup_git_repo(repo_dir.path()).await;

        let config = WorktreeConfig {
            base_dir: worktree_dir.path().to_path_buf(),
            min_disk_space_gb: 1,
            branch_prefix: "agent/".to_string(),
            max_idle_ms: 1_000,
        };
        let manager = WorktreeManager::new(config, repo_dir.path());
        let mut store = Store::open(store_dir.path()).unwrap();

        manager.create(&mut store, 1, AgentKind::CodeGen).await.unwrap();
        manager.create(&mut store, 2, AgentKind::CodeGen).await.unwrap();

        let cleaned = manager.cleanup_orphaned(&mut store, &[2]).await.unwrap();
        assert_eq!(cleaned, 1);
        assert!(!manager.exists(1));
        assert!(manager.exists(2));
    }
}
