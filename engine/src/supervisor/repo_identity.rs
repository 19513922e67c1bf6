//! Resolves `(owner, repo)` from the working directory's VCS remote, the
//! way the worktree manager shells out to `git` for worktree lifecycle.

use std::path::Path;

use tokio::process::Command;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIdentity {
    pub owner: String,
    pub repo: String,
}

impl RepoIdentity {
    /// Reads `git remote get-url origin` in `repo_root` and parses the
    /// `owner/repo` pair out of either the SSH or HTTPS form. `None` when
    /// the directory has no git remote, or the remote URL doesn't parse.
    pub async fn resolve(repo_root: &Path) -> Option<Self> {
        let output = Command::new("git")
            .args(["remote", "get-url", "origin"])
            .current_dir(repo_root)
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let url = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Self::parse_remote_url(&url)
    }

    fn parse_remote_url(url: &str) -> Option<Self> {
        let trimmed = url.strip_suffix(".git").unwrap_or(url);
        let path = trimmed.strip_prefix("git@").and_then(|s| s.split_once(':').map(|(_, p)| p)).or_else(|| {
            trimmed
                .strip_prefix("https://")
                .or_else(|| trimmed.strip_prefix("http://"))
                .and_then(|s| s.split_once('/').map(|(_, p)| p))
        })?;
        let (owner, repo) = path.split_once('/')?;
        if owner.is_empty() || repo.is_empty() {
            return None;
        }
        Some(Self { owner: owner.to_string(), repo: repo.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ssh_remote_urls() {
        let identity = RepoIdentity::parse_remote_url("git@github.com:acme/widgets.git").unwrap();
        assert_eq!(identity.owner, "acme");
        assert_eq!(identity.repo, "widgets");
    }

    #[test]
    fn parses_https_remote_urls() {
        let identity = RepoIdentity::parse_remote_url("https://github.com/acme/widgets.git").unwrap();
        assert_eq!(identity.owner, "acme");
        assert_eq!(identity.repo, "widgets");
    }

    #[test]
    fn rejects_urls_with_no_owner_repo_pair() {
        assert!(RepoIdentity::parse_remote_url("not-a-url").is_none());
    }
}
