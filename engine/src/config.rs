//! Coordinator configuration: layered resolution over CLI flags, process
//! environment, project config file, user config file and defaults.

use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub platform: PlatformConfig,
    pub llm: LlmConfig,
    pub concurrency: ConcurrencyConfig,
    pub worktree: WorktreeConfig,
    pub storage: StorageConfig,
    pub supervisor: SupervisorConfig,
}

impl Config {
    /// Resolution order: explicit `--config` path, then `.devcoord.yml` in
    /// the project root, then `~/.config/devcoord/devcoord.yml`, then
    /// built-in defaults. Environment variables override file values for
    /// the handful of keys that carry secrets or runtime mode flags; see
    /// `Credentials` and `apply_env_overrides`.
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::load_from_file(path).context(format!("failed to load config from {}", path.display()))?
        } else if PathBuf::from(".devcoord.yml").exists() {
            match Self::load_from_file(Path::new(".devcoord.yml")) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("failed to load .devcoord.yml: {e}");
                    Self::default()
                }
            }
        } else if let Some(user_config) = dirs::config_dir().map(|d| d.join("devcoord").join("devcoord.yml")).filter(|p| p.exists()) {
            match Self::load_from_file(&user_config) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("failed to load {}: {e}", user_config.display());
                    Self::default()
                }
            }
        } else {
            tracing::info!("no config file found, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("failed to read config file")?;
        let config: Self = serde_yaml::from_str(&content).context("failed to parse config file")?;
        tracing::info!("loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(model) = std::env::var("DEVCOORD_LLM_MODEL") {
            self.llm.model = model;
        }
        if let Ok(value) = std::env::var("DEVCOORD_MAX_CONCURRENCY")
            && let Ok(max) = value.parse()
        {
            self.concurrency.max_concurrency_override = Some(max);
        }
    }

    /// `min(cpuCount - 1, floor(freeMemoryGB / 2), 8)`, floored at 1.
    pub fn resolved_max_concurrency(&self, cpu_count: usize, free_memory_gb: f64) -> usize {
        if let Some(override_value) = self.concurrency.max_concurrency_override {
            return override_value.max(1);
        }
        let by_cpu = cpu_count.saturating_sub(1);
        let by_memory = (free_memory_gb / 2.0).floor().max(0.0) as usize;
        by_cpu.min(by_memory).min(8).max(1)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub base_url: String,
    pub timeout_ms: u64,
    pub token_env: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.github.com".to_string(),
            timeout_ms: 30_000,
            token_env: "PLATFORM_TOKEN".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "LLM_API_KEY".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 16384,
            timeout_ms: 300_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    pub max_concurrency_override: Option<usize>,
    pub max_api_calls_per_minute: u32,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrency_override: None,
            max_api_calls_per_minute: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorktreeConfig {
    pub base_dir: PathBuf,
    pub min_disk_space_gb: u32,
    pub branch_prefix: String,
    pub max_idle_ms: i64,
}

impl Default for WorktreeConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("/tmp/devcoord/worktrees"),
            min_disk_space_gb: 2,
            branch_prefix: "agent/".to_string(),
            max_idle_ms: 3_600_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub home_dir: PathBuf,
    pub jsonl_warn_mb: u32,
    pub jsonl_error_mb: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            home_dir: PathBuf::from(".devcoord"),
            jsonl_warn_mb: 100,
            jsonl_error_mb: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    pub dry_run: bool,
    pub min_quality_score: u8,
    pub session_timeout_ms: u64,
    pub poll_interval_ms: u64,
    /// Wall-clock bound on one supervisor run; 0 means unbounded.
    pub max_duration_minutes: u64,
    /// When no item yields an executable decision, scan the repo tree
    /// for TODO/FIXME/HACK/NOTE markers and synthesize an `Issue`
    /// decision from the top batch.
    pub scan_todos: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            min_quality_score: 80,
            session_timeout_ms: 1_800_000,
            poll_interval_ms: 60_000,
            max_duration_minutes: 0,
            scan_todos: true,
        }
    }
}
