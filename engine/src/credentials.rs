//! Secret resolution for the platform token and the LLM API key.
//!
//! Resolution order: CLI flag, then the environment variable named in
//! config, then the on-disk credential file (`0600`), then absence
//! (mapped to `CoreError::Auth` at the call site that actually needs
//! the secret — a supervisor cycle with no pending agent dispatch never
//! needs the LLM key, so absence is not eagerly fatal).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::errors::CoreError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CredentialFile {
    platform_token: Option<String>,
    llm_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub platform_token: Option<String>,
    pub llm_api_key: Option<String>,
}

impl Credentials {
    pub fn resolve(config: &Config, cli_platform_token: Option<String>, cli_llm_api_key: Option<String>) -> Self {
        let file = Self::load_file().unwrap_or_default();

        let platform_token = cli_platform_token
            .or_else(|| std::env::var(&config.platform.token_env).ok())
            .or(file.platform_token);
        let llm_api_key = cli_llm_api_key
            .or_else(|| std::env::var(&config.llm.api_key_env).ok())
            .or(file.llm_api_key);
        Self { platform_token, llm_api_key }
    }

    /// `~/.devcoord/credentials.json`, matching `StorageConfig::home_dir`'s
    /// naming. Missing or unparseable files resolve to "no credentials
    /// here" rather than an error; a corrupt file should not block a run
    /// that supplies secrets another way.
    fn credentials_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".devcoord").join("credentials.json"))
    }

    fn load_file() -> Option<CredentialFile> {
        let path = Self::credentials_path()?;
        let body = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&body) {
            Ok(file) => Some(file),
            Err(e) => {
                tracing::warn!("failed to parse {}: {e}", path.display());
                None
            }
        }
    }

    /// Persist both secrets to the on-disk credential file with owner-only
    /// permissions, for the `devcoord login`-style flow that writes a
    /// device-flow token once it is obtained.
    pub fn save_file(platform_token: Option<&str>, llm_api_key: Option<&str>) -> Result<PathBuf, CoreError> {
        let path = Self::credentials_path().ok_or_else(|| CoreError::Internal("no home directory".into()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = CredentialFile { platform_token: platform_token.map(str::to_string), llm_api_key: llm_api_key.map(str::to_string) };
        let body = serde_json::to_vec_pretty(&file).map_err(|e| CoreError::Internal(e.to_string()))?;
        std::fs::write(&path, body)?;
        set_owner_only(&path)?;
        Ok(path)
    }

    pub fn require_platform_token(&self) -> Result<&str, CoreError> {
        self.platform_token
            .as_deref()
            .ok_or_else(|| CoreError::Auth("platform token not set; pass --platform-token, set the configured env var, or run the login flow".into()))
    }

    pub fn require_llm_api_key(&self) -> Result<&str, CoreError> {
        self.llm_api_key
            .as_deref()
            .ok_or_else(|| CoreError::Auth("LLM API key not set; pass --llm-api-key, set the configured env var, or run the login flow".into()))
    }
}

#[cfg(unix)]
fn set_owner_only(path: &std::path::Path) -> Result<(), CoreError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only(_path: &std::path::Path) -> Result<(), CoreError> {
    Ok(())
}
