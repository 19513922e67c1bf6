use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use crate::config::PlatformConfig;
use crate::domain::WorkItem;

use super::cache::TtlCache;
use super::error::GatewayError;
use super::types::{Comment, IssueDraft, LabelPatch, Milestone, PullRequest, PullRequestDraft, PullRequestPage, RateLimitStatus, WorkItemPage};

const RETRY_INITIAL: Duration = Duration::from_secs(1);
const RETRY_FACTOR: u32 = 2;
const RETRY_CAP: Duration = Duration::from_secs(10);
const RETRY_MAX_ATTEMPTS: u32 = 3;
const CACHE_CAPACITY: usize = 500;
const CACHE_TTL: Duration = Duration::from_secs(300);

/// The coordinator's sole collaborator surface onto the code-hosting
/// platform. Every read goes through the TTL cache; every write
/// invalidates the relevant cache entries.
#[async_trait]
pub trait PlatformGateway: Send + Sync {
    async fn get_work_item(&self, owner: &str, repo: &str, number: u64) -> Result<WorkItem, GatewayError>;
    async fn list_work_items(&self, owner: &str, repo: &str, page: u32) -> Result<WorkItemPage, GatewayError>;
    async fn patch_labels(&self, owner: &str, repo: &str, number: u64, patch: LabelPatch) -> Result<(), GatewayError>;
    async fn post_comment(&self, owner: &str, repo: &str, number: u64, comment: Comment) -> Result<(), GatewayError>;
    async fn create_issue(&self, owner: &str, repo: &str, draft: IssueDraft) -> Result<WorkItem, GatewayError>;
    async fn list_pull_requests(&self, owner: &str, repo: &str, page: u32) -> Result<PullRequestPage, GatewayError>;
    async fn list_pr_files(&self, owner: &str, repo: &str, number: u64) -> Result<Vec<String>, GatewayError>;
    async fn create_pull_request(&self, owner: &str, repo: &str, draft: PullRequestDraft) -> Result<PullRequest, GatewayError>;
    async fn create_milestone(&self, owner: &str, repo: &str, title: &str) -> Result<Milestone, GatewayError>;
    async fn rate_limit_status(&self) -> Result<RateLimitStatus, GatewayError>;
}

pub struct HttpPlatformGateway {
    http: Client,
    base_url: String,
    token: String,
    cache: Mutex<TtlCache<WorkItem>>,
}

impl HttpPlatformGateway {
    pub fn from_config(config: &PlatformConfig, token: String) -> Result<Self, GatewayError> {
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            token,
            cache: Mutex::new(TtlCache::new(CACHE_CAPACITY, CACHE_TTL)),
        })
    }

    fn cache_key(owner: &str, repo: &str, number: u64) -> String {
        format!("{owner}/{repo}#{number}")
    }

    /// Run `op` with exponential backoff: 1s, 2s, 4s... capped at 10s,
    /// up to `RETRY_MAX_ATTEMPTS` attempts. Only retryable errors are
    /// retried; everything else returns immediately.
    async fn with_retry<T, F, Fut>(&self, op: F) -> Result<T, GatewayError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, GatewayError>>,
    {
        let mut delay = RETRY_INITIAL;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < RETRY_MAX_ATTEMPTS => {
                    let sleep_for = err.retry_after().unwrap_or(delay).min(RETRY_CAP.max(delay));
                    warn!(attempt, ?sleep_for, "platform gateway request failed, retrying");
                    tokio::time::sleep(sleep_for).await;
                    delay = (delay * RETRY_FACTOR).min(RETRY_CAP);
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn fetch_work_item(&self, owner: &str, repo: &str, number: u64) -> Result<WorkItem, GatewayError> {
        let url = format!("{}/repos/{owner}/{repo}/issues/{number}", self.base_url);
        let response = self.http.get(&url).bearer_auth(&self.token).send().await?;

        if response.status().as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(GatewayError::RateLimited { retry_after: Duration::from_secs(retry_after) });
        }
        if response.status().as_u16() == 404 {
            return Err(GatewayError::NotFound(format!("{owner}/{repo}#{number}")));
        }
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(GatewayError::ApiError { status, message });
        }

        Ok(response.json::<WorkItem>().await?)
    }
}

#[async_trait]
impl PlatformGateway for HttpPlatformGateway {
    async fn get_work_item(&self, owner: &str, repo: &str, number: u64) -> Result<WorkItem, GatewayError> {
        let key = Self::cache_key(owner, repo, number);
        if let Some(hit) = self.cache.lock().unwrap().get(&key) {
            debug!(%key, "get_work_item: cache hit");
            return Ok(hit);
        }

        let item = self.with_retry(|| self.fetch_work_item(owner, repo, number)).await?;
        self.cache.lock().unwrap().put(key, item.clone());
        Ok(item)
    }

    async fn list_work_items(&self, owner: &str, repo: &str, page: u32) -> Result<WorkItemPage, GatewayError> {
        let url = format!("{}/repos/{owner}/{repo}/issues?page={page}", self.base_url);
        let items: Vec<WorkItem> = self
            .with_retry(|| async {
                let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let message = response.text().await.unwrap_or_default();
                    return Err(GatewayError::ApiError { status, message });
                }
                Ok(response.json::<Vec<WorkItem>>().await?)
            })
            .await?;
        let next_page = if items.is_empty() { None } else { Some(page + 1) };
        Ok(WorkItemPage { items, next_page })
    }

    async fn patch_labels(&self, owner: &str, repo: &str, number: u64, patch: LabelPatch) -> Result<(), GatewayError> {
        let url = format!("{}/repos/{owner}/{repo}/issues/{number}/labels", self.base_url);
        self.with_retry(|| async {
            let response = self.http.patch(&url).bearer_auth(&self.token).json(&patch).send().await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                return Err(GatewayError::ApiError { status, message });
            }
            Ok(())
        })
        .await?;
        self.cache.lock().unwrap().invalidate(&Self::cache_key(owner, repo, number));
        Ok(())
    }

    async fn post_comment(&self, owner: &str, repo: &str, number: u64, comment: Comment) -> Result<(), GatewayError> {
        let url = format!("{}/repos/{owner}/{repo}/issues/{number}/comments", self.base_url);
        self.with_retry(|| async {
            let response = self.http.post(&url).bearer_auth(&self.token).json(&comment).send().await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                return Err(GatewayError::ApiError { status, message });
            }
            Ok(())
        })
        .await
    }

    async fn create_issue(&self, owner: &str, repo: &str, draft: IssueDraft) -> Result<WorkItem, GatewayError> {
        let url = format!("{}/repos/{owner}/{repo}/issues", self.base_url);
        self.with_retry(|| async {
            let response = self.http.post(&url).bearer_auth(&self.token).json(&draft).send().await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                return Err(GatewayError::ApiError { status, message });
            }
            Ok(response.json::<WorkItem>().await?)
        })
        .await
    }

    async fn list_pull_requests(&self, owner: &str, repo: &str, page: u32) -> Result<PullRequestPage, GatewayError> {
        let url = format!("{}/repos/{owner}/{repo}/pulls?page={page}", self.base_url);
        let items: Vec<PullRequest> = self
            .with_retry(|| async {
                let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let message = response.text().await.unwrap_or_default();
                    return Err(GatewayError::ApiError { status, message });
                }
                Ok(response.json::<Vec<PullRequest>>().await?)
            })
            .await?;
        let next_page = if items.is_empty() { None } else { Some(page + 1) };
        Ok(PullRequestPage { items, next_page })
    }

    async fn list_pr_files(&self, owner: &str, repo: &str, number: u64) -> Result<Vec<String>, GatewayError> {
        let url = format!("{}/repos/{owner}/{repo}/pulls/{number}/files", self.base_url);
        self.with_retry(|| async {
            let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
            if response.status().as_u16() == 404 {
                return Err(GatewayError::NotFound(format!("{owner}/{repo}#{number}")));
            }
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                return Err(GatewayError::ApiError { status, message });
            }
            Ok(response.json::<Vec<String>>().await?)
        })
        .await
    }

    async fn create_pull_request(&self, owner: &str, repo: &str, draft: PullRequestDraft) -> Result<PullRequest, GatewayError> {
        let url = format!("{}/repos/{owner}/{repo}/pulls", self.base_url);
        self.with_retry(|| async {
            let response = self.http.post(&url).bearer_auth(&self.token).json(&draft).send().await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                return Err(GatewayError::ApiError { status, message });
            }
            Ok(response.json::<PullRequest>().await?)
        })
        .await
    }

    async fn create_milestone(&self, owner: &str, repo: &str, title: &str) -> Result<Milestone, GatewayError> {
        let url = format!("{}/repos/{owner}/{repo}/milestones", self.base_url);
        self.with_retry(|| async {
            let response = self.http.post(&url).bearer_auth(&self.token).json(&serde_json::json!({ "title": title })).send().await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                return Err(GatewayError::ApiError { status, message });
            }
            Ok(response.json::<Milestone>().await?)
        })
        .await
    }

    async fn rate_limit_status(&self) -> Result<RateLimitStatus, GatewayError> {
        let url = format!("{}/rate_limit", self.base_url);
        self.with_retry(|| async {
            let response = self.http.get(&url).bearer_auth(&self.token).send().await?;
            if !response.status().is_success() {
                let status = response.status().as_u16();
                let message = response.text().await.unwrap_or_default();
                return Err(GatewayError::ApiError { status, message });
            }
            Ok(response.json::<RateLimitStatus>().await?)
        })
        .await
    }
}
