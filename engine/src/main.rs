//! CLI entry point: wires config, credentials, the Platform Gateway, the
//! Agent Dispatcher and the Supervisor together and dispatches the
//! parsed subcommand.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use engine::artifact_store::ArtifactStore;
use engine::cli::{AgentAction, Cli, Command, Envelope};
use engine::config::Config;
use engine::credentials::Credentials;
use engine::dispatcher::{AgentDispatcher, PrAgent};
use engine::domain::{ArtifactKind, ExecutionContext, Task};
use engine::errors::CoreError;
use engine::platform::{HttpPlatformGateway, PlatformGateway};
use engine::supervisor::{RepoIdentity, Supervisor};
use engine::telemetry::Telemetry;

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose || std::env::var("VERBOSE").is_ok())?;

    let config = Config::load(cli.config.as_ref()).context("failed to load configuration")?;
    let credentials = Credentials::resolve(&config, None, None);
    let repo_root = std::env::current_dir().context("failed to read the current directory")?;
    let json = cli.json || std::env::var("JSON").is_ok();

    let exit_code = run(cli.command, config, credentials, repo_root, json).await;
    std::process::exit(exit_code);
}

async fn run(command: Command, config: Config, credentials: Credentials, repo_root: PathBuf, json: bool) -> i32 {
    let result = dispatch(command, &config, &credentials, &repo_root).await;
    match result {
        Ok(value) => {
            if json {
                println!("{}", serde_json::to_string_pretty(&Envelope::success(value)).unwrap_or_default());
            } else {
                println!("{value}");
            }
            0
        }
        Err(err) => {
            if json {
                let envelope = Envelope::<()>::failure(&err, suggestion_for(&err));
                println!("{}", serde_json::to_string_pretty(&envelope).unwrap_or_default());
            } else {
                eprintln!("error: {err}");
            }
            err.exit_code()
        }
    }
}

fn suggestion_for(err: &CoreError) -> Option<String> {
    match err {
        CoreError::PreconditionMissing(msg) if msg.contains("codegen") => Some("run `devcoord agent run codegen` first".to_string()),
        CoreError::Auth(_) => Some("set PLATFORM_TOKEN / LLM_API_KEY or run the login flow".to_string()),
        _ => None,
    }
}

async fn dispatch(command: Command, config: &Config, credentials: &Credentials, repo_root: &PathBuf) -> Result<String, CoreError> {
    match command {
        Command::Status => run_status(config, repo_root).await,
        Command::Agent { action: AgentAction::Run { kind, issue, pr, files, dry_run } } => {
            run_agent(config, credentials, repo_root, kind, issue, pr, files, dry_run).await
        }
        Command::Auto { interval, max_duration, scan_todos, dry_run } => {
            run_auto(config, credentials, repo_root, interval, max_duration, scan_todos, dry_run).await
        }
        Command::Todos { path, create_issues, dry_run } => run_todos(config, credentials, repo_root, path, create_issues, dry_run).await,
    }
}

fn build_gateway(config: &Config, credentials: &Credentials) -> Result<Arc<dyn PlatformGateway>, CoreError> {
    let token = credentials.require_platform_token()?.to_string();
    let gateway = HttpPlatformGateway::from_config(&config.platform, token).map_err(CoreError::from)?;
    Ok(Arc::new(gateway))
}

fn build_dispatcher(config: &Config, credentials: &Credentials, gateway: Arc<dyn PlatformGateway>, artifacts: Arc<ArtifactStore>) -> Result<AgentDispatcher, CoreError> {
    let llm = engine::llm::create_client(&config.llm).map_err(|e| CoreError::Config(e.to_string()))?;
    let _ = credentials;
    let mut dispatcher = AgentDispatcher::new(llm, config.supervisor.min_quality_score);
    dispatcher.register(Arc::new(PrAgent::new(artifacts, gateway, "main")));
    Ok(dispatcher)
}

async fn run_status(config: &Config, repo_root: &PathBuf) -> Result<String, CoreError> {
    let home_dir = &config.storage.home_dir;
    let store = engine::telemetry::EventStore::new(home_dir);
    let events = store.read_all().await?;
    let snapshot = engine::telemetry::aggregate(&events, 60.0, 0, config.resolved_max_concurrency(num_cpus(), 8.0), Default::default());
    let repo = RepoIdentity::resolve(repo_root).await;
    Ok(format!(
        "repo: {}\nevents recorded: {}\nthroughput/min: {:.2}\nerror rate: {:.2}%",
        repo.map(|r| format!("{}/{}", r.owner, r.repo)).unwrap_or_else(|| "(unresolved)".into()),
        events.len(),
        snapshot.throughput_per_minute,
        snapshot.error_rate * 100.0,
    ))
}

fn num_cpus() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
}

#[allow(clippy::too_many_arguments)]
async fn run_agent(
    config: &Config,
    credentials: &Credentials,
    repo_root: &PathBuf,
    kind: engine::domain::AgentKind,
    issue: Option<u64>,
    pr: Option<u64>,
    files: Vec<String>,
    dry_run: bool,
) -> Result<String, CoreError> {
    let issue = issue.ok_or_else(|| CoreError::Validation("agent run requires --issue=<number>".to_string()))?;
    let gateway = build_gateway(config, credentials)?;
    let artifacts = Arc::new(ArtifactStore::new(&config.storage.home_dir));
    let identity = RepoIdentity::resolve(repo_root)
        .await
        .ok_or_else(|| CoreError::Config("could not resolve repo identity from the working directory's VCS remote".into()))?;

    let work_item = gateway.get_work_item(&identity.owner, &identity.repo, issue).await.map_err(CoreError::from)?;

    let mut prompt = format!("{}\n\n{}", work_item.title, work_item.body);
    if let Some(pr_number) = pr {
        let changed = gateway.list_pr_files(&identity.owner, &identity.repo, pr_number).await.map_err(CoreError::from)?;
        prompt.push_str(&format!("\n\nChanged files in PR #{pr_number}:\n{}", changed.join("\n")));
    }
    if !files.is_empty() {
        prompt.push_str(&format!("\n\nRequested files:\n{}", files.join("\n")));
    }

    if dry_run {
        return Ok(format!("dry run: would invoke {kind} for {}/{}#{}", identity.owner, identity.repo, issue));
    }

    let dispatcher = build_dispatcher(config, credentials, gateway, artifacts.clone())?;
    let task = Task::new(work_item.title.clone(), work_item.type_tag().unwrap_or("feature").to_string(), kind);
    let ctx = ExecutionContext::new(task, work_item, prompt);
    let output = dispatcher.dispatch(&ctx).await?;

    if let Some(artifact_kind) = engine::dispatcher::artifact_kind_for(kind) {
        persist(&artifacts, &ctx, artifact_kind, &output)?;
    }

    Ok(output.summary())
}

fn persist(artifacts: &ArtifactStore, ctx: &ExecutionContext, kind: ArtifactKind, output: &engine::dispatcher::AgentOutput) -> Result<(), CoreError> {
    use engine::dispatcher::AgentOutput;
    let owner = &ctx.work_item.owner;
    let repo = &ctx.work_item.repo;
    let number = ctx.work_item.number;
    match (kind, output) {
        (ArtifactKind::CodegenOutput, AgentOutput::Codegen(out)) => artifacts.write(owner, repo, number, kind, out),
        (ArtifactKind::ReviewOutput, AgentOutput::Review(out)) => artifacts.write(owner, repo, number, kind, out),
        (ArtifactKind::PrOutput, AgentOutput::Pr(out)) => artifacts.write(owner, repo, number, kind, out),
        (ArtifactKind::DeployOutput, AgentOutput::Deploy(out)) => artifacts.write(owner, repo, number, kind, out),
        (ArtifactKind::TestOutput, AgentOutput::Test(out)) => artifacts.write(owner, repo, number, kind, out),
        _ => return Ok(()),
    }
    .map(|_| ())
    .map_err(|e| CoreError::Internal(e.to_string()))
}

async fn run_auto(
    config: &Config,
    credentials: &Credentials,
    repo_root: &PathBuf,
    interval: Option<u64>,
    max_duration: Option<u64>,
    scan_todos: bool,
    dry_run: bool,
) -> Result<String, CoreError> {
    let home_dir = config.storage.home_dir.clone();
    let (telemetry_handle, telemetry) = Telemetry::new(&home_dir);
    let telemetry_task = tokio::spawn(telemetry.run());

    let has_token = credentials.platform_token.is_some();
    let gateway = if has_token { build_gateway(config, credentials)? } else { build_gateway(config, credentials).unwrap_or_else(|_| Arc::new(NoopGateway)) };
    let artifacts = Arc::new(ArtifactStore::new(&home_dir));
    let dispatcher = build_dispatcher(config, credentials, gateway.clone(), artifacts.clone())?;

    let session_id = uuid::Uuid::now_v7().to_string();
    let interval = Duration::from_secs(interval.unwrap_or(config.supervisor.poll_interval_ms / 1000));
    let max_duration_minutes = max_duration.unwrap_or(config.supervisor.max_duration_minutes);

    let supervisor = Supervisor::new(
        gateway,
        dispatcher,
        artifacts,
        telemetry_handle.clone(),
        repo_root.clone(),
        session_id,
        interval,
        max_duration_minutes,
        scan_todos || config.supervisor.scan_todos,
        dry_run || config.supervisor.dry_run,
        has_token,
    );

    let cancelled = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let cancel_flag = cancelled.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_flag.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    let (summary, reason) = supervisor.run(|| cancelled.load(std::sync::atomic::Ordering::SeqCst)).await;
    drop(telemetry_handle);
    let _ = telemetry_task.await;

    Ok(format!(
        "stopped ({reason:?}) after {} cycles: {} executions, {} skips, {} errors, {:.1}s",
        summary.cycles,
        summary.executions,
        summary.skips,
        summary.errors,
        summary.duration.as_secs_f64()
    ))
}

struct NoopGateway;

#[async_trait::async_trait]
impl PlatformGateway for NoopGateway {
    async fn get_work_item(&self, _owner: &str, _repo: &str, _number: u64) -> Result<engine::domain::WorkItem, engine::platform::GatewayError> {
        Err(engine::platform::GatewayError::NotFound("no platform token configured".into()))
    }
    async fn list_work_items(&self, _owner: &str, _repo: &str, _page: u32) -> Result<engine::platform::WorkItemPage, engine::platform::GatewayError> {
        Ok(engine::platform::WorkItemPage { items: Vec::new(), next_page: None })
    }
    async fn patch_labels(&self, _owner: &str, _repo: &str, _number: u64, _patch: engine::platform::LabelPatch) -> Result<(), engine::platform::GatewayError> {
        Err(engine::platform::GatewayError::NotFound("no platform token configured".into()))
    }
    async fn post_comment(&self, _owner: &str, _repo: &str, _number: u64, _comment: engine::platform::Comment) -> Result<(), engine::platform::GatewayError> {
        Err(engine::platform::GatewayError::NotFound("no platform token configured".into()))
    }
    async fn create_issue(&self, _owner: &str, _repo: &str, _draft: engine::platform::IssueDraft) -> Result<engine::domain::WorkItem, engine::platform::GatewayError> {
        Err(engine::platform::GatewayError::NotFound("no platform token configured".into()))
    }
    async fn list_pull_requests(&self, _owner: &str, _repo: &str, _page: u32) -> Result<engine::platform::PullRequestPage, engine::platform::GatewayError> {
        Ok(engine::platform::PullRequestPage { items: Vec::new(), next_page: None })
    }
    async fn list_pr_files(&self, _owner: &str, _repo: &str, _number: u64) -> Result<Vec<String>, engine::platform::GatewayError> {
        Ok(Vec::new())
    }
    async fn create_pull_request(&self, _owner: &str, _repo: &str, _draft: engine::platform::PullRequestDraft) -> Result<engine::platform::PullRequest, engine::platform::GatewayError> {
        Err(engine::platform::GatewayError::NotFound("no platform token configured".into()))
    }
    async fn create_milestone(&self, _owner: &str, _repo: &str, _title: &str) -> Result<engine::platform::Milestone, engine::platform::GatewayError> {
        Err(engine::platform::GatewayError::NotFound("no platform token configured".into()))
    }
    async fn rate_limit_status(&self) -> Result<engine::platform::RateLimitStatus, engine::platform::GatewayError> {
        Err(engine::platform::GatewayError::NotFound("no platform token configured".into()))
    }
}

async fn run_todos(_config: &Config, credentials: &Credentials, repo_root: &PathBuf, path: Option<PathBuf>, create_issues: bool, dry_run: bool) -> Result<String, CoreError> {
    let root = path.unwrap_or_else(|| repo_root.clone());
    let markers = codescan::scan_markers(&root, &[]).map_err(|e| CoreError::Internal(e.to_string()))?;

    if create_issues && !dry_run {
        let config = Config::load(None).unwrap_or_default();
        let gateway = build_gateway(&config, credentials)?;
        let identity = RepoIdentity::resolve(&root)
            .await
            .ok_or_else(|| CoreError::Config("could not resolve repo identity from the working directory's VCS remote".into()))?;
        for marker in &markers {
            let draft = engine::platform::IssueDraft {
                title: format!("{}: {}", marker.kind, marker.text),
                body: format!("Found at `{}:{}` by the repository marker scan.", marker.file, marker.line),
                labels: vec!["type:bug".to_string(), "source:todo-scan".to_string()],
            };
            gateway.create_issue(&identity.owner, &identity.repo, draft).await.map_err(CoreError::from)?;
        }
        info!(count = markers.len(), "run_todos: created issues for every marker found");
    }

    Ok(format!("{} markers found", markers.len()))
}
