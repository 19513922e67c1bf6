//! CLI command definitions, in the teacher's `Cli`/`Command` derive shape.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::domain::AgentKind;
use crate::errors::CoreError;

#[derive(Parser)]
#[command(
    name = "devcoord",
    about = "Label-driven autonomous development coordinator",
    version = env!("CARGO_PKG_VERSION")
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug-level) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit one structured JSON object instead of human-readable prose
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Show scheduler and telemetry status
    Status,

    /// Run a single agent invocation against one work item
    Agent {
        #[command(subcommand)]
        action: AgentAction,
    },

    /// Run the supervisor loop until a stop condition fires
    Auto {
        /// Seconds to sleep between cycles
        #[arg(long)]
        interval: Option<u64>,

        /// Wall-clock bound on the whole run, in minutes (0 = unbounded)
        #[arg(long)]
        max_duration: Option<u64>,

        /// Fall back to scanning the repository tree for marker comments
        /// when no item yields an executable decision
        #[arg(long)]
        scan_todos: bool,

        /// Log decisions without invoking the Agent Dispatcher or the
        /// Platform Gateway's mutating calls
        #[arg(long)]
        dry_run: bool,
    },

    /// Scan the repository tree for TODO/FIXME/HACK/NOTE markers
    Todos {
        /// Root to scan; defaults to the current directory
        #[arg(long)]
        path: Option<PathBuf>,

        /// Open a platform issue for each marker found
        #[arg(long)]
        create_issues: bool,

        /// List markers without creating issues even if --create-issues is set
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum AgentAction {
    Run {
        /// Agent kind: issue, codegen, review, pr, deploy, test
        kind: AgentKind,

        /// Work item number to load as context
        #[arg(long)]
        issue: Option<u64>,

        /// Pull request number; its changed files are appended to context
        #[arg(long)]
        pr: Option<u64>,

        /// Comma-separated list of paths to append to context
        #[arg(long, value_delimiter = ',')]
        files: Vec<String>,

        #[arg(long)]
        dry_run: bool,
    },
}

/// The structured success/failure envelope every subcommand's `--json`
/// output conforms to.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Envelope<T: Serialize> {
    Success { success: bool, data: T, timestamp: String },
    Failure { success: bool, error: ErrorBody, timestamp: String },
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    pub recoverable: bool,
    pub suggestion: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Self {
        Envelope::Success { success: true, data, timestamp: now_iso8601() }
    }
}

impl Envelope<()> {
    pub fn failure(err: &CoreError, suggestion: Option<String>) -> Self {
        Envelope::Failure {
            success: false,
            error: ErrorBody {
                code: err.code().to_string(),
                message: err.to_string(),
                recoverable: err.is_recoverable(),
                suggestion,
            },
            timestamp: now_iso8601(),
        }
    }
}

fn now_iso8601() -> String {
    chrono::DateTime::from_timestamp_millis(taskstore::now_ms()).unwrap_or_default().to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_with_no_subcommand_flags() {
        let cli = Cli::parse_from(["devcoord", "status"]);
        assert!(matches!(cli.command, Command::Status));
    }

    #[test]
    fn parses_agent_run_with_issue_and_pr() {
        let cli = Cli::parse_from(["devcoord", "agent", "run", "codegen", "--issue=7", "--pr=3"]);
        let Command::Agent { action: AgentAction::Run { kind, issue, pr, .. } } = cli.command else {
            panic!("expected agent run");
        };
        assert_eq!(kind, AgentKind::CodeGen);
        assert_eq!(issue, Some(7));
        assert_eq!(pr, Some(3));
    }

    #[test]
    fn parses_auto_with_bounds() {
        let cli = Cli::parse_from(["devcoord", "auto", "--interval=30", "--max-duration=60", "--scan-todos"]);
        let Command::Auto { interval, max_duration, scan_todos, dry_run } = cli.command else {
            panic!("expected auto");
        };
        assert_eq!(interval, Some(30));
        assert_eq!(max_duration, Some(60));
        assert!(scan_todos);
        assert!(!dry_run);
    }

    #[test]
    fn failure_envelope_carries_the_closed_error_code() {
        let envelope = Envelope::<()>::failure(&CoreError::Auth("no token".into()), Some("run login".into()));
        let Envelope::Failure { error, .. } = envelope else {
            panic!("expected failure");
        };
        assert_eq!(error.code, "AUTH_ERROR");
        assert!(error.recoverable);
    }
}
