//! Domain types for the development coordinator.
//!
//! Core domain types: `WorkItem`, `Task`, `Dag`, `TaskGroup`, `Session`,
//! `WorktreeInfo`, `ExecutionContext`, artifact payloads and scheduler
//! state. `Task`, `TaskGroup`, `WorktreeInfo` and `Session` implement the
//! `Record` trait for taskstore persistence.

mod agent;
mod artifact;
mod dag;
mod execution_context;
mod id;
mod scheduler_state;
mod session;
mod task;
mod task_group;
mod work_item;
mod worktree_info;

pub use agent::AgentKind;
pub use artifact::{ArtifactKind, CodegenOutput, DeployOutput, FileAction, FileChange, PrOutput, ReviewBreakdown, ReviewOutput, TestOutput};
pub use dag::{Dag, DagEdge, DagStatistics, build_dag, calculate_critical_path, detect_cycles, find_cycle_path, get_statistics};
pub use execution_context::ExecutionContext;
pub use id::{DomainId, IdResolver, generate_id, slugify};
pub use scheduler_state::{SchedulerCounters, SchedulerState, SchedulerStatus};
pub use session::{Session, SessionStatus, TaskResult};
pub use task::{Impact, Severity, Task, TaskStatus};
pub use task_group::{GroupStatus, TaskGroup};
pub use work_item::{Label, PhaseFacet, PriorityLabel, State, WorkItem};
pub use worktree_info::{AgentStatistics, AgentStatus, WorktreeInfo};

pub use taskstore::{Filter, FilterOp, IndexValue, Record, Store};
