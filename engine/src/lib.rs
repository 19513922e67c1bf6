//! Autonomous development coordinator: label-driven state machine, DAG
//! builder, priority scheduler, worktree/session manager and supervisor
//! loop that drive agent work against a hosting platform's issue tracker.
//!
//! # Modules
//!
//! - [`platform`] - hosting-platform gateway (C1)
//! - [`artifact_store`] - on-disk agent output persistence (C2)
//! - [`worktree`] - git worktree lifecycle (C3)
//! - [`session`] - bounded-concurrency task execution (C4)
//! - [`dag_builder`] - issue decomposition and task grouping (C5)
//! - [`scheduler`] - dependency-gated `TaskGroup` dispatch (C6)
//! - [`state_machine`] - label state transition table (C7)
//! - [`dispatcher`] - agent kind to callable resolution (C8)
//! - [`supervisor`] - the water-spider run loop (C9)
//! - [`telemetry`] - structured event stream and aggregator (C10)
//! - [`config`] / [`credentials`] - layered configuration (C11)

pub mod artifact_store;
pub mod cli;
pub mod config;
pub mod credentials;
pub mod dag_builder;
pub mod dispatcher;
pub mod domain;
pub mod errors;
pub mod llm;
pub mod platform;
pub mod scheduler;
pub mod session;
pub mod state_machine;
pub mod supervisor;
pub mod telemetry;
pub mod worktree;

pub use errors::CoreError;
