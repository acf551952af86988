//! ---
//! cpsim_section: "06-test-harness"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Harness facade, lifecycle manager, and convergence checks."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
//! Control-plane test harness.
//!
//! [`ControlPlaneHarness`] stands in for a live cluster API: tests inject
//! objects into an in-memory multi-variant store, start the simulated agent
//! and controller against it, and assert on their reaction with
//! [`ControlPlaneHarness::eventually`].
//!
//! Facade methods are fatal: they panic with the error text. Every fatal
//! method has a `try_*` counterpart returning [`HarnessError`].

use std::path::PathBuf;

use cpsim_common::{ConfigError, UnknownClusterVersion};
use cpsim_schema::SchemaError;
use cpsim_sim::ProcessKind;
use cpsim_store::StoreError;

pub mod convergence;
pub mod harness;
pub mod lifecycle;

/// Result alias used throughout the harness crate.
pub type Result<T> = std::result::Result<T, HarnessError>;

#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error(transparent)]
    Lifecycle(#[from] lifecycle::LifecycleError),
    #[error(transparent)]
    Convergence(#[from] convergence::ConvergenceError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error("invalid harness configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    UnknownClusterVersion(#[from] UnknownClusterVersion),
    #[error("unable to build harness runtime: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to start {kind}: {message}")]
    ProcessStart { kind: ProcessKind, message: String },
    #[error("failed to stop {kind}: {message}")]
    ProcessStop { kind: ProcessKind, message: String },
    #[error("task failed: {0}")]
    Task(String),
    #[error("fixture {} contains no objects", .0.display())]
    EmptyFixture(PathBuf),
}

pub use convergence::{eventually, ConvergenceError, ConvergenceReport};
pub use harness::ControlPlaneHarness;
pub use lifecycle::{LifecycleError, LifecycleManager, ProcessState};
