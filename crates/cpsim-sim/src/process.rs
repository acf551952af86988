//! ---
//! cpsim_section: "05-simulated-processes"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Simulated agent and controller processes."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use std::future::Future;

use anyhow::Context;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// The simulated processes the harness can run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProcessKind {
    Agent,
    Controller,
}

/// A running process task: its shutdown channel and its join handle.
///
/// Consumed by [`ProcessHandle::shutdown`], so a handle is never reused.
#[derive(Debug)]
pub struct ProcessHandle {
    kind: ProcessKind,
    shutdown: broadcast::Sender<()>,
    task: JoinHandle<()>,
}

impl ProcessHandle {
    /// Spawn `run` on `runtime`, handing it the receiving end of a fresh
    /// shutdown channel. A failing run is logged, not propagated.
    pub fn spawn<F, Fut>(runtime: &Handle, kind: ProcessKind, run: F) -> Self
    where
        F: FnOnce(broadcast::Receiver<()>) -> Fut,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let (shutdown, shutdown_rx) = broadcast::channel(1);
        let future = run(shutdown_rx);
        let task = runtime.spawn(async move {
            if let Err(err) = future.await {
                error!(process = %kind, error = %format!("{err:#}"), "process loop failed");
            }
        });
        Self {
            kind,
            shutdown,
            task,
        }
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    /// Whether the task has exited on its own (crash or early return).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal shutdown and wait for the task to exit.
    pub async fn shutdown(self) -> anyhow::Result<()> {
        // The receiver is gone if the task already exited; joining still
        // reports how it ended.
        let _ = self.shutdown.send(());
        self.task
            .await
            .with_context(|| format!("{} task did not exit cleanly", self.kind))?;
        debug!(process = %self.kind, "process task joined");
        Ok(())
    }
}
