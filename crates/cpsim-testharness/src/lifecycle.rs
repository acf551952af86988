//! ---
//! cpsim_section: "06-test-harness"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Harness facade, lifecycle manager, and convergence checks."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
//! Start/stop discipline for the simulated processes.
//!
//! Each process moves `NotStarted -> Running -> Stopped`, and may be started
//! again once stopped. Starting a running process, stopping one that never
//! started, and stopping twice are usage errors.

use tokio::runtime::Runtime;

use cpsim_logging::{log_lifecycle_event, LifecycleOutcome, LogContext};
use cpsim_sim::{
    start_agent, start_controller, AgentContext, AgentHandle, ControllerContext, ControllerHandle,
    ProcessHandle, ProcessKind,
};

use crate::{HarnessError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ProcessState {
    NotStarted,
    Running,
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LifecycleError {
    #[error("{0} is already running")]
    AlreadyRunning(ProcessKind),
    #[error("{0} was never started")]
    NeverStarted(ProcessKind),
    #[error("{0} is already stopped")]
    AlreadyStopped(ProcessKind),
}

/// Handles that wrap a [`ProcessHandle`].
trait Supervised {
    fn into_process(self) -> ProcessHandle;
}

impl Supervised for AgentHandle {
    fn into_process(self) -> ProcessHandle {
        self.process
    }
}

impl Supervised for ControllerHandle {
    fn into_process(self) -> ProcessHandle {
        self.process
    }
}

#[derive(Debug)]
struct ProcessSlot<H> {
    kind: ProcessKind,
    state: ProcessState,
    handle: Option<H>,
}

impl<H: Supervised> ProcessSlot<H> {
    fn new(kind: ProcessKind) -> Self {
        Self {
            kind,
            state: ProcessState::NotStarted,
            handle: None,
        }
    }

    fn ensure_startable(&self) -> Result<()> {
        if self.state == ProcessState::Running {
            return Err(self.refuse(LifecycleError::AlreadyRunning(self.kind)));
        }
        Ok(())
    }

    fn started(&mut self, handle: H) -> &H {
        self.state = ProcessState::Running;
        log_lifecycle_event(
            Some(&LogContext::new().with_process(&self.kind.to_string())),
            "process.start",
            "process started",
            LifecycleOutcome::Success,
        );
        self.handle.insert(handle)
    }

    /// Take the handle out of a running slot; the slot is `Stopped` afterwards
    /// whatever the teardown reports.
    fn take_for_stop(&mut self) -> Result<H> {
        match self.state {
            ProcessState::NotStarted => Err(self.refuse(LifecycleError::NeverStarted(self.kind))),
            ProcessState::Stopped => Err(self.refuse(LifecycleError::AlreadyStopped(self.kind))),
            ProcessState::Running => {
                self.state = ProcessState::Stopped;
                self.handle
                    .take()
                    .ok_or_else(|| self.refuse(LifecycleError::NeverStarted(self.kind)))
            }
        }
    }

    fn refuse(&self, error: LifecycleError) -> HarnessError {
        log_lifecycle_event(
            Some(&LogContext::new().with_process(&self.kind.to_string())),
            "process.misuse",
            &error.to_string(),
            LifecycleOutcome::Fault,
        );
        error.into()
    }
}

/// Tracks the agent and controller independently and owns their handles
/// while they run.
#[derive(Debug)]
pub struct LifecycleManager {
    agent: ProcessSlot<AgentHandle>,
    controller: ProcessSlot<ControllerHandle>,
}

impl LifecycleManager {
    pub fn new() -> Self {
        Self {
            agent: ProcessSlot::new(ProcessKind::Agent),
            controller: ProcessSlot::new(ProcessKind::Controller),
        }
    }

    pub fn state(&self, kind: ProcessKind) -> ProcessState {
        match kind {
            ProcessKind::Agent => self.agent.state,
            ProcessKind::Controller => self.controller.state,
        }
    }

    pub fn agent(&self) -> Option<&AgentHandle> {
        self.agent.handle.as_ref()
    }

    pub fn controller(&self) -> Option<&ControllerHandle> {
        self.controller.handle.as_ref()
    }

    pub fn start_agent(
        &mut self,
        runtime: &Runtime,
        context: AgentContext,
    ) -> Result<&AgentHandle> {
        self.agent.ensure_startable()?;
        let handle = start_agent(runtime.handle(), context).map_err(|err| {
            HarnessError::ProcessStart {
                kind: ProcessKind::Agent,
                message: format!("{err:#}"),
            }
        })?;
        Ok(self.agent.started(handle))
    }

    pub fn start_controller(
        &mut self,
        runtime: &Runtime,
        context: ControllerContext,
    ) -> Result<&ControllerHandle> {
        self.controller.ensure_startable()?;
        let handle = start_controller(runtime.handle(), context).map_err(|err| {
            HarnessError::ProcessStart {
                kind: ProcessKind::Controller,
                message: format!("{err:#}"),
            }
        })?;
        Ok(self.controller.started(handle))
    }

    /// Signal the agent to stop and block until its task exits.
    pub fn stop_agent(&mut self, runtime: &Runtime) -> Result<()> {
        let handle = self.agent.take_for_stop()?;
        teardown(runtime, handle.into_process())
    }

    /// Signal the controller to stop and block until its task exits.
    pub fn stop_controller(&mut self, runtime: &Runtime) -> Result<()> {
        let handle = self.controller.take_for_stop()?;
        teardown(runtime, handle.into_process())
    }

    /// Stop whatever is still running, ignoring usage errors.
    pub fn stop_all(&mut self, runtime: &Runtime) {
        for kind in [ProcessKind::Controller, ProcessKind::Agent] {
            if self.state(kind) != ProcessState::Running {
                continue;
            }
            let stopped = match kind {
                ProcessKind::Agent => self.stop_agent(runtime),
                ProcessKind::Controller => self.stop_controller(runtime),
            };
            if let Err(err) = stopped {
                tracing::warn!(process = %kind, error = %err, "teardown failed");
            }
        }
    }
}

impl Default for LifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

fn teardown(runtime: &Runtime, process: ProcessHandle) -> Result<()> {
    let kind = process.kind();
    runtime
        .block_on(process.shutdown())
        .map_err(|err| HarnessError::ProcessStop {
            kind,
            message: format!("{err:#}"),
        })?;
    log_lifecycle_event(
        Some(&LogContext::new().with_process(&kind.to_string())),
        "process.stop",
        "process stopped",
        LifecycleOutcome::Success,
    );
    Ok(())
}
