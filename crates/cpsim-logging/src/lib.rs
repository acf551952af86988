//! ---
//! cpsim_section: "03-logging"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Structured logging context and lifecycle event helpers."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Structured logging helpers shared by the harness and the simulated
//! processes. Every event carries the same context fields so log lines from
//! the agent, the controller, and the store can be filtered together.

use tracing::Level;

pub mod macros;

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Simulated node the event relates to.
    pub node: Option<&'a str>,
    /// Simulated process (`agent`, `controller`) emitting the event.
    pub process: Option<&'a str>,
    /// Schema variant involved in a store operation.
    pub variant: Option<&'a str>,
    /// Resource kind involved in a store operation.
    pub kind: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a node name.
    pub fn with_node(mut self, node: &'a str) -> Self {
        self.node = Some(node);
        self
    }

    /// Attach a process name.
    pub fn with_process(mut self, process: &'a str) -> Self {
        self.process = Some(process);
        self
    }

    /// Attach a schema variant name.
    pub fn with_variant(mut self, variant: &'a str) -> Self {
        self.variant = Some(variant);
        self
    }

    /// Attach a resource kind.
    pub fn with_kind(mut self, kind: &'a str) -> Self {
        self.kind = Some(kind);
        self
    }
}

/// Outcome attached to lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleOutcome {
    /// The transition completed.
    Success,
    /// The transition was refused or failed.
    Fault,
}

impl LifecycleOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            LifecycleOutcome::Success => "success",
            LifecycleOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized lifecycle event (process start/stop, readiness).
pub fn log_lifecycle_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: LifecycleOutcome,
) {
    let default = LogContext::default();
    let ctx = context.unwrap_or(&default);
    // `tracing::event!` needs a constant level, so dispatch per level.
    macro_rules! emit {
        ($level:expr) => {
            tracing::event!(
                $level,
                event,
                outcome = outcome.as_str(),
                node = ctx.node.unwrap_or(""),
                process = ctx.process.unwrap_or(""),
                variant = ctx.variant.unwrap_or(""),
                kind = ctx.kind.unwrap_or(""),
                message = %message
            )
        };
    }
    match outcome {
        LifecycleOutcome::Success => emit!(Level::INFO),
        LifecycleOutcome::Fault => emit!(Level::ERROR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpsim_common::{init_tracing, LoggingConfig};

    #[test]
    fn macros_emit_without_panic() {
        init_tracing(&LoggingConfig::default());
        let ctx = LogContext::new().with_node("k8s1").with_process("agent");
        sim_info!(context = ctx.clone(), "agent online");
        sim_debug!("debug message");
        sim_warn!(context = ctx.clone().with_kind("Node"), "late sync");
        sim_error!(context = ctx, "error code: {}", 42);
    }

    #[test]
    fn lifecycle_helper_emits() {
        init_tracing(&LoggingConfig::default());
        let ctx = LogContext::new().with_process("controller");
        log_lifecycle_event(
            Some(&ctx),
            "process.start",
            "controller started",
            LifecycleOutcome::Success,
        );
        log_lifecycle_event(
            None,
            "process.stop",
            "stop without start",
            LifecycleOutcome::Fault,
        );
    }
}
