//! ---
//! cpsim_section: "05-simulated-processes"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Simulated agent and controller processes."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use std::sync::Arc;

use anyhow::bail;
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;

/// Single-fire completion signal. Clones observe the same signal.
#[derive(Debug, Clone)]
pub struct Readiness {
    name: &'static str,
    fired_at: Arc<OnceCell<DateTime<Utc>>>,
}

impl Readiness {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fired_at: Arc::new(OnceCell::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fire the signal. Returns `true` only for the call that fired it.
    pub fn mark_ready(&self) -> bool {
        self.fired_at.set(Utc::now()).is_ok()
    }

    pub fn is_ready(&self) -> bool {
        self.fired_at.get().is_some()
    }

    pub fn ready_at(&self) -> Option<DateTime<Utc>> {
        self.fired_at.get().copied()
    }

    /// Predicate form, for use with a convergence check.
    pub fn check(&self) -> anyhow::Result<()> {
        if !self.is_ready() {
            bail!("{} has not completed", self.name);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_exactly_once() {
        let signal = Readiness::new("initial sync");
        let observer = signal.clone();
        assert!(observer.check().is_err());

        assert!(signal.mark_ready());
        let first = observer.ready_at().unwrap();
        assert!(!signal.mark_ready());
        assert_eq!(observer.ready_at(), Some(first));
        assert!(observer.check().is_ok());
    }

    #[test]
    fn unfired_check_names_the_signal() {
        let err = Readiness::new("nodes synced").check().unwrap_err();
        assert_eq!(err.to_string(), "nodes synced has not completed");
    }
}
