//! ---
//! cpsim_section: "06-test-harness"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Harness facade, lifecycle manager, and convergence checks."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use cpsim_common::ConvergenceConfig;

/// How a successful convergence check went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceReport {
    /// Predicate invocations, including the successful one.
    pub attempts: u32,
    pub elapsed: Duration,
}

/// The predicate was still failing at the deadline.
#[derive(Debug, thiserror::Error)]
#[error("condition not met after {attempts} attempt(s) in {elapsed:?}: {last_failure}")]
pub struct ConvergenceError {
    pub attempts: u32,
    pub elapsed: Duration,
    /// Display text of the final failure, with its cause chain.
    pub last_failure: String,
}

/// Re-run `check` with doubling waits until it succeeds or the timeout
/// elapses.
///
/// Each round sleeps the current wait, then checks. Waits double for as long
/// as `now + wait` stays strictly before the deadline. After that, one final
/// sleep runs until the deadline and one final check decides the outcome, so
/// the last check always happens at or after the deadline. A timeout too
/// large to represent as an instant never expires.
///
/// Blocks the calling thread.
pub fn eventually<F>(
    config: &ConvergenceConfig,
    mut check: F,
) -> Result<ConvergenceReport, ConvergenceError>
where
    F: FnMut() -> anyhow::Result<()>,
{
    let started = Instant::now();
    let deadline = started.checked_add(config.timeout);
    let mut wait = config.initial_interval;
    let mut attempts = 0u32;

    while fits_before(deadline, wait) {
        thread::sleep(wait);
        attempts = attempts.saturating_add(1);
        match check() {
            Ok(()) => {
                return Ok(ConvergenceReport {
                    attempts,
                    elapsed: started.elapsed(),
                })
            }
            Err(err) => trace!(
                attempts,
                wait_ms = wait.as_millis() as u64,
                error = %err,
                "condition not met yet"
            ),
        }
        wait = wait.saturating_mul(2);
    }

    if let Some(deadline) = deadline {
        thread::sleep(deadline.saturating_duration_since(Instant::now()));
    }
    attempts = attempts.saturating_add(1);
    match check() {
        Ok(()) => Ok(ConvergenceReport {
            attempts,
            elapsed: started.elapsed(),
        }),
        Err(err) => {
            let elapsed = started.elapsed();
            debug!(
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                "condition not met before deadline"
            );
            Err(ConvergenceError {
                attempts,
                elapsed,
                last_failure: format!("{err:#}"),
            })
        }
    }
}

/// Whether another `wait` ends strictly before `deadline`. No deadline means
/// always; a wait that overflows the clock never fits.
fn fits_before(deadline: Option<Instant>, wait: Duration) -> bool {
    match deadline {
        None => true,
        Some(deadline) => Instant::now()
            .checked_add(wait)
            .is_some_and(|next| next < deadline),
    }
}
