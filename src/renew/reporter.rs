///! Outcome handoff to the external re-scheduling mechanism.

use std::path::PathBuf;
use std::process::Command;

/// Full success.
pub const EXIT_OK: u8 = 0;
/// Malformed command line; no session was created.
pub const EXIT_USAGE: u8 = 1;
/// The run raised an error (login, discovery, renewal or scraping failure).
pub const EXIT_RUN_FAILED: u8 = 2;
/// The renewal loop completed but reported overall failure.
pub const EXIT_REPORTED_FAILURE: u8 = 3;

/// Day/month placeholder passed to the scheduler for a failed run.
pub const WILDCARD: &str = "*";

/// Receives the (day, month, success) outcome of a run, exactly once.
pub trait ScheduleSink {
    fn notify(&self, day: &str, month: &str, success: bool);
}

/// Invokes the external scheduler script with three positional arguments.
///
/// The invocation is synchronous and fire-and-forget: a spawn failure is
/// logged but does not change the run's own success signal, and the child's
/// exit status is not inspected.
pub struct ScriptScheduler {
    script: PathBuf,
}

impl ScriptScheduler {
    pub fn new(script: PathBuf) -> Self {
        Self { script }
    }
}

impl ScheduleSink for ScriptScheduler {
    fn notify(&self, day: &str, month: &str, success: bool) {
        let flag = if success { "True" } else { "False" };
        tracing::info!(
            "Notifying scheduler {:?}: day={} month={} success={}",
            self.script,
            day,
            month,
            flag
        );
        if let Err(e) = Command::new(&self.script).args([day, month, flag]).status() {
            tracing::warn!("Failed to invoke scheduler script {:?}: {}", self.script, e);
        }
    }
}
