//! Child-process simulator.

use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;

use super::{RunOutcome, Simulator};
use crate::translate::SimulatorInvocation;

/// Bytes of captured output kept as a failure diagnostic.
pub const DIAGNOSTIC_TAIL_BYTES: usize = 4096;

/// Runs the simulator as a child process with a wall-clock budget.
///
/// The child is spawned with `kill_on_drop`, so both a timeout and an aborted
/// task terminate it.
#[derive(Debug, Clone)]
pub struct ProcessSimulator {
    timeout: Duration,
}

impl ProcessSimulator {
    /// Create a simulator that kills runs exceeding `timeout`.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Get the per-run budget.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Simulator for ProcessSimulator {
    async fn simulate(&self, invocation: &SimulatorInvocation) -> RunOutcome {
        let mut command = Command::new(invocation.program());
        command
            .args(invocation.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = invocation.working_dir() {
            command.current_dir(dir);
        }

        let child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return RunOutcome::failed(format!(
                    "failed to spawn {}: {e}",
                    invocation.program().display()
                ))
            }
        };

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Err(_) => RunOutcome::timeout(format!(
                "killed after {}s without exiting",
                self.timeout.as_secs()
            )),
            Ok(Err(e)) => RunOutcome::failed(format!("failed to wait for simulator: {e}")),
            Ok(Ok(output)) if output.status.success() => RunOutcome::success(),
            Ok(Ok(output)) => RunOutcome::failed(format!("{}\n{}", output.status, tail(&output))),
        }
    }
}

/// Last [`DIAGNOSTIC_TAIL_BYTES`] of stderr, or of stdout if stderr is empty.
fn tail(output: &Output) -> String {
    let bytes = if output.stderr.iter().all(u8::is_ascii_whitespace) {
        &output.stdout
    } else {
        &output.stderr
    };
    let start = bytes.len().saturating_sub(DIAGNOSTIC_TAIL_BYTES);
    String::from_utf8_lossy(&bytes[start..]).trim().to_string()
}
