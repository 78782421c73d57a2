//! `ProcessSupervisor` implementation that runs the `pm2` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use pairwatch_core::{
    LogSubscription, ProcessHandle, ProcessId, ProcessSupervisor, SupervisorError,
    SupervisorFuture,
};

use crate::parse::{parse_log_record, parse_process_list};

/// Drives a local pm2 daemon through its command-line tool.
#[derive(Debug, Clone)]
pub struct Pm2Cli {
    binary: PathBuf,
}

impl Default for Pm2Cli {
    fn default() -> Self {
        Self::new()
    }
}

impl Pm2Cli {
    /// Use `pm2` from `PATH`.
    pub fn new() -> Self {
        Self::with_binary("pm2")
    }

    /// Use a specific pm2 executable.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Run a pm2 command to completion and return its stdout.
    async fn run(&self, args: &[&str]) -> Result<Vec<u8>, String> {
        debug!(binary = %self.binary.display(), ?args, "running pm2");
        let output = Command::new(&self.binary)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| format!("failed to run {}: {e}", self.binary.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("{} ({})", output.status, stderr.trim()));
        }
        Ok(output.stdout)
    }

    async fn command(&self, command: &'static str, id: ProcessId) -> Result<(), SupervisorError> {
        let id_arg = id.to_string();
        self.run(&[command, id_arg.as_str()])
            .await
            .map(|_| ())
            .map_err(|reason| SupervisorError::Command {
                command,
                id,
                reason,
            })
    }
}

impl ProcessSupervisor for Pm2Cli {
    fn connect(&self) -> SupervisorFuture<'_, ()> {
        Box::pin(async move {
            self.run(&["ping"])
                .await
                .map(|_| ())
                .map_err(SupervisorError::Connection)
        })
    }

    fn list_processes(&self) -> SupervisorFuture<'_, Vec<ProcessHandle>> {
        Box::pin(async move {
            let stdout = self.run(&["jlist"]).await.map_err(SupervisorError::List)?;
            parse_process_list(&stdout).map_err(|e| SupervisorError::List(e.to_string()))
        })
    }

    fn stop(&self, id: ProcessId) -> SupervisorFuture<'_, ()> {
        Box::pin(self.command("stop", id))
    }

    fn restart(&self, id: ProcessId) -> SupervisorFuture<'_, ()> {
        Box::pin(self.command("restart", id))
    }

    fn disconnect(&self) -> SupervisorFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn subscribe_log_lines(&self) -> SupervisorFuture<'_, LogSubscription> {
        Box::pin(async move {
            let mut child = Command::new(&self.binary)
                .args(["logs", "--json", "--lines", "0", "--out"])
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| {
                    SupervisorError::LogBus(format!("failed to run {}: {e}", self.binary.display()))
                })?;

            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| SupervisorError::LogBus("log tail has no stdout".into()))?;

            let (tx, subscription) = LogSubscription::channel();
            let reader = tokio::spawn(async move {
                // Owned here so aborting the reader kills the tail.
                let _child = child;
                let mut lines = BufReader::new(stdout).lines();
                loop {
                    match lines.next_line().await {
                        Ok(Some(raw)) => {
                            let Some(line) = parse_log_record(&raw) else {
                                continue;
                            };
                            if tx.send(line).await.is_err() {
                                break;
                            }
                        }
                        Ok(None) => {
                            debug!("pm2 log tail ended");
                            break;
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to read pm2 log tail");
                            break;
                        }
                    }
                }
            });

            Ok(subscription.with_reader(reader))
        })
    }
}
