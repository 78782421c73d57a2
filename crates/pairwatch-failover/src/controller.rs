//! Failover controller — drives the delayed stop/settle/restart sequence.
//!
//! A positive verdict closes the gate and spawns the sequence:
//!
//! 1. wait the cooldown
//! 2. stop the active instance, log the refreshed process list
//! 3. wait the settle delay
//! 4. restart the standby instance, log the refreshed process list
//! 5. disconnect from the supervisor
//! 6. reopen the gate
//!
//! Supervisor failures are logged, never retried, and never keep the gate
//! closed. The next tick re-evaluates the pair from scratch.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use pairwatch_core::{MonitorConfig, Pair, ProcessId, ProcessSupervisor, SupervisorError, SupervisorResult};

use crate::gate::FailoverGate;

/// Delays around the failover sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailoverTimings {
    /// Wait between the verdict and stopping the active instance.
    pub cooldown: Duration,
    /// Wait between stopping the active and restarting the standby.
    pub settle: Duration,
}

impl FailoverTimings {
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self {
            cooldown: config.cooldown(),
            settle: config.settle(),
        }
    }
}

impl Default for FailoverTimings {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

/// What one failover sequence managed to do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailoverReport {
    /// Handle that was stopped, if the stop succeeded.
    pub stopped: Option<ProcessId>,
    /// Handle that was restarted, if the restart succeeded.
    pub restarted: Option<ProcessId>,
    /// The supervisor failure that cut the sequence short.
    pub error: Option<SupervisorError>,
}

impl FailoverReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.stopped.is_some() && self.restarted.is_some()
    }
}

/// Reopens the gate when dropped, including when the sequence task
/// panics or is aborted.
struct ReopenOnDrop(Arc<FailoverGate>);

impl Drop for ReopenOnDrop {
    fn drop(&mut self) {
        self.0.open();
    }
}

/// Schedules and runs failover sequences, at most one at a time.
pub struct FailoverController {
    supervisor: Arc<dyn ProcessSupervisor>,
    gate: Arc<FailoverGate>,
    timings: FailoverTimings,
}

impl FailoverController {
    pub fn new(
        supervisor: Arc<dyn ProcessSupervisor>,
        gate: Arc<FailoverGate>,
        timings: FailoverTimings,
    ) -> Self {
        Self {
            supervisor,
            gate,
            timings,
        }
    }

    /// Close the gate and spawn the failover sequence for `pair`.
    ///
    /// Returns `None` without scheduling anything if a failover is already
    /// pending or running.
    pub fn schedule_failover(&self, pair: Pair) -> Option<JoinHandle<FailoverReport>> {
        if !self.gate.close() {
            info!(
                active = pair.active().id,
                "failover already pending, ignoring verdict"
            );
            return None;
        }

        warn!(
            active = pair.active().id,
            standby = pair.standby().id,
            cooldown_secs = self.timings.cooldown.as_secs_f64(),
            "failover scheduled"
        );

        let supervisor = Arc::clone(&self.supervisor);
        let reopen = ReopenOnDrop(Arc::clone(&self.gate));
        let timings = self.timings;

        Some(tokio::spawn(async move {
            let _reopen = reopen;
            tokio::time::sleep(timings.cooldown).await;
            let report = run_sequence(supervisor.as_ref(), &pair, timings.settle).await;
            if report.succeeded() {
                info!(
                    stopped = pair.active().id,
                    restarted = pair.standby().id,
                    "failover complete"
                );
            }
            report
        }))
    }
}

async fn run_sequence(
    supervisor: &dyn ProcessSupervisor,
    pair: &Pair,
    settle: Duration,
) -> FailoverReport {
    let mut report = FailoverReport::default();

    if let Err(e) = switch_roles(supervisor, pair, settle, &mut report).await {
        error!(
            active = pair.active().id,
            standby = pair.standby().id,
            error = %e,
            "failover sequence failed"
        );
        report.error = Some(e);
    }

    if let Err(e) = supervisor.disconnect().await {
        warn!(error = %e, "failed to disconnect from supervisor");
    }

    report
}

async fn switch_roles(
    supervisor: &dyn ProcessSupervisor,
    pair: &Pair,
    settle: Duration,
    report: &mut FailoverReport,
) -> SupervisorResult<()> {
    let active = pair.active();
    let standby = pair.standby();

    info!(process_id = active.id, name = %active.name, "stopping active instance");
    supervisor.stop(active.id).await?;
    report.stopped = Some(active.id);
    log_process_list(supervisor).await;

    info!(settle_secs = settle.as_secs_f64(), "waiting before restart");
    tokio::time::sleep(settle).await;

    info!(process_id = standby.id, name = %standby.name, "restarting standby instance");
    supervisor.restart(standby.id).await?;
    report.restarted = Some(standby.id);
    log_process_list(supervisor).await;

    Ok(())
}

async fn log_process_list(supervisor: &dyn ProcessSupervisor) {
    match supervisor.list_processes().await {
        Ok(processes) => {
            for p in &processes {
                info!(
                    process_id = p.id,
                    name = %p.name,
                    status = %p.status,
                    memory_bytes = p.memory_bytes,
                    cpu_percent = p.cpu_percent,
                    "process"
                );
            }
        }
        Err(e) => warn!(error = %e, "failed to refresh process list"),
    }
}
