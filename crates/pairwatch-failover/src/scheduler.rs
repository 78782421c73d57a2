//! Cycle scheduler — the fixed-interval driver of the monitor.
//!
//! Each tick refreshes the process list, resolves the active/standby pair,
//! and, unless a failover is pending, spawns a sampler run against the
//! active instance. Skipped ticks are not queued; the next tick is a fresh
//! attempt.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use pairwatch_core::{
    MonitorConfig, Pair, PairError, ProcessId, ProcessSupervisor, SupervisorError,
    SupervisorResult,
};

use crate::controller::{FailoverController, FailoverReport, FailoverTimings};
use crate::gate::FailoverGate;
use crate::sampler::{LogSampler, SamplerConfig, Verdict};

/// Result of one sampler run started by a tick.
#[derive(Debug)]
pub struct SampleCycle {
    pub verdict: Verdict,
    /// The failover this verdict scheduled, if any.
    pub failover: Option<JoinHandle<FailoverReport>>,
}

/// What a tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// A sampler run was spawned.
    Sampling(JoinHandle<SupervisorResult<SampleCycle>>),
    /// The gate was closed; sampling skipped.
    Paused,
    /// The monitored ids did not form a valid pair; tick skipped.
    InvalidPair(PairError),
    /// The process list could not be fetched; tick skipped.
    ListFailed(SupervisorError),
}

/// Drives sample cycles for one monitored pair.
pub struct CycleScheduler {
    supervisor: Arc<dyn ProcessSupervisor>,
    gate: Arc<FailoverGate>,
    sampler: Arc<LogSampler>,
    controller: Arc<FailoverController>,
    monitored: Vec<ProcessId>,
    interval: Duration,
}

impl CycleScheduler {
    /// Wire a sampler, gate, and controller around `supervisor`.
    pub fn new(
        supervisor: Arc<dyn ProcessSupervisor>,
        monitored: Vec<ProcessId>,
        config: &MonitorConfig,
    ) -> Self {
        let gate = Arc::new(FailoverGate::new());
        let sampler = LogSampler::new(Arc::clone(&supervisor), SamplerConfig::from_config(config));
        let controller = FailoverController::new(
            Arc::clone(&supervisor),
            Arc::clone(&gate),
            FailoverTimings::from_config(config),
        );

        Self {
            supervisor,
            gate,
            sampler: Arc::new(sampler),
            controller: Arc::new(controller),
            monitored,
            interval: config.tick_interval(),
        }
    }

    /// The gate shared with the failover controller.
    pub fn gate(&self) -> &Arc<FailoverGate> {
        &self.gate
    }

    /// Run one cycle.
    pub async fn tick(&self) -> TickOutcome {
        let processes = match self.supervisor.list_processes().await {
            Ok(processes) => processes,
            Err(e) => {
                error!(error = %e, "failed to fetch process list, skipping tick");
                return TickOutcome::ListFailed(e);
            }
        };

        let pair = match Pair::resolve(&processes, &self.monitored) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(
                    monitored = ?self.monitored,
                    error = %e,
                    "pair invariant violated, skipping tick"
                );
                return TickOutcome::InvalidPair(e);
            }
        };

        if !self.gate.try_enter() {
            info!("waiting for failover, log check paused");
            return TickOutcome::Paused;
        }

        info!(
            active = pair.active().id,
            standby = pair.standby().id,
            "starting new log check cycle"
        );

        let sampler = Arc::clone(&self.sampler);
        let controller = Arc::clone(&self.controller);

        TickOutcome::Sampling(tokio::spawn(async move {
            let verdict = sampler.attach(pair.active()).await.inspect_err(|e| {
                error!(process_id = pair.active().id, error = %e, "log sampling failed");
            })?;

            let failover = if verdict.should_failover {
                warn!(
                    process_id = verdict.process_id,
                    errors = verdict.error_count,
                    standby = pair.standby().id,
                    "error threshold exceeded"
                );
                controller.schedule_failover(pair)
            } else {
                debug!(process_id = verdict.process_id, "no failover needed");
                None
            };

            Ok::<_, SupervisorError>(SampleCycle { verdict, failover })
        }))
    }

    /// Tick immediately, then every interval, until `shutdown` flips.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.interval.as_secs(),
            monitored = ?self.monitored,
            "cycle scheduler started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Sampler runs and failovers continue in the background.
                    let _ = self.tick().await;
                }
                _ = shutdown.changed() => {
                    info!("cycle scheduler shutting down");
                    break;
                }
            }
        }
    }
}
