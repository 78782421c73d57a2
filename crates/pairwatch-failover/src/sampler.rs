//! Log sampler — reads a bounded window of one process's stdout and
//! decides whether it is erroring badly enough to fail over.
//!
//! A sampler run subscribes to the log bus, counts the target's lines and
//! error matches until the line budget is reached, then unsubscribes. A
//! timeout guard ends runs whose process is too quiet to fill the budget;
//! those report an incomplete verdict that never triggers failover.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use pairwatch_core::{MonitorConfig, ProcessHandle, ProcessId, ProcessSupervisor, SupervisorResult};

/// Fixed sampling parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Lowercased error marker.
    error_marker: String,
    /// Fail over when strictly more errors than this are seen.
    pub error_threshold: u32,
    /// Lines inspected per run.
    pub log_line_limit: u32,
    /// Upper bound on one run.
    pub timeout: Duration,
}

impl SamplerConfig {
    pub fn new(
        error_marker: &str,
        error_threshold: u32,
        log_line_limit: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            error_marker: error_marker.to_lowercase(),
            error_threshold,
            log_line_limit,
            timeout,
        }
    }

    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            &config.error_marker,
            config.error_threshold,
            config.log_line_limit,
            config.sample_timeout(),
        )
    }

    pub fn error_marker(&self) -> &str {
        &self.error_marker
    }
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self::from_config(&MonitorConfig::default())
    }
}

/// How a sampler run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleOutcome {
    /// The line budget was reached.
    Complete,
    /// The timeout guard fired before the budget was reached.
    TimedOut,
    /// The log bus closed before the budget was reached.
    BusClosed,
}

impl SampleOutcome {
    pub fn is_complete(self) -> bool {
        self == Self::Complete
    }
}

/// Result of one sampler run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub process_id: ProcessId,
    pub should_failover: bool,
    pub error_count: u32,
    pub line_count: u32,
    pub outcome: SampleOutcome,
}

/// Counters for one sampler run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleWindow {
    target: ProcessId,
    line_count: u32,
    error_count: u32,
    line_limit: u32,
}

impl SampleWindow {
    pub fn new(target: ProcessId, line_limit: u32) -> Self {
        Self {
            target,
            line_count: 0,
            error_count: 0,
            line_limit,
        }
    }

    /// Count one line. Returns whether it matched the marker.
    ///
    /// Lines offered after the budget is reached are not inspected.
    pub fn record(&mut self, text: &str, marker: &str) -> bool {
        if self.is_full() {
            return false;
        }
        self.line_count += 1;
        let matched = text.to_lowercase().contains(marker);
        if matched {
            self.error_count += 1;
        }
        matched
    }

    pub fn is_full(&self) -> bool {
        self.line_count >= self.line_limit
    }

    pub fn line_count(&self) -> u32 {
        self.line_count
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    /// Close the window. Only a complete window can warrant failover.
    pub fn into_verdict(self, error_threshold: u32, outcome: SampleOutcome) -> Verdict {
        Verdict {
            process_id: self.target,
            should_failover: outcome.is_complete() && self.error_count > error_threshold,
            error_count: self.error_count,
            line_count: self.line_count,
            outcome,
        }
    }
}

/// Attaches to a process's log stream and produces one `Verdict`.
pub struct LogSampler {
    supervisor: Arc<dyn ProcessSupervisor>,
    config: SamplerConfig,
}

impl LogSampler {
    pub fn new(supervisor: Arc<dyn ProcessSupervisor>, config: SamplerConfig) -> Self {
        Self { supervisor, config }
    }

    /// Sample `handle`'s stdout until the line budget, the bus closing, or
    /// the timeout, whichever comes first.
    ///
    /// Fails only if the log bus cannot be subscribed to.
    pub async fn attach(&self, handle: &ProcessHandle) -> SupervisorResult<Verdict> {
        let mut subscription = self.supervisor.subscribe_log_lines().await?;
        let mut window = SampleWindow::new(handle.id, self.config.log_line_limit);
        let marker = self.config.error_marker();

        info!(process_id = handle.id, name = %handle.name, "monitoring logs");

        let deadline = tokio::time::sleep(self.config.timeout);
        tokio::pin!(deadline);

        let outcome = loop {
            if window.is_full() {
                break SampleOutcome::Complete;
            }

            tokio::select! {
                biased;

                line = subscription.next_line() => match line {
                    Some(line) if line.process_id == handle.id => {
                        if window.record(&line.text, marker) {
                            warn!(
                                process_id = handle.id,
                                line = line.text.trim(),
                                "detected error in sampled process"
                            );
                        }
                    }
                    Some(_) => {}
                    None => break SampleOutcome::BusClosed,
                },
                _ = &mut deadline => break SampleOutcome::TimedOut,
            }
        };

        subscription.unsubscribe();

        let verdict = window.into_verdict(self.config.error_threshold, outcome);
        match outcome {
            SampleOutcome::Complete => info!(
                process_id = handle.id,
                lines = verdict.line_count,
                errors = verdict.error_count,
                should_failover = verdict.should_failover,
                "log sample complete"
            ),
            SampleOutcome::TimedOut | SampleOutcome::BusClosed => warn!(
                process_id = handle.id,
                lines = verdict.line_count,
                errors = verdict.error_count,
                budget = self.config.log_line_limit,
                ?outcome,
                "log sample incomplete"
            ),
        }
        debug!(?verdict, "sampler detached");

        Ok(verdict)
    }
}
