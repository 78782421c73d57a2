//! Error types for the monitor.

use thiserror::Error;

use crate::types::ProcessId;

/// Result type alias for supervisor operations.
pub type SupervisorResult<T> = Result<T, SupervisorError>;

/// Errors raised by a `ProcessSupervisor` backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("failed to connect to process supervisor: {0}")]
    Connection(String),

    #[error("failed to open log bus: {0}")]
    LogBus(String),

    #[error("failed to list processes: {0}")]
    List(String),

    #[error("supervisor command `{command}` failed for process {id}: {reason}")]
    Command {
        command: &'static str,
        id: ProcessId,
        reason: String,
    },
}

impl SupervisorError {
    /// Startup failures (connection or log bus) are fatal to the monitor.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::LogBus(_))
    }
}

/// The monitored ids did not resolve to exactly one active and one standby.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PairError {
    #[error("expected {expected} monitored processes, found {found}")]
    WrongSize { expected: usize, found: usize },

    #[error("no active process in pair")]
    NoActive,

    #[error("more than one active process in pair")]
    MultipleActive,
}

/// Errors loading or validating `MonitorConfig`.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
