//! Domain types for the monitored process pair.
//!
//! Handles are refreshed from the supervisor on every cycle and are never
//! cached beyond one cycle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::PairError;

/// Supervisor-assigned process handle, stable across restarts.
pub type ProcessId = u32;

// ── Process ───────────────────────────────────────────────────────

/// Run status reported by the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessStatus {
    Online,
    Stopped,
    /// Any other supervisor state (launching, errored, ...).
    Other(String),
}

impl ProcessStatus {
    /// Map a supervisor status string onto a `ProcessStatus`.
    pub fn from_supervisor(status: &str) -> Self {
        match status {
            "online" => Self::Online,
            "stopped" => Self::Stopped,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Stopped => f.write_str("stopped"),
            Self::Other(s) => f.write_str(s),
        }
    }
}

/// One process as listed by the supervisor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessHandle {
    pub id: ProcessId,
    pub name: String,
    pub status: ProcessStatus,
    pub memory_bytes: u64,
    pub cpu_percent: f64,
}

impl ProcessHandle {
    /// Whether this process currently holds the active role.
    pub fn is_active(&self) -> bool {
        self.status == ProcessStatus::Online
    }
}

// ── Pair ──────────────────────────────────────────────────────────

/// An active/standby pair resolved from one supervisor listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Pair {
    active: ProcessHandle,
    standby: ProcessHandle,
}

impl Pair {
    /// Filter `processes` down to `monitored` ids and check that exactly
    /// one of the two is active.
    pub fn resolve(
        processes: &[ProcessHandle],
        monitored: &[ProcessId],
    ) -> Result<Self, PairError> {
        let members: Vec<&ProcessHandle> = processes
            .iter()
            .filter(|p| monitored.contains(&p.id))
            .collect();

        let [first, second] = members.as_slice() else {
            return Err(PairError::WrongSize {
                expected: 2,
                found: members.len(),
            });
        };

        match (first.is_active(), second.is_active()) {
            (true, false) => Ok(Self::new((*first).clone(), (*second).clone())),
            (false, true) => Ok(Self::new((*second).clone(), (*first).clone())),
            (true, true) => Err(PairError::MultipleActive),
            (false, false) => Err(PairError::NoActive),
        }
    }

    fn new(active: ProcessHandle, standby: ProcessHandle) -> Self {
        Self { active, standby }
    }

    /// The instance currently serving.
    pub fn active(&self) -> &ProcessHandle {
        &self.active
    }

    /// The hot spare.
    pub fn standby(&self) -> &ProcessHandle {
        &self.standby
    }
}

// ── Log bus ───────────────────────────────────────────────────────

/// A single stdout line emitted by a supervised process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLine {
    pub process_id: ProcessId,
    pub text: String,
}

impl LogLine {
    pub fn new(process_id: ProcessId, text: impl Into<String>) -> Self {
        Self {
            process_id,
            text: text.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(id: ProcessId, status: ProcessStatus) -> ProcessHandle {
        ProcessHandle {
            id,
            name: format!("worker-{id}"),
            status,
            memory_bytes: 32 * 1024 * 1024,
            cpu_percent: 1.5,
        }
    }

    #[test]
    fn resolve_picks_active_and_standby() {
        let list = vec![
            handle(1, ProcessStatus::Stopped),
            handle(2, ProcessStatus::Online),
            handle(7, ProcessStatus::Online),
        ];
        let pair = Pair::resolve(&list, &[1, 2]).unwrap();
        assert_eq!(pair.active().id, 2);
        assert_eq!(pair.standby().id, 1);
    }

    #[test]
    fn resolve_rejects_two_actives() {
        let list = vec![handle(1, ProcessStatus::Online), handle(2, ProcessStatus::Online)];
        assert_eq!(Pair::resolve(&list, &[1, 2]), Err(PairError::MultipleActive));
    }

    #[test]
    fn resolve_rejects_no_active() {
        let list = vec![
            handle(1, ProcessStatus::Stopped),
            handle(2, ProcessStatus::Other("errored".to_string())),
        ];
        assert_eq!(Pair::resolve(&list, &[1, 2]), Err(PairError::NoActive));
    }

    #[test]
    fn resolve_rejects_missing_member() {
        let list = vec![handle(1, ProcessStatus::Online), handle(3, ProcessStatus::Stopped)];
        assert_eq!(
            Pair::resolve(&list, &[1, 2]),
            Err(PairError::WrongSize {
                expected: 2,
                found: 1
            })
        );
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ProcessStatus::from_supervisor("online"), ProcessStatus::Online);
        assert_eq!(ProcessStatus::from_supervisor("stopped"), ProcessStatus::Stopped);
        assert_eq!(
            ProcessStatus::from_supervisor("launching"),
            ProcessStatus::Other("launching".to_string())
        );
        assert_eq!(ProcessStatus::Other("errored".to_string()).to_string(), "errored");
    }
}
