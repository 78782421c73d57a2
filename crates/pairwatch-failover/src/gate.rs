//! Single-flight failover gate.
//!
//! Open means a new sample cycle may start. Closed means a failover is
//! cooling down or executing. Only the failover controller closes and
//! reopens the gate; the scheduler just asks whether it may enter.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Process-wide open/closed flag guarding the failover sequence.
#[derive(Debug, Default)]
pub struct FailoverGate {
    closed: AtomicBool,
}

impl FailoverGate {
    /// Create an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a sample cycle may start. Never blocks and never mutates.
    pub fn try_enter(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Transition Open → Closed.
    ///
    /// Idempotent. Returns `true` only for the call that performed the
    /// transition, so exactly one caller owns the failover it guards.
    pub fn close(&self) -> bool {
        let won = !self.closed.swap(true, Ordering::AcqRel);
        if won {
            debug!("failover gate closed");
        }
        won
    }

    /// Transition Closed → Open.
    pub fn open(&self) {
        if self.closed.swap(false, Ordering::AcqRel) {
            debug!("failover gate reopened");
        }
    }

    /// Whether a failover is pending or running.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}
