//! pairwatch-failover — the log-sampling and failover decision engine.
//!
//! Watches the active half of a blue/green pair, samples its stdout for
//! error lines, and fails over to the standby when error density crosses
//! the threshold.
//!
//! # Architecture
//!
//! ```text
//! CycleScheduler (tick every 60s, plus once at startup)
//!   ├── list processes → Pair::resolve (skip tick on invariant violation)
//!   ├── FailoverGate::try_enter (skip tick while a failover is pending)
//!   └── spawned sample task
//!       ├── LogSampler::attach(active) → Verdict
//!       └── FailoverController::schedule_failover(pair) when warranted
//!           └── cooldown → stop active → settle → restart standby → reopen gate
//! ```
//!
//! Sampling runs may overlap across ticks; the failover sequence never
//! does. `FailoverGate` is the only shared mutable state.

pub mod controller;
pub mod gate;
pub mod sampler;
pub mod scheduler;

pub use controller::{FailoverController, FailoverReport, FailoverTimings};
pub use gate::FailoverGate;
pub use sampler::{LogSampler, SampleOutcome, SampleWindow, SamplerConfig, Verdict};
pub use scheduler::{CycleScheduler, SampleCycle, TickOutcome};
