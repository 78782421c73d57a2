//! pairwatch-core — shared types for the blue/green log monitor.
//!
//! Holds the data model (`ProcessHandle`, `Pair`, `LogLine`), the
//! `ProcessSupervisor` port that every supervisor backend implements,
//! the error taxonomy, and the monitor configuration.
//!
//! `InMemorySupervisor` is a scripted, call-recording supervisor used by
//! tests and local demos in place of a real process manager.

pub mod config;
pub mod error;
pub mod memory;
pub mod supervisor;
pub mod types;

pub use config::MonitorConfig;
pub use error::{ConfigError, PairError, SupervisorError, SupervisorResult};
pub use memory::{InMemorySupervisor, SupervisorCall};
pub use supervisor::{LogSubscription, ProcessSupervisor, SupervisorFuture};
pub use types::*;
