//! In-memory process supervisor.
//!
//! Keeps a process table and a log bus in memory, records every call made
//! against it, and can be told to fail specific operations. Stopping a
//! process marks it `Stopped`; restarting marks it `Online`, so a full
//! failover flips the pair's roles just like a real supervisor would.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::{SupervisorError, SupervisorResult};
use crate::supervisor::{LogSubscription, ProcessSupervisor, SupervisorFuture};
use crate::types::{LogLine, ProcessHandle, ProcessId, ProcessStatus};

/// A call made against an `InMemorySupervisor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorCall {
    Connect,
    List,
    Stop(ProcessId),
    Restart(ProcessId),
    Disconnect,
    Subscribe,
}

#[derive(Default)]
struct Inner {
    processes: Vec<ProcessHandle>,
    calls: Vec<SupervisorCall>,
    /// Lines handed to the next subscriber as soon as it attaches.
    scripted: Vec<LogLine>,
    /// Senders of live subscriptions.
    subscribers: Vec<mpsc::Sender<LogLine>>,
    fail_connect: bool,
    fail_log_bus: bool,
    fail_list: bool,
    fail_stop: bool,
    fail_restart: bool,
}

/// Supervisor backed by in-memory state.
#[derive(Default)]
pub struct InMemorySupervisor {
    inner: Mutex<Inner>,
}

impl InMemorySupervisor {
    /// Create a supervisor with the given process table.
    pub fn new(processes: Vec<ProcessHandle>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                processes,
                ..Default::default()
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the process table.
    pub fn set_processes(&self, processes: Vec<ProcessHandle>) {
        self.inner().processes = processes;
    }

    /// Queue lines for the next subscriber. They are delivered in order
    /// the moment it subscribes.
    pub fn script_log_lines<I>(&self, lines: I)
    where
        I: IntoIterator<Item = LogLine>,
    {
        self.inner().scripted.extend(lines);
    }

    /// Publish a line to every live subscriber.
    pub fn emit_line(&self, line: LogLine) {
        let mut inner = self.inner();
        inner.subscribers.retain(|tx| !tx.is_closed());
        for tx in &inner.subscribers {
            if tx.try_send(line.clone()).is_err() {
                debug!(process_id = line.process_id, "subscriber full, line dropped");
            }
        }
    }

    /// Close the log bus for every live subscriber.
    pub fn close_log_bus(&self) {
        self.inner().subscribers.clear();
    }

    /// Number of subscriptions still attached.
    pub fn live_subscribers(&self) -> usize {
        let mut inner = self.inner();
        inner.subscribers.retain(|tx| !tx.is_closed());
        inner.subscribers.len()
    }

    pub fn fail_connect(&self, fail: bool) {
        self.inner().fail_connect = fail;
    }

    pub fn fail_log_bus(&self, fail: bool) {
        self.inner().fail_log_bus = fail;
    }

    pub fn fail_list(&self, fail: bool) {
        self.inner().fail_list = fail;
    }

    pub fn fail_stop(&self, fail: bool) {
        self.inner().fail_stop = fail;
    }

    pub fn fail_restart(&self, fail: bool) {
        self.inner().fail_restart = fail;
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<SupervisorCall> {
        self.inner().calls.clone()
    }

    /// How many recorded calls match `call`.
    pub fn call_count(&self, call: SupervisorCall) -> usize {
        self.inner().calls.iter().filter(|c| **c == call).count()
    }

    /// Number of stop or restart commands issued.
    pub fn command_count(&self) -> usize {
        self.inner()
            .calls
            .iter()
            .filter(|c| matches!(c, SupervisorCall::Stop(_) | SupervisorCall::Restart(_)))
            .count()
    }

    /// Current status of a process, if it exists.
    pub fn status_of(&self, id: ProcessId) -> Option<ProcessStatus> {
        self.inner()
            .processes
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.status.clone())
    }

    fn set_status(
        &self,
        command: &'static str,
        id: ProcessId,
        status: ProcessStatus,
    ) -> SupervisorResult<()> {
        let mut inner = self.inner();
        let process = inner.processes.iter_mut().find(|p| p.id == id).ok_or_else(|| {
            SupervisorError::Command {
                command,
                id,
                reason: "process not found".to_string(),
            }
        })?;
        process.status = status;
        Ok(())
    }
}

impl ProcessSupervisor for InMemorySupervisor {
    fn connect(&self) -> SupervisorFuture<'_, ()> {
        Box::pin(async move {
            let mut inner = self.inner();
            inner.calls.push(SupervisorCall::Connect);
            if inner.fail_connect {
                return Err(SupervisorError::Connection("daemon not reachable".into()));
            }
            Ok(())
        })
    }

    fn list_processes(&self) -> SupervisorFuture<'_, Vec<ProcessHandle>> {
        Box::pin(async move {
            let mut inner = self.inner();
            inner.calls.push(SupervisorCall::List);
            if inner.fail_list {
                return Err(SupervisorError::List("list request failed".into()));
            }
            Ok(inner.processes.clone())
        })
    }

    fn stop(&self, id: ProcessId) -> SupervisorFuture<'_, ()> {
        Box::pin(async move {
            let fail = {
                let mut inner = self.inner();
                inner.calls.push(SupervisorCall::Stop(id));
                inner.fail_stop
            };
            if fail {
                return Err(SupervisorError::Command {
                    command: "stop",
                    id,
                    reason: "injected failure".into(),
                });
            }
            self.set_status("stop", id, ProcessStatus::Stopped)
        })
    }

    fn restart(&self, id: ProcessId) -> SupervisorFuture<'_, ()> {
        Box::pin(async move {
            let fail = {
                let mut inner = self.inner();
                inner.calls.push(SupervisorCall::Restart(id));
                inner.fail_restart
            };
            if fail {
                return Err(SupervisorError::Command {
                    command: "restart",
                    id,
                    reason: "injected failure".into(),
                });
            }
            self.set_status("restart", id, ProcessStatus::Online)
        })
    }

    fn disconnect(&self) -> SupervisorFuture<'_, ()> {
        Box::pin(async move {
            self.inner().calls.push(SupervisorCall::Disconnect);
            Ok(())
        })
    }

    fn subscribe_log_lines(&self) -> SupervisorFuture<'_, LogSubscription> {
        Box::pin(async move {
            let mut inner = self.inner();
            inner.calls.push(SupervisorCall::Subscribe);
            if inner.fail_log_bus {
                return Err(SupervisorError::LogBus("bus not available".into()));
            }

            let (tx, subscription) = LogSubscription::channel();
            for line in inner.scripted.drain(..) {
                if tx.try_send(line).is_err() {
                    debug!("scripted line exceeds channel capacity, dropped");
                }
            }
            inner.subscribers.push(tx);
            Ok(subscription)
        })
    }
}
