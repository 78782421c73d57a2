//! The process supervisor port.
//!
//! The monitor never talks to a process manager directly. It drives a
//! `ProcessSupervisor`, which a backend (pm2, an in-memory fake, ...)
//! implements. Operations return boxed futures so the trait stays
//! object-safe and can be shared as `Arc<dyn ProcessSupervisor>`.

use std::future::Future;
use std::pin::Pin;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::SupervisorResult;
use crate::types::{LogLine, ProcessHandle, ProcessId};

/// Boxed future returned by every supervisor operation.
pub type SupervisorFuture<'a, T> =
    Pin<Box<dyn Future<Output = SupervisorResult<T>> + Send + 'a>>;

/// Capacity of the per-subscription line channel.
pub const LOG_CHANNEL_CAPACITY: usize = 1024;

/// Connect, list, stop, restart, and tail logs of supervised processes.
pub trait ProcessSupervisor: Send + Sync {
    /// Establish a connection to the supervisor daemon.
    fn connect(&self) -> SupervisorFuture<'_, ()>;

    /// List every process the supervisor knows about.
    fn list_processes(&self) -> SupervisorFuture<'_, Vec<ProcessHandle>>;

    /// Stop a process by handle.
    fn stop(&self, id: ProcessId) -> SupervisorFuture<'_, ()>;

    /// Restart (or start) a process by handle.
    fn restart(&self, id: ProcessId) -> SupervisorFuture<'_, ()>;

    /// Release the supervisor connection.
    fn disconnect(&self) -> SupervisorFuture<'_, ()>;

    /// Subscribe to the per-line stdout bus of all supervised processes.
    fn subscribe_log_lines(&self) -> SupervisorFuture<'_, LogSubscription>;
}

/// A live subscription to the log bus.
///
/// Lines arrive in order. Dropping the subscription, or calling
/// [`LogSubscription::unsubscribe`], tears it down: the channel is closed
/// and any reader task feeding it is aborted.
#[derive(Debug)]
pub struct LogSubscription {
    lines: mpsc::Receiver<LogLine>,
    reader: Option<JoinHandle<()>>,
}

impl LogSubscription {
    /// Create a bounded subscription channel with no reader task.
    pub fn channel() -> (mpsc::Sender<LogLine>, Self) {
        let (tx, rx) = mpsc::channel(LOG_CHANNEL_CAPACITY);
        (
            tx,
            Self {
                lines: rx,
                reader: None,
            },
        )
    }

    /// Attach the task that feeds this subscription so it is aborted on
    /// teardown.
    pub fn with_reader(mut self, reader: JoinHandle<()>) -> Self {
        self.reader = Some(reader);
        self
    }

    /// Next line from the bus, or `None` once the bus has closed.
    pub async fn next_line(&mut self) -> Option<LogLine> {
        self.lines.recv().await
    }

    /// Tear the subscription down.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for LogSubscription {
    fn drop(&mut self) {
        self.lines.close();
        if let Some(reader) = self.reader.take() {
            reader.abort();
            debug!("log subscription reader stopped");
        }
    }
}
