//! End-to-end failover cycle tests.
//!
//! Drives `CycleScheduler` against an `InMemorySupervisor` with the clock
//! paused, so cooldown, settle, and sampler timeouts elapse instantly.

use std::io::{self, Write};
use std::sync::{Arc, Mutex, PoisonError};

use pairwatch_core::*;
use pairwatch_failover::*;

/// Collects formatted log output for the current thread.
#[derive(Clone, Default)]
struct LogCapture {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    fn install(&self) -> tracing::subscriber::DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_writer(self.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    fn count(&self, needle: &str) -> usize {
        let bytes = self.bytes.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).matches(needle).count()
    }
}

struct LogCaptureWriter {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            bytes: Arc::clone(&self.bytes),
        }
    }
}

fn handle(id: ProcessId, status: ProcessStatus) -> ProcessHandle {
    ProcessHandle {
        id,
        name: format!("miner-{id}"),
        status,
        memory_bytes: 128 * 1024 * 1024,
        cpu_percent: 12.5,
    }
}

fn blue_green() -> Arc<InMemorySupervisor> {
    Arc::new(InMemorySupervisor::new(vec![
        handle(1, ProcessStatus::Online),
        handle(2, ProcessStatus::Stopped),
    ]))
}

fn script(sup: &InMemorySupervisor, id: ProcessId, errors: usize, clean: usize) {
    let mut lines: Vec<LogLine> = (0..errors)
        .map(|i| LogLine::new(id, format!("[{i}] Error: share rejected")))
        .collect();
    lines.extend((0..clean).map(|i| LogLine::new(id, format!("[{i}] share accepted"))));
    sup.script_log_lines(lines);
}

fn scheduler(sup: &Arc<InMemorySupervisor>) -> CycleScheduler {
    CycleScheduler::new(sup.clone(), vec![1, 2], &MonitorConfig::default())
}

async fn sample(scheduler: &CycleScheduler) -> SampleCycle {
    match scheduler.tick().await {
        TickOutcome::Sampling(run) => run.await.unwrap().unwrap(),
        other => panic!("expected sampling, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn six_errors_fail_over_to_standby() {
    let sup = blue_green();
    script(&sup, 1, 6, 44);
    let scheduler = scheduler(&sup);

    let cycle = sample(&scheduler).await;
    assert_eq!(
        cycle.verdict,
        Verdict {
            process_id: 1,
            should_failover: true,
            error_count: 6,
            line_count: 50,
            outcome: SampleOutcome::Complete,
        }
    );

    let failover = cycle.failover.expect("failover scheduled");
    assert!(scheduler.gate().is_closed());

    let report = failover.await.unwrap();
    assert!(report.succeeded());
    assert_eq!(sup.call_count(SupervisorCall::Stop(1)), 1);
    assert_eq!(sup.call_count(SupervisorCall::Restart(2)), 1);
    assert!(scheduler.gate().try_enter());

    // The roles have swapped: the next tick samples process 2.
    script(&sup, 2, 0, 50);
    let cycle = sample(&scheduler).await;
    assert_eq!(cycle.verdict.process_id, 2);
    assert!(!cycle.verdict.should_failover);
}

#[tokio::test(start_paused = true)]
async fn five_errors_do_not_fail_over() {
    let sup = blue_green();
    script(&sup, 1, 5, 45);
    let scheduler = scheduler(&sup);

    let cycle = sample(&scheduler).await;
    assert!(!cycle.verdict.should_failover);
    assert_eq!(cycle.verdict.error_count, 5);
    assert_eq!(cycle.verdict.line_count, 50);
    assert!(cycle.failover.is_none());
    assert_eq!(sup.command_count(), 0);
    assert!(scheduler.gate().try_enter());
}

#[tokio::test(start_paused = true)]
async fn sampler_never_reads_past_budget() {
    let sup = blue_green();
    // Errors only appear after the first 50 lines.
    script(&sup, 1, 0, 50);
    script(&sup, 1, 100, 0);
    let scheduler = scheduler(&sup);

    let cycle = sample(&scheduler).await;
    assert_eq!(cycle.verdict.line_count, 50);
    assert_eq!(cycle.verdict.error_count, 0);
    assert!(cycle.failover.is_none());
}

#[tokio::test(start_paused = true)]
async fn tick_during_failover_is_paused() {
    let logs = LogCapture::default();
    let _guard = logs.install();
    let sup = blue_green();
    script(&sup, 1, 10, 40);
    let scheduler = scheduler(&sup);

    let cycle = sample(&scheduler).await;
    let failover = cycle.failover.expect("failover scheduled");
    let subscribes = sup.call_count(SupervisorCall::Subscribe);

    // The failover is still cooling down.
    assert!(matches!(scheduler.tick().await, TickOutcome::Paused));
    assert!(matches!(scheduler.tick().await, TickOutcome::Paused));
    assert_eq!(sup.call_count(SupervisorCall::Subscribe), subscribes);
    assert_eq!(logs.count("log check paused"), 2);

    failover.await.unwrap();
    assert!(matches!(scheduler.tick().await, TickOutcome::Sampling(_)));
}

#[tokio::test(start_paused = true)]
async fn overlapping_samples_schedule_one_failover() {
    let sup = blue_green();
    let scheduler = scheduler(&sup);

    // Two ticks attach before any lines arrive.
    let TickOutcome::Sampling(first) = scheduler.tick().await else {
        panic!("expected sampling");
    };
    let TickOutcome::Sampling(second) = scheduler.tick().await else {
        panic!("expected sampling");
    };
    while sup.live_subscribers() < 2 {
        tokio::task::yield_now().await;
    }

    for i in 0..50 {
        sup.emit_line(LogLine::new(1, format!("ERROR #{i}")));
    }

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    assert!(first.verdict.should_failover);
    assert!(second.verdict.should_failover);

    let scheduled: Vec<_> = [first.failover, second.failover]
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(scheduled.len(), 1);
    for failover in scheduled {
        failover.await.unwrap();
    }

    assert_eq!(sup.call_count(SupervisorCall::Stop(1)), 1);
    assert_eq!(sup.call_count(SupervisorCall::Restart(2)), 1);
}

#[tokio::test(start_paused = true)]
async fn two_actives_skip_tick() {
    let sup = Arc::new(InMemorySupervisor::new(vec![
        handle(1, ProcessStatus::Online),
        handle(2, ProcessStatus::Online),
    ]));
    let scheduler = scheduler(&sup);

    let outcome = scheduler.tick().await;
    assert!(matches!(outcome, TickOutcome::InvalidPair(PairError::MultipleActive)));
    assert_eq!(sup.call_count(SupervisorCall::Subscribe), 0);
    assert_eq!(sup.command_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failed_stop_self_heals_on_next_cycle() {
    let sup = blue_green();
    sup.fail_stop(true);
    script(&sup, 1, 20, 30);
    let scheduler = scheduler(&sup);

    let report = sample(&scheduler)
        .await
        .failover
        .expect("failover scheduled")
        .await
        .unwrap();
    assert!(report.error.is_some());
    assert!(scheduler.gate().try_enter());

    // Supervisor recovers; the next cycle re-evaluates and fails over.
    sup.fail_stop(false);
    script(&sup, 1, 20, 30);
    let report = sample(&scheduler)
        .await
        .failover
        .expect("failover scheduled")
        .await
        .unwrap();
    assert!(report.succeeded());
    assert_eq!(sup.status_of(2), Some(ProcessStatus::Online));
}

#[tokio::test(start_paused = true)]
async fn quiet_process_reports_incomplete_sample() {
    let sup = blue_green();
    script(&sup, 1, 12, 0);
    let scheduler = scheduler(&sup);

    let cycle = sample(&scheduler).await;
    assert_eq!(cycle.verdict.outcome, SampleOutcome::TimedOut);
    assert_eq!(cycle.verdict.error_count, 12);
    assert!(!cycle.verdict.should_failover);
    assert!(cycle.failover.is_none());
}
