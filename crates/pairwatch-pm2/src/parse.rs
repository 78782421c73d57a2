//! Parsers for pm2's JSON output.

use serde::Deserialize;

use pairwatch_core::{LogLine, ProcessHandle, ProcessId, ProcessStatus};

#[derive(Debug, Deserialize)]
struct JlistEntry {
    pm_id: ProcessId,
    name: String,
    #[serde(default)]
    pm2_env: JlistEnv,
    #[serde(default)]
    monit: JlistMonit,
}

#[derive(Debug, Default, Deserialize)]
struct JlistEnv {
    #[serde(default)]
    status: String,
}

#[derive(Debug, Default, Deserialize)]
struct JlistMonit {
    #[serde(default)]
    memory: u64,
    #[serde(default)]
    cpu: f64,
}

impl From<JlistEntry> for ProcessHandle {
    fn from(entry: JlistEntry) -> Self {
        ProcessHandle {
            id: entry.pm_id,
            name: entry.name,
            status: ProcessStatus::from_supervisor(&entry.pm2_env.status),
            memory_bytes: entry.monit.memory,
            cpu_percent: entry.monit.cpu,
        }
    }
}

/// Parse `pm2 jlist` output.
///
/// pm2 may print banner lines (update notices, `[PM2] ...` daemon status)
/// before the JSON array. The array is taken from the first line that
/// starts with `[` and parses as a process list.
pub fn parse_process_list(output: &[u8]) -> Result<Vec<ProcessHandle>, serde_json::Error> {
    let mut last_err = None;
    for start in line_starts(output) {
        let rest = &output[start..];
        if rest.iter().find(|b| **b != b' ' && **b != b'\t') != Some(&b'[') {
            continue;
        }
        match serde_json::from_slice::<Vec<JlistEntry>>(rest) {
            Ok(entries) => return Ok(entries.into_iter().map(ProcessHandle::from).collect()),
            Err(e) => last_err = Some(e),
        }
    }
    match last_err {
        Some(e) => Err(e),
        None => serde_json::from_slice::<Vec<JlistEntry>>(output)
            .map(|entries| entries.into_iter().map(ProcessHandle::from).collect()),
    }
}

fn line_starts(output: &[u8]) -> impl Iterator<Item = usize> + '_ {
    std::iter::once(0).chain(
        output
            .iter()
            .enumerate()
            .filter(|(_, b)| **b == b'\n')
            .map(|(i, _)| i + 1),
    )
}

#[derive(Debug, Deserialize)]
struct LogRecord {
    message: String,
    #[serde(rename = "type", default)]
    kind: String,
    process_id: ProcessId,
}

/// Parse one line of `pm2 logs --json` output into a stdout `LogLine`.
///
/// Returns `None` for stderr records and anything that is not a log
/// record (pm2 interleaves plain-text status lines).
pub fn parse_log_record(line: &str) -> Option<LogLine> {
    let record: LogRecord = serde_json::from_str(line.trim()).ok()?;
    if record.kind != "out" {
        return None;
    }
    Some(LogLine::new(record.process_id, record.message))
}
