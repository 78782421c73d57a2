//! pairwatch-pm2 — a `ProcessSupervisor` backed by the `pm2` CLI.
//!
//! Every operation shells out to `pm2`:
//!
//! | operation | command |
//! |---|---|
//! | connect | `pm2 ping` |
//! | list | `pm2 jlist` |
//! | stop / restart | `pm2 stop <id>` / `pm2 restart <id>` |
//! | log bus | `pm2 logs --json --lines 0 --out` (long-running) |
//!
//! Each command is its own short-lived connection to the pm2 daemon, so
//! `disconnect` has nothing to release.

pub mod cli;
pub mod parse;

pub use cli::Pm2Cli;
pub use parse::{parse_log_record, parse_process_list};
