//! In-memory connection log.
//!
//! Keeps the most recent connection events so the unreachable page can show
//! what happened. Every entry is also emitted through `tracing`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use common::models::DbKind;
use serde::Serialize;

/// Maximum number of retained entries.
pub const MAX_ENTRIES: usize = 100;

/// One connection log line.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub time: String,
    pub msg: String,
    pub is_error: bool,
}

/// Bounded connection log shared across requests.
#[derive(Debug, Default)]
pub struct ConnectionLog {
    entries: Mutex<VecDeque<LogEntry>>,
    ping_ok_logged: AtomicBool,
}

impl ConnectionLog {
    pub fn info(&self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::info!(target: "db", "{msg}");
        self.push(msg, false);
    }

    pub fn error(&self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::warn!(target: "db", "{msg}");
        self.push(msg, true);
    }

    /// Records the first successful ping only.
    pub fn ping_ok(&self, kind: DbKind) {
        if !self.ping_ok_logged.swap(true, Ordering::Relaxed) {
            self.info(format!("Ping OK ({kind})"));
        }
    }

    /// Snapshot of the retained entries, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    fn push(&self, msg: String, is_error: bool) {
        let entry = LogEntry {
            time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            msg,
            is_error,
        };
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push_back(entry);
        while entries.len() > MAX_ENTRIES {
            entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_is_bounded() {
        let log = ConnectionLog::default();
        for i in 0..(MAX_ENTRIES + 25) {
            log.info(format!("entry {i}"));
        }
        let entries = log.entries();
        assert_eq!(entries.len(), MAX_ENTRIES);
        assert_eq!(entries[0].msg, "entry 25");
        assert_eq!(entries.last().unwrap().msg, format!("entry {}", MAX_ENTRIES + 24));
    }

    #[test]
    fn test_ping_ok_logged_once() {
        let log = ConnectionLog::default();
        log.ping_ok(DbKind::MySql);
        log.ping_ok(DbKind::MySql);
        let entries = log.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].msg, "Ping OK (MYSQL)");
        assert!(!entries[0].is_error);
    }

    #[test]
    fn test_error_entries_are_flagged() {
        let log = ConnectionLog::default();
        log.error("Connect failed: refused");
        assert!(log.entries()[0].is_error);
    }
}
