//! activity_log.rs — append-only, capped in-memory log of selector activity.
//!
//! The selector only appends; readers take snapshots. Capped at the last 100
//! entries so the sink never grows unbounded regardless of fetch cadence.

use serde::Serialize;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

pub const LOG_CAP: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub ts_unix: u64,
    pub level: LogLevel,
    pub message: String,
}

#[derive(Debug)]
pub struct ActivityLog {
    inner: Mutex<Vec<LogEntry>>,
    cap: usize,
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::with_capacity(LOG_CAP)
    }
}

impl ActivityLog {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::with_capacity(cap.min(10_000))),
            cap: cap.min(10_000),
        }
    }

    pub fn info(&self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.push(LogLevel::Warning, message.into());
    }

    pub fn error(&self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    fn push(&self, level: LogLevel, message: String) {
        let entry = LogEntry {
            ts_unix: now_unix(),
            level,
            message,
        };

        let mut v = self.inner.lock().expect("activity log mutex poisoned");
        v.push(entry);
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot_last_n(&self, n: usize) -> Vec<LogEntry> {
        let v = self.inner.lock().expect("activity log mutex poisoned");
        let len = v.len();
        let start = len.saturating_sub(n);
        v[start..].to_vec()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("activity log mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
