//! # Rolling Window
//! Simple sliding window over accepted quote values (default 48h).
//!
//! Collects `(timestamp, value)` pairs and computes average/count over the
//! last window. This is informational only; failover decisions come from the
//! selector's trust scoring, never from this window.

use std::{
    collections::VecDeque,
    sync::Mutex,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// Thread-safe rolling time window over quote values.
#[derive(Debug)]
pub struct RollingWindow {
    inner: Mutex<Inner>,
    window: Duration,
}

#[derive(Debug)]
struct Inner {
    /// Stored samples as `(unix_seconds, value)`.
    buf: VecDeque<(u64, f64)>,
}

impl RollingWindow {
    /// Create a new rolling window with the given duration.
    pub fn with_window(window: Duration) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buf: VecDeque::new(),
            }),
            window,
        }
    }

    /// Convenience constructor for 48h window.
    pub fn new_48h() -> Self {
        Self::with_window(Duration::from_secs(48 * 3600))
    }

    /// Record a new accepted value. If `ts_unix` is `None`, current time is used.
    ///
    /// Automatically discards entries older than the window.
    pub fn record(&self, value: f64, ts_unix: Option<u64>) {
        let now = now_unix();
        let ts = ts_unix.unwrap_or(now);
        let cutoff = now.saturating_sub(self.window.as_secs());

        let mut inner = self.inner.lock().expect("rolling window mutex poisoned");

        inner.buf.push_back((ts, value));
        while let Some(&(t, _)) = inner.buf.front() {
            if t < cutoff {
                inner.buf.pop_front();
            } else {
                break;
            }
        }
    }

    /// Return the average value and number of samples within the window.
    pub fn average_and_count(&self) -> (f64, usize) {
        let now = now_unix();
        let cutoff = now.saturating_sub(self.window.as_secs());

        let inner = self.inner.lock().expect("rolling window mutex poisoned");
        let mut sum = 0.0f64;
        let mut n: usize = 0;

        for &(t, v) in inner.buf.iter().rev() {
            if t < cutoff {
                break; // older values are at the front; can stop early
            }
            sum += v;
            n += 1;
        }

        let avg = if n > 0 { sum / n as f64 } else { 0.0 };
        (avg, n)
    }

    /// Length of the window in seconds (useful for diagnostics/telemetry).
    pub fn window_secs(&self) -> u64 {
        self.window.as_secs()
    }
}

/// Current UNIX time in seconds.
fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0))
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_over_recent_samples() {
        let w = RollingWindow::new_48h();
        let now = now_unix();
        w.record(100.0, Some(now));
        w.record(102.0, Some(now));
        let (avg, n) = w.average_and_count();
        assert_eq!(n, 2);
        assert!((avg - 101.0).abs() < 1e-9);
    }

    #[test]
    fn old_samples_fall_out() {
        let w = RollingWindow::with_window(Duration::from_secs(60));
        let now = now_unix();
        w.record(50.0, Some(now.saturating_sub(3600)));
        w.record(100.0, Some(now));
        let (avg, n) = w.average_and_count();
        assert_eq!(n, 1);
        assert!((avg - 100.0).abs() < 1e-9);
    }

    #[test]
    fn empty_window_reports_zero() {
        let w = RollingWindow::new_48h();
        let (avg, n) = w.average_and_count();
        assert_eq!(n, 0);
        assert_eq!(avg, 0.0);
    }
}
