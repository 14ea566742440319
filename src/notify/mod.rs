pub mod antiflutter;
pub mod discord;
pub mod email;
pub mod slack;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use self::discord::DiscordNotifier;
use self::email::EmailSender;
use self::slack::SlackNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Why the active source changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchKind {
    /// Error-threshold breach on the active source.
    Failover,
    /// Scheduled reconciliation found a better-scoring source.
    Reliability,
}

/// Outbound alert describing a source switch.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub kind: SwitchKind,
    pub from_source: Option<String>,
    pub to_source: String,
    pub message: String,
    pub ts: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, ev: &NotificationEvent) -> Result<()>;
}

/// Fan-out to every configured channel. Channels are enabled by env vars;
/// a send failure on one channel is logged and never blocks the others.
pub struct NotifierMux {
    notifiers: Vec<Box<dyn Notifier>>,
}

impl NotifierMux {
    pub fn from_env() -> Self {
        let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

        // Slack/Discord notifiers internally no-op when their webhook env
        // var is missing, so they are always registered.
        notifiers.push(Box::new(DiscordNotifier::from_env()));
        notifiers.push(Box::new(SlackNotifier::from_env()));

        if std::env::var("SMTP_HOST").is_ok() {
            notifiers.push(Box::new(EmailSender::from_env()));
        }

        Self { notifiers }
    }

    /// Optional builder for tests/tools
    pub fn with_notifiers(notifiers: Vec<Box<dyn Notifier>>) -> Self {
        Self { notifiers }
    }

    pub async fn notify(&self, ev: &NotificationEvent) {
        for n in &self.notifiers {
            if let Err(e) = n.send(ev).await {
                tracing::warn!(error = ?e, "notifier send failed");
            }
        }
    }
}

/// One entry in the in-memory notification inbox.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
    pub ts_unix: u64,
    pub read: bool,
}

/// Append-only, capped inbox backing the dashboard read path. The selector
/// only appends; `read` flips only through `mark_all_read`.
#[derive(Debug)]
pub struct NotificationCenter {
    inner: Mutex<Vec<Notification>>,
    cap: usize,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::with_capacity(500)
    }
}

impl NotificationCenter {
    pub fn with_capacity(cap: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::new()),
            cap: cap.min(10_000),
        }
    }

    pub fn push(&self, message: impl Into<String>, severity: Severity) {
        let mut v = self.inner.lock().expect("notification mutex poisoned");
        v.push(Notification {
            message: message.into(),
            severity,
            ts_unix: now_unix(),
            read: false,
        });
        if v.len() > self.cap {
            let excess = v.len() - self.cap;
            v.drain(0..excess);
        }
    }

    pub fn snapshot(&self) -> Vec<Notification> {
        self.inner
            .lock()
            .expect("notification mutex poisoned")
            .clone()
    }

    pub fn mark_all_read(&self) {
        let mut v = self.inner.lock().expect("notification mutex poisoned");
        for n in v.iter_mut() {
            n.read = true;
        }
    }

    pub fn unread_count(&self) -> usize {
        self.inner
            .lock()
            .expect("notification mutex poisoned")
            .iter()
            .filter(|n| !n.read)
            .count()
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl Notifier for Counting {
        async fn send(&self, _ev: &NotificationEvent) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Broken;

    #[async_trait::async_trait]
    impl Notifier for Broken {
        async fn send(&self, _ev: &NotificationEvent) -> Result<()> {
            anyhow::bail!("channel down")
        }
    }

    #[tokio::test]
    async fn mux_fans_out_past_a_broken_channel() {
        let delivered = Arc::new(AtomicUsize::new(0));
        let mux = NotifierMux::with_notifiers(vec![
            Box::new(Broken),
            Box::new(Counting(Arc::clone(&delivered))),
        ]);
        let ev = NotificationEvent {
            kind: SwitchKind::Failover,
            from_source: Some("a".into()),
            to_source: "b".into(),
            message: "switched".into(),
            ts: Utc::now(),
        };
        // A failing channel must not block the others (and must not panic).
        mux.notify(&ev).await;
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn center_caps_and_tracks_unread() {
        let c = NotificationCenter::with_capacity(3);
        for i in 0..5 {
            c.push(format!("n{i}"), Severity::Info);
        }
        let snap = c.snapshot();
        assert_eq!(snap.len(), 3);
        assert_eq!(snap[0].message, "n2");
        assert_eq!(c.unread_count(), 3);

        c.mark_all_read();
        assert_eq!(c.unread_count(), 0);
        c.push("late", Severity::Warning);
        assert_eq!(c.unread_count(), 1);
    }
}
