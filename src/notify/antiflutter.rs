// src/notify/antiflutter.rs
use chrono::{DateTime, Duration as ChronoDuration, Utc};

use super::SwitchKind;

/// Simple cooldown gate to prevent notification spam during failover storms.
/// - First alert always allowed.
/// - Inside cooldown, alerts are suppressed.
/// - State is updated explicitly via `record_alert` after a successful send.
///
/// Only the outbound channels (webhooks, email) are gated; the in-memory
/// notification center records every switch.
#[derive(Debug, Clone, Default)]
pub struct AntiFlutter {
    cooldown: ChronoDuration,
    last_alert_ts: Option<DateTime<Utc>>,
    last_kind: Option<SwitchKind>,
}

impl AntiFlutter {
    /// `cooldown_secs` < 0 is treated as 0 (no cooldown).
    pub fn new(cooldown_secs: i64) -> Self {
        let secs = cooldown_secs.max(0);
        Self {
            cooldown: ChronoDuration::seconds(secs),
            last_alert_ts: None,
            last_kind: None,
        }
    }

    /// Cooldown from `ALERT_COOLDOWN_SECS`, default 3h.
    pub fn from_env() -> Self {
        let cd_secs: i64 = std::env::var("ALERT_COOLDOWN_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10_800);
        Self::new(cd_secs)
    }

    /// Check if we may alert at `now` for `kind`. Does NOT mutate state.
    pub fn should_alert(&self, _kind: SwitchKind, now: DateTime<Utc>) -> bool {
        match self.last_alert_ts {
            None => true,
            Some(ts) => now.signed_duration_since(ts) >= self.cooldown,
        }
    }

    /// Record that an alert was sent at `now` for `kind`.
    pub fn record_alert(&mut self, kind: SwitchKind, now: DateTime<Utc>) {
        self.last_alert_ts = Some(now);
        self.last_kind = Some(kind);
    }

    #[cfg(test)]
    pub fn last_kind(&self) -> Option<SwitchKind> {
        self.last_kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn first_alert_passes() {
        let af = AntiFlutter::new(10_800);
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap();
        assert!(af.should_alert(SwitchKind::Failover, now));
    }

    #[test]
    fn inside_cooldown_blocked() {
        let mut af = AntiFlutter::new(10_800);
        let t0 = Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap();
        assert!(af.should_alert(SwitchKind::Failover, t0));
        af.record_alert(SwitchKind::Failover, t0);
        assert_eq!(af.last_kind(), Some(SwitchKind::Failover));
        let t1 = t0 + ChronoDuration::seconds(120);
        assert!(!af.should_alert(SwitchKind::Failover, t1));
    }

    #[test]
    fn after_cooldown_passes() {
        let mut af = AntiFlutter::new(10_800);
        let t0 = Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap();
        af.record_alert(SwitchKind::Failover, t0);
        let t_after = t0 + ChronoDuration::seconds(10_800 + 5);
        assert!(af.should_alert(SwitchKind::Reliability, t_after));
    }
}
