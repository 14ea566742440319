//! sources.rs — Source records and the per-source status state machine.
//!
//! A `Source` is one external provider of a periodically sampled scalar
//! value. The selector recomputes `trust_score` after every scheduled check
//! and keeps `error_count` as a consecutive-failure counter. Which source is
//! currently read from is tracked by the selector (`active_source_id`), not
//! by a per-source flag.

use serde::{Deserialize, Serialize};

/// Observable per-source state.
///
/// `Inactive` only exists before the first query; once queried, a source is
/// always `Active` (last query succeeded) or `Error` (last query failed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Inactive,
    Active,
    Error,
}

/// One monitored data provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Stable identifier, unique within the set.
    pub id: String,
    /// Display label.
    pub name: String,
    /// Composite reliability score in [0, 100]; higher is better.
    pub trust_score: f64,
    /// Unix seconds of the most recent query attempt (success or failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_fetched: Option<u64>,
    /// Last successfully retrieved value; absent before the first success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_value: Option<f64>,
    pub status: SourceStatus,
    /// Consecutive failed-fetch counter; reset to 0 on success.
    pub error_count: u32,
    /// Latency of the most recent fetch attempt.
    pub response_time_ms: u64,
    /// Exponentially smoothed closeness to the cross-source average, [0, 100].
    pub history_agreement: f64,
}

impl Source {
    /// Fresh, never-queried source with a starting trust score.
    pub fn new(id: impl Into<String>, name: impl Into<String>, trust_score: f64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            trust_score: trust_score.clamp(0.0, 100.0),
            last_fetched: None,
            last_value: None,
            status: SourceStatus::Inactive,
            error_count: 0,
            response_time_ms: 0,
            history_agreement: trust_score.clamp(0.0, 100.0),
        }
    }

    /// Eligible as a failover target: not yet past the failure threshold.
    pub fn is_healthy(&self, failover_threshold: u32) -> bool {
        self.error_count < failover_threshold
    }
}

/// Built-in seed with common quote providers. Used as fallback if no config
/// is found or the persisted one is malformed.
pub fn default_seed() -> Vec<Source> {
    vec![
        Source::new("primary-exchange", "Primary Exchange Feed", 90.0),
        Source::new("institutional", "Institutional Aggregator", 85.0),
        Source::new("public-api", "Public Market API", 75.0),
        Source::new("community", "Community Mirror", 60.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_source_starts_inactive_and_clamped() {
        let s = Source::new("x", "X", 140.0);
        assert_eq!(s.status, SourceStatus::Inactive);
        assert_eq!(s.trust_score, 100.0);
        assert_eq!(s.error_count, 0);
        assert!(s.last_value.is_none());
    }

    #[test]
    fn healthy_respects_threshold() {
        let mut s = Source::new("x", "X", 80.0);
        assert!(s.is_healthy(3));
        s.error_count = 3;
        assert!(!s.is_healthy(3));
    }

    #[test]
    fn default_seed_has_unique_ids() {
        let seed = default_seed();
        let mut ids: Vec<_> = seed.iter().map(|s| s.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), seed.len());
    }
}
