//! scoring.rs — Pure trust-score arithmetic.
//!
//! Fast components, no I/O:
//!   - `response_time_score`: latency mapped onto [0, 100] (2 s ⇒ 0).
//!   - `error_rate_score`: 10 points off per consecutive failure.
//!   - `agreement_score`: closeness to the cross-source average.
//! Blending weights and the smoothing factor are configuration, with the
//! historically observed values as serde defaults.

use serde::{Deserialize, Serialize};

/// Latency at or beyond which the response-time component bottoms out.
const RESPONSE_TIME_FLOOR_MS: f64 = 2000.0;

/// Deviation from the cross-source mean at which agreement reaches 0.
const MAX_DEVIATION: f64 = 100.0;

/// Blending weights for the composite trust score plus the smoothing factor
/// for the agreement history. All tunable without recompilation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Weight of the smoothed peer-agreement history.
    #[serde(default = "default_w_agreement")]
    pub agreement: f64,
    /// Weight of the response-time component.
    #[serde(default = "default_w_latency")]
    pub latency: f64,
    /// Weight of the consecutive-error component.
    #[serde(default = "default_w_error")]
    pub error_rate: f64,
    /// Portion of the old `history_agreement` kept on each sweep.
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
}

fn default_w_agreement() -> f64 {
    0.4
}
fn default_w_latency() -> f64 {
    0.2
}
fn default_w_error() -> f64 {
    0.4
}
fn default_smoothing() -> f64 {
    0.8
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            agreement: default_w_agreement(),
            latency: default_w_latency(),
            error_rate: default_w_error(),
            smoothing: default_smoothing(),
        }
    }
}

impl ScoringWeights {
    /// Composite trust score in [0, 100].
    pub fn trust_score(
        &self,
        history_agreement: f64,
        response_time_ms: u64,
        error_count: u32,
    ) -> f64 {
        clamp100(
            history_agreement * self.agreement
                + response_time_score(response_time_ms) * self.latency
                + error_rate_score(error_count) * self.error_rate,
        )
    }

    /// Fold one sweep's agreement sample into the smoothed history.
    pub fn smooth_agreement(&self, history: f64, sample: f64) -> f64 {
        clamp100(history * self.smoothing + sample * (1.0 - self.smoothing))
    }
}

/// 0 ms ⇒ 100, 2000 ms and beyond ⇒ 0, linear in between.
pub fn response_time_score(response_time_ms: u64) -> f64 {
    clamp100(100.0 - (response_time_ms as f64) / RESPONSE_TIME_FLOOR_MS * 100.0)
}

/// Each consecutive failure costs 10 points; 10+ failures ⇒ 0.
pub fn error_rate_score(error_count: u32) -> f64 {
    clamp100(100.0 - (error_count as f64) * 10.0)
}

/// Agreement of one value with the cross-source mean of its sweep.
pub fn agreement_score(value: f64, cross_source_average: f64) -> f64 {
    let deviation = (value - cross_source_average).abs();
    clamp100(100.0 - deviation / MAX_DEVIATION * 100.0)
}

/// Clamp to [0.0, 100.0].
pub fn clamp100(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_time_endpoints() {
        assert_eq!(response_time_score(0), 100.0);
        assert_eq!(response_time_score(2000), 0.0);
        assert_eq!(response_time_score(5000), 0.0);
        let mid = response_time_score(1000);
        assert!((mid - 50.0).abs() < 1e-9);
    }

    #[test]
    fn error_rate_steps() {
        assert_eq!(error_rate_score(0), 100.0);
        assert_eq!(error_rate_score(3), 70.0);
        assert_eq!(error_rate_score(10), 0.0);
        assert_eq!(error_rate_score(42), 0.0);
    }

    #[test]
    fn agreement_at_mean_is_perfect() {
        assert_eq!(agreement_score(101.5, 101.5), 100.0);
        assert_eq!(agreement_score(0.0, 100.0), 0.0);
        // Beyond the deviation cap agreement stays clamped at zero.
        assert_eq!(agreement_score(0.0, 500.0), 0.0);
    }

    #[test]
    fn trust_score_stays_in_bounds() {
        let w = ScoringWeights::default();
        for history in [0.0, 37.5, 100.0] {
            for ms in [0u64, 900, 2000, 9999] {
                for errs in [0u32, 1, 3, 12] {
                    let t = w.trust_score(history, ms, errs);
                    assert!((0.0..=100.0).contains(&t), "out of bounds: {t}");
                }
            }
        }
    }

    #[test]
    fn smoothing_moves_toward_sample() {
        let w = ScoringWeights::default();
        let out = w.smooth_agreement(100.0, 0.0);
        assert!((out - 80.0).abs() < 1e-9);
        let again = w.smooth_agreement(out, 0.0);
        assert!(again < out);
    }

    #[test]
    fn default_weights_match_observed_constants() {
        let w = ScoringWeights::default();
        assert_eq!((w.agreement, w.latency, w.error_rate), (0.4, 0.2, 0.4));
        assert_eq!(w.smoothing, 0.8);
    }
}
