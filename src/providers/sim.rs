// src/providers/sim.rs
//
// Randomized stand-in for a real quote endpoint: variable latency, a flat
// failure rate, and a base value with noise. Stands behind `QuoteProvider`
// so the selector never knows it is simulated.

use anyhow::{anyhow, Result};
use rand::Rng;
use std::ops::Range;
use std::time::Duration;

use super::QuoteProvider;

pub struct SimulatedQuoteProvider {
    source_id: String,
    base_value: f64,
    /// Plus/minus band around `base_value`.
    noise: f64,
    /// Probability of a simulated fetch failure, [0.0, 1.0].
    failure_rate: f64,
    latency: Range<u64>,
}

impl SimulatedQuoteProvider {
    pub fn new(source_id: impl Into<String>, base_value: f64) -> Self {
        Self {
            source_id: source_id.into(),
            base_value,
            noise: base_value * 0.01,
            failure_rate: 0.10,
            latency: 100..2000,
        }
    }

    pub fn with_noise(mut self, noise: f64) -> Self {
        self.noise = noise.abs();
        self
    }

    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Latency band in milliseconds.
    pub fn with_latency_ms(mut self, range: Range<u64>) -> Self {
        self.latency = range;
        self
    }
}

#[async_trait::async_trait]
impl QuoteProvider for SimulatedQuoteProvider {
    async fn fetch_quote(&self) -> Result<f64> {
        let (delay_ms, fails, value) = {
            let mut rng = rand::rng();
            let delay_ms = if self.latency.is_empty() {
                self.latency.start
            } else {
                rng.random_range(self.latency.clone())
            };
            let fails = rng.random_bool(self.failure_rate);
            let value = self.base_value + rng.random_range(-self.noise..=self.noise);
            (delay_ms, fails, value)
        };

        tokio::time::sleep(Duration::from_millis(delay_ms)).await;

        if fails {
            return Err(anyhow!("simulated outage for {}", self.source_id));
        }
        Ok(value)
    }

    fn source_id(&self) -> &str {
        &self.source_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_failing_provider_errors() {
        let p = SimulatedQuoteProvider::new("sim", 100.0)
            .with_failure_rate(1.0)
            .with_latency_ms(0..1);
        assert!(p.fetch_quote().await.is_err());
    }

    #[tokio::test]
    async fn never_failing_provider_stays_in_noise_band() {
        let p = SimulatedQuoteProvider::new("sim", 100.0)
            .with_failure_rate(0.0)
            .with_noise(2.0)
            .with_latency_ms(0..1);
        for _ in 0..20 {
            let v = p.fetch_quote().await.expect("no failures configured");
            assert!((98.0..=102.0).contains(&v), "value out of band: {v}");
        }
    }
}
