// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::scoring::ScoringWeights;
use crate::sources::{self, Source};

const ENV_PATH: &str = "SENTINEL_CONFIG_PATH";

/// Seed entry for one source. Runtime fields (status, counters, history) are
/// not configurable; they start from their initial values.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedSource {
    pub id: String,
    pub name: String,
    #[serde(default = "default_seed_trust")]
    pub trust_score: f64,
}

fn default_seed_trust() -> f64 {
    75.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectorConfig {
    /// Active-source poll cadence.
    #[serde(default = "default_fetch_interval")]
    pub fetch_interval_secs: u64,
    /// Full reconciliation sweep cadence.
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_secs: u64,
    /// Consecutive failures on the active source before failover.
    #[serde(default = "default_failover_threshold")]
    pub failover_threshold: u32,
    #[serde(default)]
    pub weights: ScoringWeights,
    #[serde(default)]
    pub sources: Vec<SeedSource>,
}

fn default_fetch_interval() -> u64 {
    30
}

fn default_reconcile_interval() -> u64 {
    2 * 3600
}

fn default_failover_threshold() -> u32 {
    3
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            fetch_interval_secs: default_fetch_interval(),
            reconcile_interval_secs: default_reconcile_interval(),
            failover_threshold: default_failover_threshold(),
            weights: ScoringWeights::default(),
            sources: Vec::new(),
        }
    }
}

impl SelectorConfig {
    /// Materialize the configured seed, falling back to the built-in list
    /// when the config names no sources.
    pub fn seed_sources(&self) -> Vec<Source> {
        if self.sources.is_empty() {
            return sources::default_seed();
        }
        self.sources
            .iter()
            .map(|s| Source::new(&s.id, &s.name, s.trust_score))
            .collect()
    }

    /// Load config from an explicit path. Supports TOML or JSON formats.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        parse_config(&content, ext.as_str())
    }

    /// Load config using env var + fallbacks:
    /// 1) $SENTINEL_CONFIG_PATH
    /// 2) config/sentinel.toml
    /// 3) config/sentinel.json
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            } else {
                return Err(anyhow!("SENTINEL_CONFIG_PATH points to non-existent path"));
            }
        }
        let toml_p = PathBuf::from("config/sentinel.toml");
        if toml_p.exists() {
            return Self::load_from(&toml_p);
        }
        let json_p = PathBuf::from("config/sentinel.json");
        if json_p.exists() {
            return Self::load_from(&json_p);
        }
        Ok(Self::default())
    }

    /// Like `load_default`, but a malformed config is never fatal: the error
    /// is logged and the built-in defaults are substituted.
    pub fn load_or_default() -> Self {
        match Self::load_default() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::warn!(error = ?e, "config load failed, using built-in defaults");
                Self::default()
            }
        }
    }
}

fn parse_config(s: &str, hint_ext: &str) -> Result<SelectorConfig> {
    // Try TOML first if hinted or content looks like toml.
    let try_toml = hint_ext == "toml" || s.contains("[[sources]]");
    if try_toml {
        if let Ok(v) = toml::from_str::<SelectorConfig>(s) {
            return Ok(v);
        }
    }
    // Try JSON
    if let Ok(v) = serde_json::from_str::<SelectorConfig>(s) {
        return Ok(v);
    }
    // Fallback: also try TOML if not attempted
    if !try_toml {
        if let Ok(v) = toml::from_str::<SelectorConfig>(s) {
            return Ok(v);
        }
    }
    Err(anyhow!("unsupported config format"))
}
