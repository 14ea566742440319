//! # Source Reliability Selector
//! Maintains a trust score per quote source, picks the best source to read
//! from, and fails over when the active source misbehaves.
//!
//! All selector state sits behind one async mutex: the
//! update-then-compare-then-switch sequence in `reconcile_all` is not
//! idempotent under interleaving, so mutation is serialized. Provider queries
//! themselves run outside the lock.
//!
//! Nothing here propagates a query error past the selector boundary; every
//! failure becomes a status transition plus log/notification entries.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use chrono::Utc;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::activity_log::ActivityLog;
use crate::config::SelectorConfig;
use crate::notify::antiflutter::AntiFlutter;
use crate::notify::{
    NotificationCenter, NotificationEvent, NotifierMux, Severity, SwitchKind,
};
use crate::providers::QuoteProvider;
use crate::rolling::RollingWindow;
use crate::scoring;
use crate::sources::{Source, SourceStatus};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sentinel_fetch_total", "Fetch attempts against the active source.");
        describe_counter!("sentinel_fetch_errors_total", "Failed fetch attempts.");
        describe_counter!("sentinel_failover_total", "Active-source switches after threshold breach.");
        describe_counter!(
            "sentinel_reconcile_runs_total",
            "Completed full reconciliation sweeps."
        );
        describe_gauge!(
            "sentinel_active_trust_score",
            "Trust score of the currently active source."
        );
        describe_gauge!(
            "sentinel_reconcile_last_run_ts",
            "Unix ts when the last sweep finished."
        );
    });
}

/// Outcome of one `fetch_active` call.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// A value was accepted, possibly after one or more failovers.
    Accepted {
        source_id: String,
        value: f64,
        switched: bool,
    },
    /// The query failed; threshold not reached, active source unchanged.
    Failed { source_id: String, error_count: u32 },
    /// Threshold breached and no healthy backup existed; the active source
    /// stays selected and keeps being retried at the normal cadence.
    Exhausted { source_id: String },
    /// No sources configured.
    NoSources,
}

/// Serializable view of the selector state (API responses, state snapshot).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSnapshot {
    pub sources: Vec<Source>,
    pub active_source_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_full_check_at: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_value: Option<f64>,
}

#[derive(Debug)]
struct SelectorState {
    sources: Vec<Source>,
    active_source_id: Option<String>,
    last_full_check_at: Option<u64>,
    last_value: Option<f64>,
}

pub struct SelectorService {
    state: Mutex<SelectorState>,
    providers: HashMap<String, Arc<dyn QuoteProvider>>,
    failover_threshold: u32,
    weights: scoring::ScoringWeights,
    pub logs: Arc<ActivityLog>,
    pub notifications: Arc<NotificationCenter>,
    pub rolling: Arc<RollingWindow>,
    mux: NotifierMux,
    alerts: std::sync::Mutex<AntiFlutter>,
    /// When set, a JSON snapshot is written here after every sweep.
    snapshot_path: Option<PathBuf>,
}

impl SelectorService {
    /// Seed from configuration. Providers are matched to sources by id; a
    /// source without a registered provider fails its fetches like any other
    /// query failure.
    pub fn new(cfg: &SelectorConfig, providers: Vec<Arc<dyn QuoteProvider>>) -> Self {
        Self::with_sources(cfg, cfg.seed_sources(), providers)
    }

    /// Seed from an explicit source list (startup restore path).
    pub fn with_sources(
        cfg: &SelectorConfig,
        sources: Vec<Source>,
        providers: Vec<Arc<dyn QuoteProvider>>,
    ) -> Self {
        ensure_metrics_described();

        let providers = providers
            .into_iter()
            .map(|p| (p.source_id().to_string(), p))
            .collect();

        Self {
            state: Mutex::new(SelectorState {
                sources,
                active_source_id: None,
                last_full_check_at: None,
                last_value: None,
            }),
            providers,
            failover_threshold: cfg.failover_threshold,
            weights: cfg.weights,
            logs: Arc::new(ActivityLog::default()),
            notifications: Arc::new(NotificationCenter::default()),
            rolling: Arc::new(RollingWindow::new_48h()),
            mux: NotifierMux::from_env(),
            alerts: std::sync::Mutex::new(AntiFlutter::from_env()),
            snapshot_path: None,
        }
    }

    /// Enable snapshot persistence after each sweep.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    /// Restore sources and active id from a previously written snapshot.
    pub async fn restore(&self, snap: SelectorSnapshot) {
        let mut st = self.state.lock().await;
        st.active_source_id = snap
            .active_source_id
            .filter(|id| snap.sources.iter().any(|s| &s.id == id));
        st.sources = snap.sources;
        st.last_full_check_at = snap.last_full_check_at;
        st.last_value = snap.last_value;
    }

    pub async fn snapshot(&self) -> SelectorSnapshot {
        let st = self.state.lock().await;
        SelectorSnapshot {
            sources: st.sources.clone(),
            active_source_id: st.active_source_id.clone(),
            last_full_check_at: st.last_full_check_at,
            last_value: st.last_value,
        }
    }

    pub async fn active_source_id(&self) -> Option<String> {
        self.state.lock().await.active_source_id.clone()
    }

    pub async fn latest_value(&self) -> Option<f64> {
        self.state.lock().await.last_value
    }

    /// Query the active source once. On success the value is accepted into
    /// the value sink; on the third consecutive failure the selector fails
    /// over to the best healthy backup and immediately retries there.
    pub async fn fetch_active(&self) -> FetchOutcome {
        let mut switched = false;

        loop {
            let (source_id, provider) = {
                let mut st = self.state.lock().await;
                if st.sources.is_empty() {
                    self.logs.error("fetch requested with no sources configured");
                    return FetchOutcome::NoSources;
                }
                let id = match &st.active_source_id {
                    Some(id) => id.clone(),
                    None => {
                        let id = best_by_trust(&st.sources).to_string();
                        st.active_source_id = Some(id.clone());
                        self.logs.info(format!("selected initial source {id}"));
                        id
                    }
                };
                (id.clone(), self.providers.get(&id).cloned())
            };

            counter!("sentinel_fetch_total").increment(1);

            let started = Instant::now();
            let result = match &provider {
                Some(p) => p.fetch_quote().await,
                None => Err(anyhow::anyhow!("no provider registered for {source_id}")),
            };
            let elapsed_ms = started.elapsed().as_millis() as u64;

            let mut st = self.state.lock().await;
            let now = now_unix();
            let Some(src) = st.sources.iter_mut().find(|s| s.id == source_id) else {
                // Source set never shrinks at runtime; a miss here means the
                // active id was restored from a stale snapshot.
                st.active_source_id = None;
                continue;
            };
            src.last_fetched = Some(now);
            src.response_time_ms = elapsed_ms;

            match result {
                Ok(value) => {
                    src.status = SourceStatus::Active;
                    src.error_count = 0;
                    src.last_value = Some(value);
                    let name = src.name.clone();
                    st.last_value = Some(value);
                    drop(st);

                    self.rolling.record(value, None);
                    self.refresh_trust_gauge().await;
                    self.logs
                        .info(format!("{name}: accepted {value:.4} in {elapsed_ms}ms"));
                    return FetchOutcome::Accepted {
                        source_id,
                        value,
                        switched,
                    };
                }
                Err(e) => {
                    src.error_count += 1;
                    src.status = SourceStatus::Error;
                    let error_count = src.error_count;
                    counter!("sentinel_fetch_errors_total").increment(1);
                    self.logs.warning(format!(
                        "{source_id}: fetch failed ({error_count} consecutive): {e:#}"
                    ));

                    if error_count < self.failover_threshold {
                        return FetchOutcome::Failed {
                            source_id,
                            error_count,
                        };
                    }

                    // Threshold breached: try to fail over. Each exhausted
                    // source leaves the candidate set, so this loop is
                    // bounded by the number of sources.
                    match pick_backup(&st.sources, &source_id, self.failover_threshold) {
                        Some(next_id) => {
                            let from = source_id.clone();
                            st.active_source_id = Some(next_id.clone());
                            drop(st);

                            counter!("sentinel_failover_total").increment(1);
                            switched = true;
                            let message = format!(
                                "switched from {from} to {next_id} after {error_count} consecutive failures"
                            );
                            self.logs.warning(message.clone());
                            self.notifications.push(message.clone(), Severity::Warning);
                            self.emit_switch_alert(NotificationEvent {
                                kind: SwitchKind::Failover,
                                from_source: Some(from),
                                to_source: next_id,
                                message,
                                ts: Utc::now(),
                            })
                            .await;
                            continue;
                        }
                        None => {
                            drop(st);
                            // Observed edge case, not a designed policy: no
                            // escalation, the active source stays selected.
                            self.logs.error(format!(
                                "{source_id}: no healthy backup source available"
                            ));
                            return FetchOutcome::Exhausted { source_id };
                        }
                    }
                }
            }
        }
    }

    /// Full sweep: query every source, rescore all of them against the
    /// sweep's cross-source average, then re-pick the best source. A switch
    /// here is driven by relative ranking, not failure.
    pub async fn reconcile_all(&self) {
        let jobs: Vec<(String, Option<Arc<dyn QuoteProvider>>)> = {
            let st = self.state.lock().await;
            st.sources
                .iter()
                .map(|s| (s.id.clone(), self.providers.get(&s.id).cloned()))
                .collect()
        };

        // Queries race concurrently; aggregation waits for every completion
        // so the cross-source average covers the whole sweep.
        let mut handles = Vec::with_capacity(jobs.len());
        for (id, provider) in jobs {
            handles.push(tokio::spawn(async move {
                let started = Instant::now();
                let result = match &provider {
                    Some(p) => p.fetch_quote().await,
                    None => Err(anyhow::anyhow!("no provider registered for {id}")),
                };
                (id, started.elapsed().as_millis() as u64, result)
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for h in handles {
            match h.await {
                Ok(o) => outcomes.push(o),
                Err(e) => tracing::warn!(error = ?e, "reconcile query task panicked"),
            }
        }

        let mut st = self.state.lock().await;
        let now = now_unix();

        // Pass 1: apply raw outcomes, remembering the error count each
        // success carried into the sweep so it still drags the score once.
        let mut successes: Vec<(usize, f64, u32)> = Vec::new();
        for (id, elapsed_ms, result) in outcomes {
            let Some(idx) = st.sources.iter().position(|s| s.id == id) else {
                continue;
            };
            let src = &mut st.sources[idx];
            src.last_fetched = Some(now);
            src.response_time_ms = elapsed_ms;
            match result {
                Ok(value) => {
                    let carried_errors = src.error_count;
                    src.status = SourceStatus::Active;
                    src.error_count = 0;
                    src.last_value = Some(value);
                    successes.push((idx, value, carried_errors));
                }
                Err(e) => {
                    src.error_count += 1;
                    src.status = SourceStatus::Error;
                    self.logs
                        .warning(format!("{id}: reconcile fetch failed: {e:#}"));
                }
            }
        }

        // Pass 2: agreement against the sweep average, then the composite.
        if !successes.is_empty() {
            let cross_avg =
                successes.iter().map(|(_, v, _)| *v).sum::<f64>() / successes.len() as f64;
            for (idx, value, carried_errors) in &successes {
                let src = &mut st.sources[*idx];
                let agreement = scoring::agreement_score(*value, cross_avg);
                src.history_agreement =
                    self.weights.smooth_agreement(src.history_agreement, agreement);
                src.trust_score = self.weights.trust_score(
                    src.history_agreement,
                    src.response_time_ms,
                    *carried_errors,
                );
            }
        }

        st.last_full_check_at = Some(now);

        // Re-pick the best source; ties keep the current active.
        let previous = st.active_source_id.clone();
        let best = best_with_incumbent(&st.sources, previous.as_deref()).map(str::to_string);
        let switch = match (&previous, &best) {
            (Some(prev), Some(next)) if prev != next => true,
            (None, Some(_)) => true,
            _ => false,
        };

        if let Some(next_id) = best {
            let trust = st
                .sources
                .iter()
                .find(|s| s.id == next_id)
                .map(|s| s.trust_score)
                .unwrap_or_default();
            if switch {
                st.active_source_id = Some(next_id.clone());
                drop(st);
                let message = format!(
                    "switched to {next_id} based on reliability analysis (trust {trust:.1})"
                );
                self.logs.info(message.clone());
                self.notifications.push(message.clone(), Severity::Info);
                self.emit_switch_alert(NotificationEvent {
                    kind: SwitchKind::Reliability,
                    from_source: previous,
                    to_source: next_id,
                    message,
                    ts: Utc::now(),
                })
                .await;
            } else {
                drop(st);
                self.logs.info(format!(
                    "reconcile kept {next_id} as active (trust {trust:.1})"
                ));
            }
        } else {
            drop(st);
        }

        counter!("sentinel_reconcile_runs_total").increment(1);
        gauge!("sentinel_reconcile_last_run_ts").set(now as f64);
        self.refresh_trust_gauge().await;

        if let Some(path) = &self.snapshot_path {
            let snap = self.snapshot().await;
            crate::persist::write_snapshot(path, &snap).await;
        }
    }

    async fn refresh_trust_gauge(&self) {
        let st = self.state.lock().await;
        if let Some(id) = &st.active_source_id {
            if let Some(src) = st.sources.iter().find(|s| &s.id == id) {
                gauge!("sentinel_active_trust_score").set(src.trust_score);
            }
        }
    }

    /// Outbound channels only; the in-memory center is never gated.
    async fn emit_switch_alert(&self, ev: NotificationEvent) {
        let allowed = {
            let mut af = self.alerts.lock().expect("antiflutter mutex poisoned");
            if af.should_alert(ev.kind, ev.ts) {
                af.record_alert(ev.kind, ev.ts);
                true
            } else {
                false
            }
        };
        if allowed {
            self.mux.notify(&ev).await;
        } else {
            tracing::debug!(kind = ?ev.kind, "switch alert suppressed by cooldown");
        }
    }
}

/// Highest trust score, ties broken by list order.
fn best_by_trust(sources: &[Source]) -> &str {
    let mut best = &sources[0];
    for s in &sources[1..] {
        if s.trust_score > best.trust_score {
            best = s;
        }
    }
    &best.id
}

/// Highest trust score, but the incumbent wins ties: scanning starts from its
/// score, and only a strictly greater one displaces it.
fn best_with_incumbent<'a>(sources: &'a [Source], incumbent: Option<&str>) -> Option<&'a str> {
    if sources.is_empty() {
        return None;
    }
    let mut best_idx = incumbent
        .and_then(|id| sources.iter().position(|s| s.id == id))
        .unwrap_or(0);
    let mut best_trust = sources[best_idx].trust_score;
    for (i, s) in sources.iter().enumerate() {
        if s.trust_score > best_trust {
            best_idx = i;
            best_trust = s.trust_score;
        }
    }
    Some(&sources[best_idx].id)
}

/// Best healthy source excluding the one being abandoned.
fn pick_backup(sources: &[Source], exclude: &str, threshold: u32) -> Option<String> {
    let mut best: Option<&Source> = None;
    for s in sources {
        if s.id == exclude || !s.is_healthy(threshold) {
            continue;
        }
        match best {
            Some(b) if s.trust_score <= b.trust_score => {}
            _ => best = Some(s),
        }
    }
    best.map(|s| s.id.clone())
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
