// src/scheduler.rs
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::config::SelectorConfig;
use crate::selector::SelectorService;

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub fetch_interval_secs: u64,
    pub reconcile_interval_secs: u64,
}

impl From<&SelectorConfig> for SchedulerCfg {
    fn from(cfg: &SelectorConfig) -> Self {
        Self {
            fetch_interval_secs: cfg.fetch_interval_secs,
            reconcile_interval_secs: cfg.reconcile_interval_secs,
        }
    }
}

/// Stop handle for the two selector timers. In-flight queries are not
/// cancelled explicitly; a late result is simply discarded with its task.
pub struct SchedulerHandle {
    fetch: JoinHandle<()>,
    reconcile: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn stop(&self) {
        self.fetch.abort();
        self.reconcile.abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.fetch.is_finished() && self.reconcile.is_finished()
    }
}

/// Spawn the fetch tick and the reconciliation tick as independent tasks.
/// Both mutate selector state only through the service's own mutex.
pub fn spawn_schedulers(service: Arc<SelectorService>, cfg: SchedulerCfg) -> SchedulerHandle {
    let fetch_service = Arc::clone(&service);
    let fetch = tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(cfg.fetch_interval_secs.max(1)));
        loop {
            ticker.tick().await;
            let outcome = fetch_service.fetch_active().await;
            tracing::debug!(?outcome, "fetch tick");
        }
    });

    let reconcile = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(
            cfg.reconcile_interval_secs.max(1),
        ));
        // The first tick of a tokio interval fires immediately; skip it so a
        // freshly started service does not sweep before the first fetch.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            service.reconcile_all().await;
            tracing::info!(target: "sentinel", "reconciliation sweep finished");
        }
    });

    SchedulerHandle { fetch, reconcile }
}
