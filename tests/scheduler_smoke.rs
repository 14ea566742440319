// tests/scheduler_smoke.rs
use std::sync::Arc;
use std::time::Duration;

use quote_sentinel::config::SelectorConfig;
use quote_sentinel::providers::{QuoteProvider, ScriptedProvider};
use quote_sentinel::scheduler::{spawn_schedulers, SchedulerCfg};
use quote_sentinel::selector::SelectorService;
use quote_sentinel::sources::Source;

fn service() -> Arc<SelectorService> {
    let cfg = SelectorConfig::default();
    let providers: Vec<Arc<dyn QuoteProvider>> =
        vec![Arc::new(ScriptedProvider::ok("a", 123.0))];
    Arc::new(SelectorService::with_sources(
        &cfg,
        vec![Source::new("a", "A", 90.0)],
        providers,
    ))
}

#[tokio::test]
async fn fetch_timer_drives_the_selector() {
    let service = service();
    let handle = spawn_schedulers(
        Arc::clone(&service),
        SchedulerCfg {
            fetch_interval_secs: 1,
            reconcile_interval_secs: 3600,
        },
    );

    // The first fetch tick fires immediately.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(service.latest_value().await, Some(123.0));
    assert_eq!(service.active_source_id().await.as_deref(), Some("a"));

    handle.stop();
}

#[tokio::test]
async fn stop_cancels_both_timers() {
    let service = service();
    let handle = spawn_schedulers(
        Arc::clone(&service),
        SchedulerCfg {
            fetch_interval_secs: 1,
            reconcile_interval_secs: 1,
        },
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    handle.stop();
    // Abort is asynchronous; give the runtime a beat to reap the tasks.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(handle.is_stopped());

    // No further ticks mutate the selector after stop.
    let before = service.logs.len();
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(service.logs.len(), before);
}
