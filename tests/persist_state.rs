// tests/persist_state.rs
use std::sync::Arc;

use quote_sentinel::config::SelectorConfig;
use quote_sentinel::persist;
use quote_sentinel::providers::{QuoteProvider, ScriptedProvider};
use quote_sentinel::selector::SelectorService;
use quote_sentinel::sources::Source;

fn providers() -> Vec<Arc<dyn QuoteProvider>> {
    vec![
        Arc::new(ScriptedProvider::ok("a", 100.0)),
        Arc::new(ScriptedProvider::ok("b", 100.0)),
    ]
}

fn seed() -> Vec<Source> {
    vec![Source::new("a", "A", 80.0), Source::new("b", "B", 90.0)]
}

#[tokio::test]
async fn snapshot_round_trips_through_disk() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("state").join("selector_state.json");

    let cfg = SelectorConfig::default();
    let service = SelectorService::with_sources(&cfg, seed(), providers())
        .with_snapshot_path(&path);
    service.fetch_active().await;
    service.reconcile_all().await;
    assert!(path.exists(), "sweep should write a snapshot");

    let snap = persist::read_snapshot(&path).await.expect("readable snapshot");
    assert_eq!(snap.sources.len(), 2);
    assert_eq!(snap.active_source_id.as_deref(), Some("b"));

    // A fresh service restores to the same active source.
    let restored = SelectorService::with_sources(&cfg, seed(), providers());
    restored.restore(snap).await;
    assert_eq!(restored.active_source_id().await.as_deref(), Some("b"));
    let restored_snap = restored.snapshot().await;
    assert_eq!(
        restored_snap.sources.iter().find(|s| s.id == "b").unwrap().last_value,
        Some(100.0)
    );
}

#[tokio::test]
async fn unreadable_snapshot_is_ignored() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("selector_state.json");
    tokio::fs::write(&path, "definitely not json").await.unwrap();
    assert!(persist::read_snapshot(&path).await.is_none());

    let missing = tmp.path().join("nope.json");
    assert!(persist::read_snapshot(&missing).await.is_none());
}
