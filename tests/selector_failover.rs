// tests/selector_failover.rs
use std::sync::Arc;

use quote_sentinel::activity_log::LogLevel;
use quote_sentinel::config::SelectorConfig;
use quote_sentinel::notify::Severity;
use quote_sentinel::providers::{QuoteProvider, ScriptedProvider};
use quote_sentinel::selector::{FetchOutcome, SelectorService};
use quote_sentinel::sources::Source;

fn svc(sources: Vec<Source>, providers: Vec<Arc<dyn QuoteProvider>>) -> SelectorService {
    let cfg = SelectorConfig::default();
    SelectorService::with_sources(&cfg, sources, providers)
}

#[tokio::test]
async fn third_consecutive_failure_fails_over_to_best_healthy_backup() {
    // a is active (highest trust) and broken; c outranks b among backups.
    let service = svc(
        vec![
            Source::new("a", "A", 90.0),
            Source::new("b", "B", 80.0),
            Source::new("c", "C", 85.0),
        ],
        vec![
            Arc::new(ScriptedProvider::failing("a")),
            Arc::new(ScriptedProvider::ok("b", 10.0)),
            Arc::new(ScriptedProvider::ok("c", 20.0)),
        ],
    );

    assert!(matches!(
        service.fetch_active().await,
        FetchOutcome::Failed { error_count: 1, .. }
    ));
    assert!(matches!(
        service.fetch_active().await,
        FetchOutcome::Failed { error_count: 2, .. }
    ));
    // Threshold breach: switch and immediately read from the new source.
    let outcome = service.fetch_active().await;
    assert_eq!(
        outcome,
        FetchOutcome::Accepted {
            source_id: "c".into(),
            value: 20.0,
            switched: true,
        }
    );

    assert_eq!(service.active_source_id().await.as_deref(), Some("c"));
    let snap = service.snapshot().await;
    let a = snap.sources.iter().find(|s| s.id == "a").unwrap();
    assert_eq!(a.error_count, 3);
    let c = snap.sources.iter().find(|s| s.id == "c").unwrap();
    assert!(c.error_count < 3);

    // Exactly one switch notification, warning severity.
    let notes = service.notifications.snapshot();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].severity, Severity::Warning);
    assert!(notes[0].message.contains("switched from a to c"));
}

#[tokio::test]
async fn single_source_with_no_backup_stays_selected() {
    // Scenario: one source, three straight failures, nowhere to go.
    let service = svc(
        vec![Source::new("x", "X", 90.0)],
        vec![Arc::new(ScriptedProvider::failing("x"))],
    );

    service.fetch_active().await;
    service.fetch_active().await;
    let outcome = service.fetch_active().await;
    assert_eq!(
        outcome,
        FetchOutcome::Exhausted {
            source_id: "x".into()
        }
    );
    // No escalation: the source stays selected and keeps being retried;
    // every retry past the threshold re-attempts (and re-fails) failover.
    assert_eq!(service.active_source_id().await.as_deref(), Some("x"));
    assert_eq!(
        service.fetch_active().await,
        FetchOutcome::Exhausted {
            source_id: "x".into()
        }
    );
    let snap = service.snapshot().await;
    assert_eq!(snap.sources[0].error_count, 4);

    let errors: Vec<_> = service
        .logs
        .snapshot_last_n(100)
        .into_iter()
        .filter(|e| e.level == LogLevel::Error)
        .collect();
    assert!(errors
        .iter()
        .any(|e| e.message.contains("no healthy backup")));
    // No switch notification was emitted.
    assert!(service.notifications.snapshot().is_empty());
}

#[tokio::test]
async fn cascading_failures_exhaust_every_source_once() {
    // Everything is down; the selector should walk a → c → b (trust order)
    // and then stop switching.
    let service = svc(
        vec![
            Source::new("a", "A", 90.0),
            Source::new("b", "B", 70.0),
            Source::new("c", "C", 80.0),
        ],
        vec![
            Arc::new(ScriptedProvider::failing("a")),
            Arc::new(ScriptedProvider::failing("b")),
            Arc::new(ScriptedProvider::failing("c")),
        ],
    );

    // 2 plain failures, then each breach hops to the next-best healthy
    // source inside a single call until none are left.
    service.fetch_active().await;
    service.fetch_active().await;
    let outcome = service.fetch_active().await;
    assert!(matches!(outcome, FetchOutcome::Failed { ref source_id, error_count: 1 } if source_id == "c"));

    service.fetch_active().await;
    let outcome = service.fetch_active().await;
    assert!(matches!(outcome, FetchOutcome::Failed { ref source_id, error_count: 1 } if source_id == "b"));

    service.fetch_active().await;
    let outcome = service.fetch_active().await;
    assert_eq!(
        outcome,
        FetchOutcome::Exhausted {
            source_id: "b".into()
        }
    );
    assert_eq!(service.active_source_id().await.as_deref(), Some("b"));

    // Two failover notifications (a→c, c→b), none for the dead end.
    assert_eq!(service.notifications.snapshot().len(), 2);
}
