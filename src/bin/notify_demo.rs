//! Demo that pushes a few switch events through the multiplexer (stdout/log
//! only when channels are disabled).

use chrono::Utc;
use quote_sentinel::{NotificationEvent, NotifierMux, SwitchKind};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt().with_target(false).init();
    let mux = NotifierMux::from_env();

    let seq = [
        (SwitchKind::Failover, "primary-exchange", "institutional"),
        (SwitchKind::Reliability, "institutional", "primary-exchange"),
    ];

    for (kind, from, to) in seq {
        let ev = NotificationEvent {
            kind,
            from_source: Some(from.to_string()),
            to_source: to.to_string(),
            message: "demo switch".into(),
            ts: Utc::now(),
        };
        mux.notify(&ev).await;
        tokio::time::sleep(std::time::Duration::from_millis(400)).await;
    }

    println!("notify-demo done");
}
