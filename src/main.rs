//! Quote Sentinel — Binary Entrypoint
//! Boots the selector service, its two timers, and the Axum read surface.

use std::path::Path;
use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quote_sentinel::api::{self, AppState};
use quote_sentinel::config::SelectorConfig;
use quote_sentinel::metrics::Metrics;
use quote_sentinel::persist;
use quote_sentinel::providers::{sim::SimulatedQuoteProvider, QuoteProvider};
use quote_sentinel::scheduler::{spawn_schedulers, SchedulerCfg};
use quote_sentinel::selector::SelectorService;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("quote_sentinel=info,sentinel=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = SelectorConfig::load_or_default();
    let metrics = Metrics::init(cfg.fetch_interval_secs);

    // One simulated endpoint per seeded source until real endpoints are
    // configured; the selector never knows the difference.
    let base: f64 = std::env::var("SENTINEL_BASE_VALUE")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(100.0);
    let providers: Vec<Arc<dyn QuoteProvider>> = cfg
        .seed_sources()
        .iter()
        .map(|s| {
            Arc::new(SimulatedQuoteProvider::new(s.id.clone(), base)) as Arc<dyn QuoteProvider>
        })
        .collect();

    let service = Arc::new(
        SelectorService::new(&cfg, providers).with_snapshot_path(persist::DEFAULT_STATE_PATH),
    );

    if let Some(snap) = persist::read_snapshot(Path::new(persist::DEFAULT_STATE_PATH)).await {
        service.restore(snap).await;
        tracing::info!("restored selector state snapshot");
    }

    let scheduler = spawn_schedulers(Arc::clone(&service), SchedulerCfg::from(&cfg));

    let app = api::create_router(AppState { service }).merge(metrics.router());
    let addr = std::env::var("SENTINEL_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "quote-sentinel listening");

    axum::serve(listener, app).await?;

    scheduler.stop();
    Ok(())
}
