// src/persist.rs
//
// Best-effort JSON snapshot of the selector state under `state/`. Losing a
// snapshot is acceptable (the host re-seeds from config); corrupting the
// process over one is not, so every failure here is warn-and-continue.

use std::path::Path;
use tokio::fs;

use crate::selector::SelectorSnapshot;

pub const DEFAULT_STATE_PATH: &str = "state/selector_state.json";

pub async fn read_snapshot(path: &Path) -> Option<SelectorSnapshot> {
    match fs::read_to_string(path).await {
        Ok(s) => match serde_json::from_str(&s) {
            Ok(snap) => Some(snap),
            Err(e) => {
                tracing::warn!(error = ?e, "state snapshot unparsable, ignoring");
                None
            }
        },
        Err(_) => None,
    }
}

pub async fn write_snapshot(path: &Path, snap: &SelectorSnapshot) {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            if let Err(e) = fs::create_dir_all(dir).await {
                tracing::warn!("state dir: {e:#}");
            }
        }
    }
    let bytes = serde_json::to_vec_pretty(snap).unwrap_or_default();
    if let Err(e) = fs::write(path, bytes).await {
        tracing::warn!("write state: {e:#}");
    }
}
