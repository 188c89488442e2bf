use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::session::SessionManager;
use crate::store::WalStore;

/// Background task that periodically drops expired session tokens.
/// Only spawned when a session TTL is configured.
pub async fn run_session_reaper(sessions: Arc<SessionManager>, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        let removed = sessions.purge_expired();
        if removed > 0 {
            info!(removed, "reaped expired sessions");
        }
    }
}

/// Background task that compacts the log once enough appends have piled up.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(30));
    loop {
        interval.tick().await;
        if compact_if_due(&store, threshold).await {
            debug!("compaction pass done");
        }
    }
}

/// Compact when at least `threshold` appends happened since the last rewrite.
pub async fn compact_if_due(store: &WalStore, threshold: u64) -> bool {
    let appends = store.appends_since_compact().await;
    if appends < threshold {
        return false;
    }
    match store.compact().await {
        Ok(()) => true,
        Err(e) => {
            warn!("compaction failed after {appends} appends: {e}");
            false
        }
    }
}
