use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::{DueTransition, Engine};

/// Background task driving time-based booking transitions: a booking whose
/// window has opened becomes in-progress, one whose window has elapsed
/// becomes completed. The request/response engine never does this inline.
pub async fn run_housekeeping(engine: Arc<Engine>, interval: Duration) {
    let mut tick = tokio::time::interval(interval);
    loop {
        tick.tick().await;
        let now = crate::engine::now_ms();
        for transition in engine.collect_due_transitions(now) {
            let result = match transition {
                DueTransition::Start(id) => engine.mark_in_progress(id).await.map(|()| id),
                DueTransition::Complete(id) => engine.mark_completed(id).await.map(|()| id),
            };
            match result {
                Ok(id) => {
                    metrics::counter!(crate::observability::HOUSEKEEPING_TRANSITIONS_TOTAL)
                        .increment(1);
                    info!("housekeeping: {transition:?} applied to {id}");
                }
                Err(e) => {
                    // A concurrent cancel may have won — that's fine
                    tracing::debug!("housekeeping skip {transition:?}: {e}");
                }
            }
        }
    }
}

/// Background task that compacts the WAL once enough appends accumulate.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut tick = tokio::time::interval(Duration::from_secs(60));
    loop {
        tick.tick().await;
        if engine.wal_appends_since_compact().await >= threshold {
            match engine.compact_wal().await {
                Ok(()) => info!("WAL compacted"),
                Err(e) => warn!("WAL compaction failed: {e}"),
            }
        }
    }
}
