use std::sync::Weak;
use std::time::Duration;

use tracing::{info, warn};

use crate::engine::{Engine, EngineError};

/// Rewrite the tenant's WAL once it has grown by `threshold` appends.
/// Returns whether a compaction ran.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> Result<bool, EngineError> {
    let appends = engine.wal_appends_since_compact().await;
    if appends < threshold {
        return Ok(false);
    }
    engine.compact_wal().await?;
    info!(tenant = %engine.tenant_id(), appends, "compacted WAL");
    Ok(true)
}

/// Background task: check every `every`, stop once the engine is gone.
pub async fn run_compactor(engine: Weak<Engine>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(engine) = engine.upgrade() else {
            return;
        };
        match compact_if_needed(&engine, threshold).await {
            Ok(true) => {
                metrics::counter!(crate::observability::COMPACTIONS_TOTAL, "status" => "ok").increment(1);
            }
            Ok(false) => {}
            Err(e) => {
                metrics::counter!(crate::observability::COMPACTIONS_TOTAL, "status" => "error").increment(1);
                warn!(tenant = %engine.tenant_id(), "WAL compaction failed: {e}");
            }
        }
    }
}
