//! Background garbage collection.
//!
//! Expired auth requests and codes are mostly deleted by the handlers that
//! consume them; this loop sweeps up the ones abandoned mid-flow. Handler
//! deletions race the sweep, which is fine: the storage reports `NotFound`
//! for rows deleted under it and counts only what it actually removed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::oneshot;

use portico_storage::Storage;

/// Runs the garbage-collection loop until `shutdown` fires.
pub async fn run(storage: Arc<dyn Storage>, every: Duration, mut shutdown: oneshot::Receiver<()>) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match storage.garbage_collect(Utc::now()).await {
                    Ok(result) if !result.is_empty() => {
                        tracing::info!(
                            auth_requests = result.auth_requests,
                            auth_codes = result.auth_codes,
                            "garbage collected expired grants"
                        );
                    }
                    Ok(_) => {}
                    Err(err) => tracing::error!("garbage collection failed: {err}"),
                }
            }
            _ = &mut shutdown => break,
        }
    }
}
