//! Periodic maintenance: stale-zone and expired-sweep eviction plus idle
//! instrument cleanup. Takes the same per-instrument locks as ingestion,
//! but only for O(zones) per instrument.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::watch;
use tokio::time::{interval, Duration};

use crate::pipeline::engine::MarketEngine;

pub async fn run_maintenance(
    engine: Arc<MarketEngine>,
    interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    log::info!("maintenance started (every {}s)", interval_secs);
    let mut timer = interval(Duration::from_secs(interval_secs.max(1)));
    // The first tick of a tokio interval fires immediately; skip it so the
    // first real pass happens one interval in.
    timer.tick().await;

    loop {
        tokio::select! {
            _ = timer.tick() => {
                let now = Utc::now().timestamp();
                let report = engine.maintain(now);
                log::info!(
                    "maintenance pass: {} stale zones, {} expired sweeps, {} idle instruments dropped",
                    report.stale_zones,
                    report.expired_sweeps,
                    report.dropped_instruments
                );
            }
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    log::info!("maintenance stopped");
}
