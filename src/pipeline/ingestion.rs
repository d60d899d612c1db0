//! Ingestion loop: drains the tick channel into the engine, publishes
//! outbound frames, and flushes the persistence buffers on a timer.
//!
//! This is the only writer of market state and the only flush mechanism.
//! Persistence happens outside any instrument lock and never blocks or
//! fails tick processing.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{interval, Duration};

use crate::error::FlowError;
use crate::market::types::{Candle, Tick};
use crate::pipeline::db::MarketDbWriter;
use crate::pipeline::engine::{EngineEvent, MarketEngine};
use crate::transport::frames;

pub struct IngestionOptions {
    pub flush_interval_ms: u64,
    pub persist_raw_ticks: bool,
}

pub async fn run_ingestion(
    mut rx: mpsc::Receiver<Tick>,
    engine: Arc<MarketEngine>,
    db_writer: Arc<dyn MarketDbWriter>,
    publisher: broadcast::Sender<String>,
    options: IngestionOptions,
    mut shutdown: watch::Receiver<bool>,
) {
    log::info!(
        "ingestion started (flush every {}ms, raw ticks {})",
        options.flush_interval_ms,
        if options.persist_raw_ticks { "on" } else { "off" }
    );

    let mut flush_timer = interval(Duration::from_millis(options.flush_interval_ms.max(1)));
    let mut pending_candles: Vec<Candle> = Vec::new();
    let mut pending_ticks: Vec<Tick> = Vec::new();

    let mut tick_count = 0u64;
    let mut last_rate_log = Instant::now();

    loop {
        tokio::select! {
            maybe_tick = rx.recv() => {
                let tick = match maybe_tick {
                    Some(tick) => tick,
                    None => {
                        log::warn!("tick channel closed, stopping ingestion");
                        flush(&db_writer, &mut pending_candles, &mut pending_ticks).await;
                        break;
                    }
                };

                if options.persist_raw_ticks {
                    pending_ticks.push(tick.clone());
                }

                let (sealed, events) = engine.process_tick(tick);
                pending_candles.extend(sealed);

                for event in events {
                    let frame = match &event {
                        EngineEvent::SweepAlert { sweep, zone_strength } => {
                            frames::sweep_alert_frame(sweep, *zone_strength)
                        }
                        EngineEvent::Signal(signal) => frames::signal_frame(signal),
                    };
                    if publisher.send(frame).is_err() {
                        log::debug!("no subscribers for outbound frame");
                    }
                }

                tick_count += 1;
                if last_rate_log.elapsed().as_secs() >= 10 {
                    let rate = tick_count as f64 / last_rate_log.elapsed().as_secs_f64();
                    log::info!("ingestion rate: {:.1} ticks/sec", rate);
                    tick_count = 0;
                    last_rate_log = Instant::now();
                }
            }

            _ = flush_timer.tick() => {
                flush(&db_writer, &mut pending_candles, &mut pending_ticks).await;
            }

            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    log::info!("shutdown observed, final ingestion flush");
                    flush(&db_writer, &mut pending_candles, &mut pending_ticks).await;
                    break;
                }
            }
        }
    }

    log::info!("ingestion stopped");
}

/// Drain the persistence buffers. Failures are logged and the batch is
/// dropped; the audit trail is best-effort by contract.
async fn flush(
    db_writer: &Arc<dyn MarketDbWriter>,
    pending_candles: &mut Vec<Candle>,
    pending_ticks: &mut Vec<Tick>,
) {
    if !pending_candles.is_empty() {
        let batch = std::mem::take(pending_candles);
        let count = batch.len();
        match db_writer.write_candles(batch).await {
            Ok(()) => log::debug!("flushed {} sealed candles", count),
            Err(e) => log::error!(
                "{}",
                FlowError::TransientIo(format!("candle flush failed, {} dropped: {}", count, e))
            ),
        }
    }

    if !pending_ticks.is_empty() {
        let batch = std::mem::take(pending_ticks);
        let count = batch.len();
        match db_writer.write_ticks(batch).await {
            Ok(()) => log::debug!("flushed {} raw ticks", count),
            Err(e) => log::error!(
                "{}",
                FlowError::TransientIo(format!("tick flush failed, {} dropped: {}", count, e))
            ),
        }
    }
}
