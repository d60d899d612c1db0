//! Production runtime: wires the feed client, ingestion pipeline, transport
//! servers and maintenance loop together.
//!
//! Usage:
//!   cargo run --release --bin runtime
//!
//! Environment variables:
//!   FEED_WS_URL               - upstream tick feed (required)
//!   PUBLISH_BIND_ADDR         - alert/signal broadcast bind (default 0.0.0.0:9301)
//!   QUERY_BIND_ADDR           - scoring query bind (default 0.0.0.0:9302)
//!   TICKFLOW_DB_PATH          - SQLite path (default tickflow.db)
//!   TICK_CHANNEL_BUFFER       - feed channel capacity (default 10000)
//!   FLUSH_INTERVAL_MS         - persistence flush interval (default 5000)
//!   MAINTENANCE_INTERVAL_SECS - maintenance pass interval (default 300)
//!   PERSIST_RAW_TICKS         - also persist raw ticks (default false)
//!   SIGNAL_MIN_GAP_SECS / SIGNAL_DAILY_CAP - emission limits

use std::sync::Arc;

use dotenv::dotenv;
use log::{error, info};
use rusqlite::Connection;
use tokio::sync::{broadcast, mpsc, watch};

use tickflow::config::{DetectorConfig, RuntimeConfig};
use tickflow::feed::run_feed;
use tickflow::market::types::Tick;
use tickflow::pipeline::db::{run_schema_migrations, MarketDbWriter, SqliteMarketWriter};
use tickflow::pipeline::engine::MarketEngine;
use tickflow::pipeline::ingestion::{run_ingestion, IngestionOptions};
use tickflow::pipeline::maintenance::run_maintenance;
use tickflow::transport::publish::run_publish_server;
use tickflow::transport::query::run_query_server;

const OUTBOUND_BUFFER: usize = 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Stderr)
        .init();

    let config = RuntimeConfig::from_env()?;
    let detector = DetectorConfig::from_env();

    info!("starting tickflow runtime");
    info!("  feed:        {}", config.feed_ws_url);
    info!("  publish:     {}", config.publish_bind_addr);
    info!("  query:       {}", config.query_bind_addr);
    info!("  database:    {}", config.db_path);
    info!("  channel:     {} ticks", config.tick_channel_buffer);
    info!("  flush:       {}ms", config.flush_interval_ms);
    info!("  maintenance: {}s", config.maintenance_interval_secs);
    info!(
        "  signals:     gap {}s, cap {}/day",
        detector.min_signal_gap_secs, detector.daily_signal_cap
    );

    // Database schema first, so a broken schema fails startup, not a flush
    let mut conn = Connection::open(&config.db_path)?;
    run_schema_migrations(&mut conn, &config.schema_dir)?;
    drop(conn);

    let db_writer: Arc<dyn MarketDbWriter> = Arc::new(SqliteMarketWriter::new(&config.db_path)?);
    let engine = Arc::new(MarketEngine::new(detector));

    let (tick_tx, tick_rx) = mpsc::channel::<Tick>(config.tick_channel_buffer);
    let (outbound_tx, _) = broadcast::channel::<String>(OUTBOUND_BUFFER);
    let outbound_tx = Arc::new(outbound_tx);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Feed client
    tokio::spawn(run_feed(
        config.feed_ws_url.clone(),
        tick_tx,
        shutdown_rx.clone(),
    ));

    // Ingestion loop
    tokio::spawn(run_ingestion(
        tick_rx,
        engine.clone(),
        db_writer,
        (*outbound_tx).clone(),
        IngestionOptions {
            flush_interval_ms: config.flush_interval_ms,
            persist_raw_ticks: config.persist_raw_ticks,
        },
        shutdown_rx.clone(),
    ));

    // Transport servers
    tokio::spawn(run_publish_server(
        config.publish_bind_addr.clone(),
        outbound_tx.clone(),
        shutdown_rx.clone(),
    ));
    tokio::spawn(run_query_server(
        config.query_bind_addr.clone(),
        engine.clone(),
        shutdown_rx.clone(),
    ));

    // Maintenance
    tokio::spawn(run_maintenance(
        engine,
        config.maintenance_interval_secs,
        shutdown_rx,
    ));

    info!("all tasks running, press CTRL+C to stop");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("received CTRL+C, shutting down"),
        Err(e) => error!("failed to listen for CTRL+C: {}", e),
    }

    let _ = shutdown_tx.send(true);

    // Give the loops a moment to flush and close sockets
    tokio::time::sleep(tokio::time::Duration::from_secs(2)).await;

    info!("tickflow runtime stopped");
    Ok(())
}
