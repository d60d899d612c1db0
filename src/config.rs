//! Runtime and detection configuration from environment variables.

use std::env;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVariable(String),
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Process-level knobs: endpoints, channel sizes, loop intervals.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// WebSocket URL of the upstream tick feed
    pub feed_ws_url: String,

    /// Bind address for the alert/signal publish server
    pub publish_bind_addr: String,

    /// Bind address for the scoring query server
    pub query_bind_addr: String,

    /// Path to the SQLite database file
    pub db_path: String,

    /// Directory holding the numbered schema files
    pub schema_dir: String,

    /// Feed-to-ingestion channel capacity (ticks). The feed task blocks on a
    /// full channel, so backpressure reaches the upstream socket.
    pub tick_channel_buffer: usize,

    /// Persistence flush interval in milliseconds
    pub flush_interval_ms: u64,

    /// Maintenance pass interval in seconds
    pub maintenance_interval_secs: u64,

    /// Whether raw ticks are persisted alongside sealed candles
    pub persist_raw_ticks: bool,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `FEED_WS_URL` (required, ws:// or wss://)
    /// - `PUBLISH_BIND_ADDR` (default: 0.0.0.0:9301)
    /// - `QUERY_BIND_ADDR` (default: 0.0.0.0:9302)
    /// - `TICKFLOW_DB_PATH` (default: tickflow.db)
    /// - `TICKFLOW_SCHEMA_DIR` (default: sql)
    /// - `TICK_CHANNEL_BUFFER` (default: 10000)
    /// - `FLUSH_INTERVAL_MS` (default: 5000)
    /// - `MAINTENANCE_INTERVAL_SECS` (default: 300)
    /// - `PERSIST_RAW_TICKS` (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let feed_ws_url = env::var("FEED_WS_URL")
            .map_err(|_| ConfigError::MissingVariable("FEED_WS_URL".to_string()))?;

        if !feed_ws_url.starts_with("ws://") && !feed_ws_url.starts_with("wss://") {
            return Err(ConfigError::InvalidValue(
                "FEED_WS_URL must start with ws:// or wss://".to_string(),
            ));
        }

        Ok(Self {
            feed_ws_url,

            publish_bind_addr: env::var("PUBLISH_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:9301".to_string()),

            query_bind_addr: env::var("QUERY_BIND_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:9302".to_string()),

            db_path: env::var("TICKFLOW_DB_PATH").unwrap_or_else(|_| "tickflow.db".to_string()),

            schema_dir: env::var("TICKFLOW_SCHEMA_DIR").unwrap_or_else(|_| "sql".to_string()),

            tick_channel_buffer: env::var("TICK_CHANNEL_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),

            flush_interval_ms: env::var("FLUSH_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5_000),

            maintenance_interval_secs: env::var("MAINTENANCE_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),

            persist_raw_ticks: env::var("PERSIST_RAW_TICKS")
                .ok()
                .and_then(|s| s.to_lowercase().parse().ok())
                .unwrap_or(false),
        })
    }
}

/// Detection parameters shared by the aggregator, structure/sweep detectors,
/// scorer and signal generator.
///
/// Pip-denominated values scale by the pair's pip size at the point of use.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Per-instrument tick ring capacity
    pub tick_buffer_capacity: usize,
    /// Sealed candle history cap per timeframe
    pub candle_history_cap: usize,

    /// Trailing window of sealed M1 candles examined for swings
    pub swing_window: usize,
    /// Symmetric neighborhood half-width for the strict-extremum rule
    pub swing_neighborhood: usize,

    /// Same-kind zones within this distance merge instead of duplicating
    pub zone_tolerance_pips: f64,
    /// Zone count cap per instrument; weakest pruned first
    pub zone_cap: usize,
    /// Zones untested this long are purged by maintenance
    pub zone_stale_secs: i64,

    /// Price must trade this far beyond a zone to count as a breach
    pub breach_threshold_pips: f64,
    /// ...and fall back within this margin of the zone to confirm
    pub reversal_margin_pips: f64,
    /// Ticks scanned backwards for the breach
    pub confirm_lookback_ticks: usize,
    /// Confirmed sweeps are retained this long for scoring
    pub sweep_retention_secs: i64,
    /// A sweep grants its protection bonus for this long
    pub sweep_bonus_window_secs: i64,

    /// Zone-proximity factor looks this far around the candidate entry
    pub proximity_band_pips: f64,
    /// Normal volatility band (average M1 true range, pips)
    pub vol_band_lo_pips: f64,
    pub vol_band_hi_pips: f64,

    /// Momentum factor threshold (pips over 10 M1 closes)
    pub momentum_threshold_pips: f64,
    /// Abnormal-volume factor: sealed volume vs trailing average
    pub volume_spike_ratio: f64,
    /// Trend factor: candles examined / matches required
    pub trend_lookback: usize,
    pub trend_min_count: usize,
    /// Breakout factor: band of prior candles
    pub breakout_lookback: usize,
    /// True-range averaging period
    pub atr_period: usize,

    /// Minimum confidence for emission
    pub confidence_threshold: f64,
    /// Minimum number of true factors for emission
    pub min_factors: usize,
    /// Per-instrument minimum gap between signals, seconds
    pub min_signal_gap_secs: i64,
    /// Per-instrument signal cap per UTC day
    pub daily_signal_cap: u32,

    /// Instruments with no ticks for this long are dropped by maintenance
    pub idle_instrument_secs: i64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            tick_buffer_capacity: 2_000,
            candle_history_cap: 500,

            swing_window: 50,
            swing_neighborhood: 5,

            zone_tolerance_pips: 15.0,
            zone_cap: 20,
            zone_stale_secs: 24 * 3600,

            breach_threshold_pips: 3.0,
            reversal_margin_pips: 1.0,
            confirm_lookback_ticks: 5,
            sweep_retention_secs: 2 * 3600,
            sweep_bonus_window_secs: 3600,

            proximity_band_pips: 30.0,
            vol_band_lo_pips: 3.0,
            vol_band_hi_pips: 15.0,

            momentum_threshold_pips: 10.0,
            volume_spike_ratio: 2.5,
            trend_lookback: 10,
            trend_min_count: 7,
            breakout_lookback: 20,
            atr_period: 14,

            confidence_threshold: 0.6,
            min_factors: 3,
            min_signal_gap_secs: 900,
            daily_signal_cap: 10,

            idle_instrument_secs: 24 * 3600,
        }
    }
}

impl DetectorConfig {
    /// Defaults with the rate-limit knobs overridable from the environment
    /// (`SIGNAL_MIN_GAP_SECS`, `SIGNAL_DAILY_CAP`).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(gap) = env::var("SIGNAL_MIN_GAP_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            cfg.min_signal_gap_secs = gap;
        }

        if let Some(cap) = env::var("SIGNAL_DAILY_CAP")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            cfg.daily_signal_cap = cap;
        }

        cfg
    }
}
