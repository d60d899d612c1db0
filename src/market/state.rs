//! Per-instrument market state: tick ring, candle series, zones, sweeps and
//! the signal limiter. Reached only through its owning lock in the registry.

use std::collections::VecDeque;

use crate::config::DetectorConfig;
use crate::market::candles::CandleSet;
use crate::market::types::{pip_size, Candle, Tick};
use crate::signals::SignalLimiter;
use crate::structure::sweeps::MarketSweep;
use crate::structure::zones::ZoneBook;

#[derive(Debug)]
pub struct InstrumentState {
    pub instrument: String,

    /// Bounded tick ring, oldest evicted first
    pub ticks: VecDeque<Tick>,

    /// Candle series across all timeframes
    pub candles: CandleSet,

    /// Liquidity zones built from confirmed swings
    pub zones: ZoneBook,

    /// Confirmed sweeps within the retention window
    pub sweeps: Vec<MarketSweep>,

    /// Signal emission limits for this instrument
    pub limiter: SignalLimiter,

    /// Timestamp of the newest tick, for idle eviction
    pub last_tick_at: i64,

    tick_capacity: usize,
}

impl InstrumentState {
    pub fn new(instrument: &str, cfg: &DetectorConfig) -> Self {
        let tolerance = cfg.zone_tolerance_pips * pip_size(instrument);
        Self {
            instrument: instrument.to_string(),
            ticks: VecDeque::with_capacity(cfg.tick_buffer_capacity.min(256)),
            candles: CandleSet::new(cfg.candle_history_cap),
            zones: ZoneBook::new(cfg.zone_cap, tolerance),
            sweeps: Vec::new(),
            limiter: SignalLimiter::new(),
            last_tick_at: 0,
            tick_capacity: cfg.tick_buffer_capacity,
        }
    }

    /// Append a tick and run aggregation. Returns the candles it sealed.
    pub fn push_tick(&mut self, tick: Tick) -> Vec<Candle> {
        if self.ticks.len() >= self.tick_capacity {
            self.ticks.pop_front();
        }
        self.last_tick_at = tick.timestamp;

        let sealed =
            self.candles
                .apply_tick(&self.instrument, tick.mid(), tick.volume, tick.timestamp);
        self.ticks.push_back(tick);
        sealed
    }

    /// Drop sweeps older than the retention window. Returns the number
    /// removed.
    pub fn prune_sweeps(&mut self, now: i64, retention_secs: i64) -> usize {
        let before = self.sweeps.len();
        self.sweeps.retain(|s| now - s.timestamp <= retention_secs);
        before - self.sweeps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::sweeps::SweepKind;

    fn tick(mid: f64, timestamp: i64) -> Tick {
        Tick {
            instrument: "EURUSD".to_string(),
            bid: mid - 0.00005,
            ask: mid + 0.00005,
            volume: 1.0,
            timestamp,
        }
    }

    #[test]
    fn test_tick_ring_bounded() {
        let mut cfg = DetectorConfig::default();
        cfg.tick_buffer_capacity = 5;
        let mut state = InstrumentState::new("EURUSD", &cfg);

        for i in 0..20 {
            state.push_tick(tick(1.1, i));
        }

        assert_eq!(state.ticks.len(), 5);
        assert_eq!(state.ticks.front().unwrap().timestamp, 15);
        assert_eq!(state.last_tick_at, 19);
    }

    #[test]
    fn test_push_tick_seals_candles() {
        let mut state = InstrumentState::new("EURUSD", &DetectorConfig::default());
        assert!(state.push_tick(tick(1.1000, 0)).is_empty());
        let sealed = state.push_tick(tick(1.1010, 60));
        assert_eq!(sealed.len(), 1);
        assert_eq!(sealed[0].close, 1.1000);
    }

    #[test]
    fn test_prune_sweeps_by_retention() {
        let mut state = InstrumentState::new("EURUSD", &DetectorConfig::default());
        state.sweeps.push(MarketSweep {
            instrument: "EURUSD".to_string(),
            kind: SweepKind::Bearish,
            price: 1.1040,
            timestamp: 1000,
        });
        state.sweeps.push(MarketSweep {
            instrument: "EURUSD".to_string(),
            kind: SweepKind::Bullish,
            price: 1.0980,
            timestamp: 7000,
        });

        let removed = state.prune_sweeps(8300, 7200);
        assert_eq!(removed, 1);
        assert_eq!(state.sweeps[0].timestamp, 7000);
    }
}
