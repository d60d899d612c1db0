//! Market engine: the per-instrument state registry and the orchestration
//! of aggregation, structure tracking, sweep checks and signal evaluation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::config::DetectorConfig;
use crate::error::FlowError;
use crate::market::state::InstrumentState;
use crate::market::types::{pip_size, Candle, Tick, Timeframe};
use crate::scoring::protection::{score_entry, ProtectionScore};
use crate::signals::generator;
use crate::signals::Signal;
use crate::structure::sweeps::{detect_sweeps, MarketSweep, SweepParams};
use crate::structure::swings::{detect_confirmed_swing, swing_strength, SwingKind};
use crate::structure::zones::ZoneKind;

/// Outbound event produced while processing a tick.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    SweepAlert {
        sweep: MarketSweep,
        zone_strength: f64,
    },
    Signal(Signal),
}

/// Owns every instrument's state. Each instrument sits behind its own lock;
/// the registry lock is only held to look the instrument up.
pub struct MarketEngine {
    instruments: RwLock<HashMap<String, Arc<Mutex<InstrumentState>>>>,
    cfg: DetectorConfig,
}

/// Counters from one maintenance pass.
#[derive(Debug, Default, Clone, Copy)]
pub struct MaintenanceReport {
    pub stale_zones: usize,
    pub expired_sweeps: usize,
    pub dropped_instruments: usize,
}

impl MarketEngine {
    pub fn new(cfg: DetectorConfig) -> Self {
        Self {
            instruments: RwLock::new(HashMap::new()),
            cfg,
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    /// Existing state handle for an instrument, if any.
    pub fn get(&self, instrument: &str) -> Option<Arc<Mutex<InstrumentState>>> {
        self.instruments.read().unwrap().get(instrument).cloned()
    }

    fn get_or_create(&self, instrument: &str) -> Arc<Mutex<InstrumentState>> {
        if let Some(state) = self.get(instrument) {
            return state;
        }
        let mut map = self.instruments.write().unwrap();
        map.entry(instrument.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(InstrumentState::new(instrument, &self.cfg)))
            })
            .clone()
    }

    pub fn active_instruments(&self) -> Vec<String> {
        self.instruments.read().unwrap().keys().cloned().collect()
    }

    /// Process one tick under the instrument's lock: aggregation, structure
    /// update on sealed M1 candles, sweep confirmation, signal evaluation.
    /// Returns the sealed candles and any outbound events.
    pub fn process_tick(&self, tick: Tick) -> (Vec<Candle>, Vec<EngineEvent>) {
        let instrument = tick.instrument.clone();
        let now = tick.timestamp;
        let pip = pip_size(&instrument);

        let handle = self.get_or_create(&instrument);
        let mut guard = handle.lock().unwrap();
        let st = &mut *guard;

        let sealed = st.push_tick(tick);
        let mut events = Vec::new();

        // Structure and signal checks run once per sealed M1 candle
        if sealed.iter().any(|c| c.timeframe == Timeframe::M1) {
            let window = st.candles.series(Timeframe::M1).last_n(self.cfg.swing_window);

            if let Some(swing) = detect_confirmed_swing(&window, self.cfg.swing_neighborhood) {
                let strength = swing_strength(&window, &swing, st.zones.tolerance());
                let kind = match swing.kind {
                    SwingKind::High => ZoneKind::Resistance,
                    SwingKind::Low => ZoneKind::Support,
                };
                log::debug!(
                    "{}: swing {} at {:.5} strength {:.1}",
                    instrument,
                    kind.as_str(),
                    swing.price,
                    strength
                );
                st.zones
                    .record_swing(&instrument, swing.price, kind, strength, now);
            }

            if let Some(signal) = generator::evaluate(st, now, &self.cfg) {
                events.push(EngineEvent::Signal(signal));
            }
        }

        // Sweep confirmation runs on every tick
        let params = SweepParams {
            breach: self.cfg.breach_threshold_pips * pip,
            margin: self.cfg.reversal_margin_pips * pip,
            lookback: self.cfg.confirm_lookback_ticks,
        };
        let confirmed = detect_sweeps(&mut st.zones, &st.ticks, params, now);
        for (sweep, zone_strength) in confirmed {
            log::info!(
                "{}: {} sweep confirmed at {:.5} (zone strength {:.1})",
                instrument,
                sweep.kind.as_str(),
                sweep.price,
                zone_strength
            );
            st.sweeps.push(sweep.clone());
            events.push(EngineEvent::SweepAlert {
                sweep,
                zone_strength,
            });
        }

        (sealed, events)
    }

    /// Score a candidate entry. Unknown instruments get the neutral
    /// midpoint; the instrument lock is held only for the computation.
    pub fn score(&self, instrument: &str, entry_price: f64, now: i64) -> ProtectionScore {
        match self.get(instrument) {
            Some(handle) => {
                let st = handle.lock().unwrap();
                score_entry(Some(&st), instrument, entry_price, now, &self.cfg)
            }
            None => {
                log::debug!(
                    "{}, answering with the neutral score",
                    FlowError::StateNotFound(instrument.to_string())
                );
                score_entry(None, instrument, entry_price, now, &self.cfg)
            }
        }
    }

    /// One maintenance pass: prune stale zones and expired sweeps per
    /// instrument, then drop instruments idle beyond the horizon.
    pub fn maintain(&self, now: i64) -> MaintenanceReport {
        let mut report = MaintenanceReport::default();
        let mut idle = Vec::new();

        let handles: Vec<(String, Arc<Mutex<InstrumentState>>)> = {
            let map = self.instruments.read().unwrap();
            map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
        };

        for (name, handle) in handles {
            let mut st = handle.lock().unwrap();
            report.stale_zones += st.zones.prune_stale(now, self.cfg.zone_stale_secs);
            report.expired_sweeps += st.prune_sweeps(now, self.cfg.sweep_retention_secs);
            if st.last_tick_at > 0 && now - st.last_tick_at > self.cfg.idle_instrument_secs {
                idle.push(name);
            }
        }

        if !idle.is_empty() {
            let mut map = self.instruments.write().unwrap();
            for name in idle {
                map.remove(&name);
                report.dropped_instruments += 1;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tick(instrument: &str, mid: f64, timestamp: i64) -> Tick {
        Tick {
            instrument: instrument.to_string(),
            bid: mid - 0.00005,
            ask: mid + 0.00005,
            volume: 1.0,
            timestamp,
        }
    }

    #[test]
    fn test_instruments_isolated() {
        let engine = MarketEngine::new(DetectorConfig::default());
        engine.process_tick(tick("EURUSD", 1.1000, 0));
        engine.process_tick(tick("GBPUSD", 1.2500, 0));

        let mut active = engine.active_instruments();
        active.sort();
        assert_eq!(active, vec!["EURUSD", "GBPUSD"]);

        let eur = engine.get("EURUSD").unwrap();
        assert_eq!(eur.lock().unwrap().ticks.len(), 1);
    }

    #[test]
    fn test_process_tick_returns_sealed_candles() {
        let engine = MarketEngine::new(DetectorConfig::default());
        let (sealed, _) = engine.process_tick(tick("EURUSD", 1.1000, 0));
        assert!(sealed.is_empty());

        let (sealed, _) = engine.process_tick(tick("EURUSD", 1.1010, 60));
        assert_eq!(sealed.len(), 1);
        assert_eq!(sealed[0].timeframe, Timeframe::M1);
    }

    #[test]
    fn test_zone_formed_from_swing_then_swept() {
        let mut cfg = DetectorConfig::default();
        cfg.swing_neighborhood = 2;
        cfg.swing_window = 20;
        let engine = MarketEngine::new(cfg);

        // Rise to a peak at 1.1040, then fall away: a swing high forms two
        // candles after the peak.
        let mids = [
            1.1000, 1.1010, 1.1020, 1.1040, 1.1030, 1.1020, 1.1010, 1.1005,
        ];
        for (i, mid) in mids.iter().enumerate() {
            engine.process_tick(tick("EURUSD", *mid, i as i64 * 60));
        }

        let handle = engine.get("EURUSD").unwrap();
        {
            let st = handle.lock().unwrap();
            assert_eq!(st.zones.len(), 1);
            assert_eq!(st.zones.zones()[0].kind, ZoneKind::Resistance);
            assert!(!st.zones.zones()[0].swept);
        }

        // Breach the zone then reverse hard below it within the lookback
        let zone_price = handle.lock().unwrap().zones.zones()[0].price;
        let ts = mids.len() as i64 * 60;
        engine.process_tick(tick("EURUSD", zone_price + 0.0010, ts));
        let (_, events) = engine.process_tick(tick("EURUSD", zone_price - 0.0025, ts + 1));

        let sweep_events: Vec<_> = events
            .iter()
            .filter(|e| matches!(e, EngineEvent::SweepAlert { .. }))
            .collect();
        assert_eq!(sweep_events.len(), 1);
        assert!(handle.lock().unwrap().zones.zones()[0].swept);
    }

    #[test]
    fn test_maintain_drops_idle_instruments() {
        let mut cfg = DetectorConfig::default();
        cfg.idle_instrument_secs = 100;
        let engine = MarketEngine::new(cfg);

        engine.process_tick(tick("EURUSD", 1.1000, 1000));
        engine.process_tick(tick("GBPUSD", 1.2500, 2000));

        let report = engine.maintain(1050);
        assert_eq!(report.dropped_instruments, 0);

        let report = engine.maintain(1150);
        assert_eq!(report.dropped_instruments, 1);
        assert_eq!(engine.active_instruments(), vec!["GBPUSD"]);
    }

    #[test]
    fn test_score_unknown_instrument_is_neutral() {
        let engine = MarketEngine::new(DetectorConfig::default());
        let result = engine.score("XAUUSD", 2000.0, 1_700_000_000);
        assert!((1.0..=10.0).contains(&result.score));
    }
}
