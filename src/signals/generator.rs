//! Confluence signal generation over the M1 series.
//!
//! Each factor is an independent boolean with a fixed confidence increment.
//! Emission is gated on total confidence, factor count, the per-instrument
//! minimum gap and the UTC-day cap.

use crate::config::DetectorConfig;
use crate::market::state::InstrumentState;
use crate::market::types::{pip_size, Timeframe};
use crate::signals::{Signal, SignalDirection};

mod confidence {
    pub const MOMENTUM: f64 = 0.25;
    pub const VOLUME: f64 = 0.20;
    pub const TREND: f64 = 0.25;
    pub const BREAKOUT: f64 = 0.20;
    pub const VOLATILITY: f64 = 0.10;
}

struct FactorReading {
    name: &'static str,
    confidence: f64,
    direction: Option<SignalDirection>,
}

/// Evaluate the confluence factors for one instrument. Returns a signal only
/// when all emission gates pass; the limiter is updated on emission.
pub fn evaluate(state: &mut InstrumentState, now: i64, cfg: &DetectorConfig) -> Option<Signal> {
    let readings = read_factors(state, cfg);
    if readings.len() < cfg.min_factors {
        return None;
    }

    let total: f64 = readings.iter().map(|r| r.confidence).sum();
    if total < cfg.confidence_threshold {
        return None;
    }

    let direction = majority_direction(&readings)?;

    if !state
        .limiter
        .allows(now, cfg.min_signal_gap_secs, cfg.daily_signal_cap)
    {
        return None;
    }

    let factors: Vec<String> = readings.iter().map(|r| r.name.to_string()).collect();
    let signal = Signal::new(&state.instrument, direction, total.min(1.0), factors, now);
    state.limiter.record(now);

    log::info!(
        "signal {} {} confidence {:.2} [{}]",
        signal.instrument,
        signal.direction.as_str(),
        signal.confidence,
        signal.factors.join(",")
    );

    Some(signal)
}

fn read_factors(state: &InstrumentState, cfg: &DetectorConfig) -> Vec<FactorReading> {
    let series = state.candles.series(Timeframe::M1);
    let pip = pip_size(&state.instrument);
    let mut readings = Vec::new();

    // Momentum extreme: displacement over the last 10 closes
    let closes = series.closes(11);
    if closes.len() == 11 {
        let displacement = closes[10] - closes[0];
        if displacement.abs() >= cfg.momentum_threshold_pips * pip {
            readings.push(FactorReading {
                name: "momentum",
                confidence: confidence::MOMENTUM,
                direction: Some(if displacement > 0.0 {
                    SignalDirection::Bullish
                } else {
                    SignalDirection::Bearish
                }),
            });
        }
    }

    // Abnormal volume: latest sealed candle vs the trailing average
    let recent = series.last_n(cfg.breakout_lookback + 1);
    if recent.len() == cfg.breakout_lookback + 1 {
        let (last, prior) = recent.split_last().unwrap();
        let avg_volume = prior.iter().map(|c| c.volume).sum::<f64>() / prior.len() as f64;
        if avg_volume > 0.0 && last.volume >= cfg.volume_spike_ratio * avg_volume {
            readings.push(FactorReading {
                name: "volume",
                confidence: confidence::VOLUME,
                direction: None,
            });
        }

        // Breakout: close beyond the band of the prior candles
        let band_high = prior.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let band_low = prior.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        if last.close > band_high {
            readings.push(FactorReading {
                name: "breakout",
                confidence: confidence::BREAKOUT,
                direction: Some(SignalDirection::Bullish),
            });
        } else if last.close < band_low {
            readings.push(FactorReading {
                name: "breakout",
                confidence: confidence::BREAKOUT,
                direction: Some(SignalDirection::Bearish),
            });
        }
    }

    // Trend structure: higher-highs/higher-lows (or the bearish mirror)
    let trend = series.last_n(cfg.trend_lookback + 1);
    if trend.len() == cfg.trend_lookback + 1 {
        let mut higher = 0usize;
        let mut lower = 0usize;
        for pair in trend.windows(2) {
            if pair[1].high > pair[0].high && pair[1].low > pair[0].low {
                higher += 1;
            }
            if pair[1].high < pair[0].high && pair[1].low < pair[0].low {
                lower += 1;
            }
        }
        if higher >= cfg.trend_min_count {
            readings.push(FactorReading {
                name: "trend",
                confidence: confidence::TREND,
                direction: Some(SignalDirection::Bullish),
            });
        } else if lower >= cfg.trend_min_count {
            readings.push(FactorReading {
                name: "trend",
                confidence: confidence::TREND,
                direction: Some(SignalDirection::Bearish),
            });
        }
    }

    // Volatility inside the normal band (non-directional)
    if let Some(atr) = series.average_range(cfg.atr_period) {
        let atr_pips = atr / pip;
        if atr_pips >= cfg.vol_band_lo_pips && atr_pips <= cfg.vol_band_hi_pips {
            readings.push(FactorReading {
                name: "volatility",
                confidence: confidence::VOLATILITY,
                direction: None,
            });
        }
    }

    readings
}

/// Majority direction of the directional factors. A tie (or none at all)
/// yields nothing: direction must be implied, not guessed.
fn majority_direction(readings: &[FactorReading]) -> Option<SignalDirection> {
    let bullish = readings
        .iter()
        .filter(|r| r.direction == Some(SignalDirection::Bullish))
        .count();
    let bearish = readings
        .iter()
        .filter(|r| r.direction == Some(SignalDirection::Bearish))
        .count();

    if bullish > bearish {
        Some(SignalDirection::Bullish)
    } else if bearish > bullish {
        Some(SignalDirection::Bearish)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::types::Tick;

    fn cfg() -> DetectorConfig {
        DetectorConfig::default()
    }

    fn tick(mid: f64, volume: f64, timestamp: i64) -> Tick {
        Tick {
            instrument: "EURUSD".to_string(),
            bid: mid - 0.00005,
            ask: mid + 0.00005,
            volume,
            timestamp,
        }
    }

    /// Build a state whose M1 series rises ~2 pips per minute with a volume
    /// blow-off on the final sealed candle: momentum, trend, breakout and
    /// volume all true, ATR inside the band.
    fn bullish_state(candle_count: usize) -> (InstrumentState, i64) {
        let mut state = InstrumentState::new("EURUSD", &cfg());
        let mut last_ts = 0;

        for i in 0..=candle_count {
            let base = 1.1000 + i as f64 * 0.0002;
            let volume = if i == candle_count - 1 { 40.0 } else { 2.0 };
            // Two ticks per minute give each candle a ~4 pip range
            state.push_tick(tick(base, volume / 2.0, i as i64 * 60));
            state.push_tick(tick(base + 0.0004, volume / 2.0, i as i64 * 60 + 30));
            last_ts = i as i64 * 60 + 30;
        }

        (state, last_ts)
    }

    #[test]
    fn test_confluent_market_emits_bullish_signal() {
        let (mut state, now) = bullish_state(30);

        let signal = evaluate(&mut state, now, &cfg()).expect("confluence should emit");
        assert_eq!(signal.direction, SignalDirection::Bullish);
        assert!(signal.confidence >= 0.6);
        assert!(signal.factors.len() >= 3);
        assert!(signal.factors.contains(&"momentum".to_string()));
        assert!(signal.factors.contains(&"breakout".to_string()));
    }

    #[test]
    fn test_minimum_gap_blocks_back_to_back_signals() {
        let (mut state, now) = bullish_state(30);

        assert!(evaluate(&mut state, now, &cfg()).is_some());
        assert!(evaluate(&mut state, now + 60, &cfg()).is_none());
        assert!(evaluate(&mut state, now + 901, &cfg()).is_some());
    }

    #[test]
    fn test_daily_cap_blocks_emission() {
        let (mut state, now) = bullish_state(30);
        let mut custom = cfg();
        custom.daily_signal_cap = 2;
        custom.min_signal_gap_secs = 1;

        assert!(evaluate(&mut state, now, &custom).is_some());
        assert!(evaluate(&mut state, now + 10, &custom).is_some());
        assert!(evaluate(&mut state, now + 20, &custom).is_none());
    }

    #[test]
    fn test_quiet_market_emits_nothing() {
        let mut state = InstrumentState::new("EURUSD", &cfg());
        // Flat prices, flat volume: no factor fires
        for i in 0..30 {
            state.push_tick(tick(1.1000, 1.0, i * 60));
        }
        assert!(evaluate(&mut state, 30 * 60, &cfg()).is_none());
    }

    #[test]
    fn test_too_little_history_emits_nothing() {
        let mut state = InstrumentState::new("EURUSD", &cfg());
        for i in 0..5 {
            state.push_tick(tick(1.1000 + i as f64 * 0.0005, 1.0, i * 60));
        }
        assert!(evaluate(&mut state, 300, &cfg()).is_none());
    }

    #[test]
    fn test_majority_direction_tie_yields_none() {
        let readings = vec![
            FactorReading {
                name: "momentum",
                confidence: 0.25,
                direction: Some(SignalDirection::Bullish),
            },
            FactorReading {
                name: "breakout",
                confidence: 0.20,
                direction: Some(SignalDirection::Bearish),
            },
            FactorReading {
                name: "volatility",
                confidence: 0.10,
                direction: None,
            },
        ];
        assert!(majority_direction(&readings).is_none());
    }
}
