//! Entry protection scoring: five bounded factors folded onto a neutral
//! midpoint with fixed weights, clamped to [1, 10].
//!
//! Pure function of the instrument's current state and the candidate price.
//! Absent state never raises: missing pieces contribute zero.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::DetectorConfig;
use crate::market::state::InstrumentState;
use crate::market::types::{pip_size, Timeframe};
use crate::scoring::session::session_quality;
use crate::structure::sweeps::SweepKind;

const MIDPOINT: f64 = 5.0;
const MIN_SCORE: f64 = 1.0;
const MAX_SCORE: f64 = 10.0;

mod weights {
    pub const ZONE_PROXIMITY: f64 = 0.30;
    pub const SWEEP_PROTECTION: f64 = 0.25;
    pub const VOLATILITY: f64 = 0.20;
    pub const SESSION: f64 = 0.15;
    pub const CONFLUENCE: f64 = 0.10;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    Elevated,
    High,
    /// Only used for malformed queries
    Unknown,
}

impl RiskLevel {
    fn from_score(score: f64) -> Self {
        if score >= 8.0 {
            RiskLevel::Low
        } else if score >= 6.5 {
            RiskLevel::Moderate
        } else if score >= 4.5 {
            RiskLevel::Elevated
        } else {
            RiskLevel::High
        }
    }

    fn recommendation(&self) -> &'static str {
        match self {
            RiskLevel::Low => "entry well protected",
            RiskLevel::Moderate => "acceptable entry, consider reduced size",
            RiskLevel::Elevated => "wait for better structure",
            RiskLevel::High => "avoid entry near unswept liquidity",
            RiskLevel::Unknown => "malformed request",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProtectionScore {
    pub score: f64,
    pub risk_level: RiskLevel,
    pub recommendation: String,
    /// Weighted contribution per factor, in score points
    pub factors: BTreeMap<String, f64>,
}

/// Score a candidate entry. `state` is None for instruments with no history,
/// which yields the neutral midpoint across the board.
pub fn score_entry(
    state: Option<&InstrumentState>,
    instrument: &str,
    entry_price: f64,
    now: i64,
    cfg: &DetectorConfig,
) -> ProtectionScore {
    let pip = pip_size(instrument);

    let (zone_v, sweep_v, vol_v, session_v) = match state {
        Some(st) => (
            zone_proximity_factor(st, entry_price, cfg, pip),
            sweep_protection_factor(st, entry_price, now, cfg, pip),
            volatility_factor(st, cfg, pip),
            session_quality(now),
        ),
        None => (0.0, 0.0, 0.0, 0.0),
    };

    // Reserved slot: multi-timeframe confirmation is not implemented, and a
    // made-up value would be worse than a visible neutral one.
    let confluence_v = 0.0;

    let mut factors = BTreeMap::new();
    factors.insert(
        "zone_proximity".to_string(),
        weights::ZONE_PROXIMITY * zone_v * MIDPOINT,
    );
    factors.insert(
        "recent_sweep".to_string(),
        weights::SWEEP_PROTECTION * sweep_v * MIDPOINT,
    );
    factors.insert(
        "volatility".to_string(),
        weights::VOLATILITY * vol_v * MIDPOINT,
    );
    factors.insert("session".to_string(), weights::SESSION * session_v * MIDPOINT);
    factors.insert(
        "timeframe_confluence".to_string(),
        weights::CONFLUENCE * confluence_v * MIDPOINT,
    );

    let raw = MIDPOINT + factors.values().sum::<f64>();
    let score = raw.clamp(MIN_SCORE, MAX_SCORE);
    let risk_level = RiskLevel::from_score(score);

    ProtectionScore {
        score,
        risk_level,
        recommendation: risk_level.recommendation().to_string(),
        factors,
    }
}

/// Neutral placeholder for malformed queries: midpoint score, unknown risk.
pub fn neutral_placeholder() -> ProtectionScore {
    ProtectionScore {
        score: MIDPOINT,
        risk_level: RiskLevel::Unknown,
        recommendation: RiskLevel::Unknown.recommendation().to_string(),
        factors: BTreeMap::new(),
    }
}

/// Penalty in [-1, 0] for sitting close to a strong un-swept zone. Swept
/// zones no longer guard resting liquidity and are skipped.
fn zone_proximity_factor(
    state: &InstrumentState,
    entry_price: f64,
    cfg: &DetectorConfig,
    pip: f64,
) -> f64 {
    let band = cfg.proximity_band_pips * pip;
    match state.zones.strongest_unswept_near(entry_price, band) {
        Some(zone) => {
            let closeness = 1.0 - (zone.price - entry_price).abs() / band;
            -(closeness * zone.strength / 10.0)
        }
        None => 0.0,
    }
}

/// Bonus in [0, 1] for entering on the liquidity-grabbed side of a recent
/// sweep, decaying linearly over the bonus window.
fn sweep_protection_factor(
    state: &InstrumentState,
    entry_price: f64,
    now: i64,
    cfg: &DetectorConfig,
    pip: f64,
) -> f64 {
    let tolerance = cfg.zone_tolerance_pips * pip;

    state
        .sweeps
        .iter()
        .filter(|s| {
            let age = now - s.timestamp;
            if age < 0 || age > cfg.sweep_bonus_window_secs {
                return false;
            }
            match s.kind {
                // Liquidity above was flushed: entries at or below are covered
                SweepKind::Bearish => entry_price <= s.price + tolerance,
                SweepKind::Bullish => entry_price >= s.price - tolerance,
            }
        })
        .map(|s| 1.0 - (now - s.timestamp) as f64 / cfg.sweep_bonus_window_secs as f64)
        .fold(0.0, f64::max)
}

/// Volatility in [-1, 1]: +1 inside the normal band, degrading linearly to
/// -1 at dead-flat or runaway extremes. No sealed history contributes zero.
fn volatility_factor(state: &InstrumentState, cfg: &DetectorConfig, pip: f64) -> f64 {
    let series = state.candles.series(Timeframe::M1);
    let atr_pips = match series.average_range(cfg.atr_period) {
        Some(atr) => atr / pip,
        None => return 0.0,
    };

    let lo = cfg.vol_band_lo_pips;
    let hi = cfg.vol_band_hi_pips;

    if atr_pips >= lo && atr_pips <= hi {
        1.0
    } else if atr_pips < lo {
        ((atr_pips / lo) * 2.0 - 1.0).max(-1.0)
    } else {
        (1.0 - 2.0 * (atr_pips - hi) / hi).max(-1.0)
    }
}
