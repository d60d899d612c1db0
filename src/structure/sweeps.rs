//! Stop-hunt sweep detection: breach beyond a zone followed by a reversal
//! back through it. A breach alone is not a sweep.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::market::types::Tick;
use crate::structure::zones::{ZoneBook, ZoneKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepKind {
    /// Support raid: breach below, reversal back up
    Bullish,
    /// Resistance raid: breach above, reversal back down
    Bearish,
}

impl SweepKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SweepKind::Bullish => "bullish",
            SweepKind::Bearish => "bearish",
        }
    }
}

/// A confirmed liquidity grab. Created exactly once per zone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSweep {
    pub instrument: String,
    pub kind: SweepKind,
    pub price: f64,
    pub timestamp: i64,
}

/// Absolute-price sweep thresholds, already scaled by the pair's pip size.
#[derive(Debug, Clone, Copy)]
pub struct SweepParams {
    /// Breach distance beyond the zone price
    pub breach: f64,
    /// Reversal must come back within this margin of the zone
    pub margin: f64,
    /// Ticks scanned backwards for the breach
    pub lookback: usize,
}

/// Check every un-swept zone against the latest tick: swept when some tick
/// in the recent lookback breached beyond the zone and the current tick has
/// reversed back through it. Marks matching zones swept and returns the
/// confirmed sweeps paired with the zone strength at sweep time.
pub fn detect_sweeps(
    zones: &mut ZoneBook,
    ticks: &VecDeque<Tick>,
    params: SweepParams,
    now: i64,
) -> Vec<(MarketSweep, f64)> {
    let current = match ticks.back() {
        Some(t) => t,
        None => return Vec::new(),
    };
    let current_mid = current.mid();

    // Prior ticks inside the confirmation lookback, newest excluded
    let prior_start = ticks.len().saturating_sub(params.lookback + 1);
    let prior: Vec<f64> = ticks
        .range(prior_start..ticks.len() - 1)
        .map(|t| t.mid())
        .collect();

    let mut confirmed = Vec::new();

    for zone in zones.unswept_mut(ZoneKind::Resistance) {
        let breached = prior.iter().any(|&m| m > zone.price + params.breach);
        let reversed = current_mid < zone.price + params.margin;
        if breached && reversed && zone.mark_swept(now) {
            confirmed.push((
                MarketSweep {
                    instrument: zone.instrument.clone(),
                    kind: SweepKind::Bearish,
                    price: zone.price,
                    timestamp: now,
                },
                zone.strength,
            ));
        }
    }

    for zone in zones.unswept_mut(ZoneKind::Support) {
        let breached = prior.iter().any(|&m| m < zone.price - params.breach);
        let reversed = current_mid > zone.price - params.margin;
        if breached && reversed && zone.mark_swept(now) {
            confirmed.push((
                MarketSweep {
                    instrument: zone.instrument.clone(),
                    kind: SweepKind::Bullish,
                    price: zone.price,
                    timestamp: now,
                },
                zone.strength,
            ));
        }
    }

    confirmed
}
