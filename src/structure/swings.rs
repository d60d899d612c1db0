//! Swing-point detection over a trailing candle window.
//!
//! A point is a swing high when its high is the strict maximum over the
//! symmetric neighborhood [i - k, i + k]; swing lows mirror on the lows.

use crate::market::types::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwingKind {
    High,
    Low,
}

#[derive(Debug, Clone)]
pub struct SwingPoint {
    pub index: usize,
    pub price: f64,
    pub kind: SwingKind,
    pub volume: f64,
    pub time: i64,
}

pub fn is_swing_high(candles: &[Candle], i: usize, k: usize) -> bool {
    if i < k || i + k >= candles.len() {
        return false;
    }
    let pivot = candles[i].high;
    (i - k..=i + k).all(|j| j == i || candles[j].high < pivot)
}

pub fn is_swing_low(candles: &[Candle], i: usize, k: usize) -> bool {
    if i < k || i + k >= candles.len() {
        return false;
    }
    let pivot = candles[i].low;
    (i - k..=i + k).all(|j| j == i || candles[j].low > pivot)
}

/// All swing-high indices in the window.
pub fn swing_high_indices(candles: &[Candle], k: usize) -> Vec<usize> {
    (0..candles.len())
        .filter(|&i| is_swing_high(candles, i, k))
        .collect()
}

/// The newest confirmable swing in the window: the candle `k` places before
/// the end, which gained its complete right neighborhood when the latest
/// candle sealed. Checked as a high first, then as a low.
pub fn detect_confirmed_swing(candles: &[Candle], k: usize) -> Option<SwingPoint> {
    if candles.len() < 2 * k + 1 {
        return None;
    }
    let i = candles.len() - 1 - k;

    if is_swing_high(candles, i, k) {
        return Some(SwingPoint {
            index: i,
            price: candles[i].high,
            kind: SwingKind::High,
            volume: candles[i].volume,
            time: candles[i].open_time,
        });
    }
    if is_swing_low(candles, i, k) {
        return Some(SwingPoint {
            index: i,
            price: candles[i].low,
            kind: SwingKind::Low,
            volume: candles[i].volume,
            time: candles[i].open_time,
        });
    }
    None
}

/// Zone strength for a confirmed swing: a volume component (how the swing
/// candle's volume compares to the window average, 0-5) plus a touch
/// component (how many other closes sit within tolerance of the level, 0-5).
/// Capped at 10.
pub fn swing_strength(candles: &[Candle], swing: &SwingPoint, tolerance: f64) -> f64 {
    if candles.is_empty() {
        return 0.0;
    }

    let avg_volume = candles.iter().map(|c| c.volume).sum::<f64>() / candles.len() as f64;
    let volume_component = if avg_volume > 0.0 {
        (swing.volume / avg_volume).min(2.0) * 2.5
    } else {
        0.0
    };

    let touches = candles
        .iter()
        .enumerate()
        .filter(|(i, c)| *i != swing.index && (c.close - swing.price).abs() <= tolerance)
        .count();
    let touch_component = (touches as f64).min(5.0);

    (volume_component + touch_component).min(10.0)
}
