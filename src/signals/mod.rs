//! Confluence signals and their per-instrument emission limits.

pub mod generator;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalDirection {
    Bullish,
    Bearish,
}

impl SignalDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalDirection::Bullish => "bullish",
            SignalDirection::Bearish => "bearish",
        }
    }
}

/// An emitted confluence signal. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub instrument: String,
    pub direction: SignalDirection,
    pub confidence: f64,
    pub factors: Vec<String>,
    pub generated_at: i64,
}

impl Signal {
    pub fn new(
        instrument: &str,
        direction: SignalDirection,
        confidence: f64,
        factors: Vec<String>,
        generated_at: i64,
    ) -> Self {
        let id = format!(
            "{}-{}-{:04x}",
            instrument.to_lowercase(),
            generated_at,
            rand::random::<u16>()
        );
        Self {
            id,
            instrument: instrument.to_string(),
            direction,
            confidence,
            factors,
            generated_at,
        }
    }
}

/// Per-instrument emission limiter: minimum gap between signals plus a cap
/// per UTC day.
#[derive(Debug, Clone, Default)]
pub struct SignalLimiter {
    last_emitted_at: Option<i64>,
    /// Days since the epoch of the counted day
    day: i64,
    emitted_today: u32,
}

impl SignalLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a signal may be emitted at `now`.
    pub fn allows(&self, now: i64, min_gap_secs: i64, daily_cap: u32) -> bool {
        if let Some(last) = self.last_emitted_at {
            if now - last < min_gap_secs {
                return false;
            }
        }
        if utc_day(now) == self.day && self.emitted_today >= daily_cap {
            return false;
        }
        true
    }

    /// Record an emission. The daily counter resets at the UTC day boundary.
    pub fn record(&mut self, now: i64) {
        let day = utc_day(now);
        if day != self.day {
            self.day = day;
            self.emitted_today = 0;
        }
        self.last_emitted_at = Some(now);
        self.emitted_today += 1;
    }

    pub fn emitted_today(&self) -> u32 {
        self.emitted_today
    }
}

fn utc_day(timestamp: i64) -> i64 {
    timestamp.div_euclid(86_400)
}
