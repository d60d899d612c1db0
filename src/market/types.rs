//! Core market data types: ticks, candles, timeframes.

use serde::{Deserialize, Serialize};

/// A single normalized quote tick. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub instrument: String,
    pub bid: f64,
    pub ask: f64,
    pub volume: f64,
    pub timestamp: i64,
}

impl Tick {
    /// Mid price used for aggregation and structure checks.
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M5,
    M15,
    H1,
    H4,
    D1,
}

impl Timeframe {
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "M1",
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
        }
    }

    pub fn duration_secs(&self) -> i64 {
        match self {
            Timeframe::M1 => 60,
            Timeframe::M5 => 5 * 60,
            Timeframe::M15 => 15 * 60,
            Timeframe::H1 => 60 * 60,
            Timeframe::H4 => 4 * 60 * 60,
            Timeframe::D1 => 24 * 60 * 60,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "M1" => Some(Timeframe::M1),
            "M5" => Some(Timeframe::M5),
            "M15" => Some(Timeframe::M15),
            "H1" => Some(Timeframe::H1),
            "H4" => Some(Timeframe::H4),
            "D1" => Some(Timeframe::D1),
            _ => None,
        }
    }

    pub fn all() -> [Timeframe; 6] {
        [
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
        ]
    }

    /// Bucket start for a timestamp: truncation to the timeframe boundary.
    pub fn bucket_start(&self, timestamp: i64) -> i64 {
        timestamp - timestamp.rem_euclid(self.duration_secs())
    }
}

/// One OHLC candle. Mutable while it is the open candle of its (instrument,
/// timeframe) pair, immutable once sealed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub instrument: String,
    pub timeframe: Timeframe,
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Open a fresh candle from the first tick of its bucket.
    pub fn open_at(instrument: &str, timeframe: Timeframe, open_time: i64, price: f64, volume: f64) -> Self {
        Self {
            instrument: instrument.to_string(),
            timeframe,
            open_time,
            open: price,
            high: price,
            low: price,
            close: price,
            volume,
        }
    }

    /// Fold another tick of the same bucket into the open candle.
    pub fn apply(&mut self, price: f64, volume: f64) {
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += volume;
    }

    /// High minus low, the candle's traded range.
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

/// Pip size for a symbol. JPY-quoted pairs tick in hundredths, everything
/// else in ten-thousandths.
pub fn pip_size(instrument: &str) -> f64 {
    if instrument.to_ascii_uppercase().contains("JPY") {
        0.01
    } else {
        0.0001
    }
}
