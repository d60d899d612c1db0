//! Multi-timeframe candle aggregation from live ticks.
//!
//! Bucket boundaries come from tick timestamps, not wall clock, so replayed
//! or backfilled streams aggregate identically to live ones.

use std::collections::VecDeque;

use crate::error::FlowError;
use crate::market::types::{Candle, Timeframe};

/// One timeframe's open candle plus a bounded ring of sealed history.
#[derive(Debug, Clone)]
pub struct CandleSeries {
    timeframe: Timeframe,
    current: Option<Candle>,
    sealed: VecDeque<Candle>,
    capacity: usize,
}

impl CandleSeries {
    pub fn new(timeframe: Timeframe, capacity: usize) -> Self {
        Self {
            timeframe,
            current: None,
            sealed: VecDeque::with_capacity(capacity.min(64)),
            capacity,
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    /// Apply one tick. Returns the candle sealed by this tick when the
    /// bucket boundary was crossed.
    ///
    /// A tick bucketed *before* the open candle is an ordering violation:
    /// it is logged and folded into the open candle so sealed history stays
    /// immutable and `open_time` never goes backwards.
    pub fn apply_tick(
        &mut self,
        instrument: &str,
        price: f64,
        volume: f64,
        timestamp: i64,
    ) -> Option<Candle> {
        let bucket = self.timeframe.bucket_start(timestamp);

        let open_time = match &self.current {
            None => {
                self.current = Some(Candle::open_at(
                    instrument,
                    self.timeframe,
                    bucket,
                    price,
                    volume,
                ));
                return None;
            }
            Some(open) => open.open_time,
        };

        if bucket > open_time {
            let sealed = self.current.take().unwrap();
            self.push_sealed(sealed.clone());
            self.current = Some(Candle::open_at(
                instrument,
                self.timeframe,
                bucket,
                price,
                volume,
            ));
            return Some(sealed);
        }

        if bucket < open_time {
            let violation = FlowError::InvariantViolation(format!(
                "out-of-order tick for {} {}: bucket {} behind open candle {}",
                instrument,
                self.timeframe.as_str(),
                bucket,
                open_time
            ));
            log::warn!("{}, folding into open bucket", violation);
        }

        if let Some(open) = self.current.as_mut() {
            open.apply(price, volume);
        }
        None
    }

    fn push_sealed(&mut self, candle: Candle) {
        if self.sealed.len() >= self.capacity {
            self.sealed.pop_front();
        }
        self.sealed.push_back(candle);
    }

    pub fn current(&self) -> Option<&Candle> {
        self.current.as_ref()
    }

    pub fn sealed_len(&self) -> usize {
        self.sealed.len()
    }

    pub fn last_sealed(&self) -> Option<&Candle> {
        self.sealed.back()
    }

    /// Last `n` sealed candles, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<Candle> {
        let start = self.sealed.len().saturating_sub(n);
        self.sealed.range(start..).cloned().collect()
    }

    /// Closes of the last `n` sealed candles, oldest first.
    pub fn closes(&self, n: usize) -> Vec<f64> {
        let start = self.sealed.len().saturating_sub(n);
        self.sealed.range(start..).map(|c| c.close).collect()
    }

    /// Average true range (high - low) over the last `period` sealed candles.
    pub fn average_range(&self, period: usize) -> Option<f64> {
        if self.sealed.len() < period || period == 0 {
            return None;
        }
        let start = self.sealed.len() - period;
        let sum: f64 = self.sealed.range(start..).map(|c| c.range()).sum();
        Some(sum / period as f64)
    }
}

/// All configured timeframes for one instrument.
#[derive(Debug, Clone)]
pub struct CandleSet {
    series: Vec<CandleSeries>,
}

impl CandleSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            series: Timeframe::all()
                .into_iter()
                .map(|tf| CandleSeries::new(tf, capacity))
                .collect(),
        }
    }

    /// Route one tick to every timeframe. Returns the candles sealed by it,
    /// one per timeframe that crossed a boundary.
    pub fn apply_tick(
        &mut self,
        instrument: &str,
        price: f64,
        volume: f64,
        timestamp: i64,
    ) -> Vec<Candle> {
        self.series
            .iter_mut()
            .filter_map(|s| s.apply_tick(instrument, price, volume, timestamp))
            .collect()
    }

    pub fn series(&self, timeframe: Timeframe) -> &CandleSeries {
        self.series
            .iter()
            .find(|s| s.timeframe() == timeframe)
            .expect("every timeframe is constructed")
    }
}
