//! Market data layer: ticks, multi-timeframe candles, per-instrument state.

pub mod candles;
pub mod state;
pub mod types;

pub use candles::{CandleSeries, CandleSet};
pub use state::InstrumentState;
pub use types::{pip_size, Candle, Tick, Timeframe};
