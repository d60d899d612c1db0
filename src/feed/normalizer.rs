//! Tick normalization: raw feed JSON to a validated [`Tick`].
//!
//! A message that fails validation is dropped with one log line at the call
//! site; nothing downstream ever sees it.

use serde::Deserialize;

use crate::error::FlowError;
use crate::market::types::Tick;

/// The inbound shape. Everything is optional at the parse stage so that
/// validation, not deserialization, decides what is malformed. Unknown
/// fields are ignored.
#[derive(Debug, Deserialize)]
struct RawTick {
    #[serde(default)]
    symbol: Option<String>,
    #[serde(default)]
    bid: Option<f64>,
    #[serde(default)]
    ask: Option<f64>,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    timestamp: Option<i64>,
}

/// Validate one raw feed message. `received_at` stands in for a missing
/// timestamp field.
pub fn normalize(text: &str, received_at: i64) -> Result<Tick, FlowError> {
    let raw: RawTick = serde_json::from_str(text)
        .map_err(|e| FlowError::MalformedInput(format!("tick is not valid json: {}", e)))?;

    let instrument = raw
        .symbol
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FlowError::MalformedInput("missing symbol".to_string()))?;

    let bid = raw
        .bid
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| FlowError::MalformedInput("missing or invalid bid".to_string()))?;

    let ask = raw
        .ask
        .filter(|v| v.is_finite() && *v > 0.0)
        .ok_or_else(|| FlowError::MalformedInput("missing or invalid ask".to_string()))?;

    let volume = match raw.volume {
        Some(v) if v.is_finite() && v >= 0.0 => v,
        Some(_) => {
            return Err(FlowError::MalformedInput(
                "invalid volume".to_string(),
            ))
        }
        None => 0.0,
    };

    let timestamp = match raw.timestamp {
        Some(t) if t > 0 => t,
        Some(_) => {
            return Err(FlowError::MalformedInput(
                "invalid timestamp".to_string(),
            ))
        }
        None => received_at,
    };

    Ok(Tick {
        instrument,
        bid,
        ask,
        volume,
        timestamp,
    })
}
