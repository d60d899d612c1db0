//! Wire frame format: `<TOPIC> <json-body>` text frames.

use serde::{Deserialize, Serialize};

use crate::signals::{Signal, SignalDirection};
use crate::structure::sweeps::{MarketSweep, SweepKind};

pub const TOPIC_ALERT: &str = "ALERT";
pub const TOPIC_SIGNAL: &str = "SIGNAL";

/// Body of a sweep alert frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepAlertBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub symbol: String,
    pub timestamp: i64,
    pub sweep_type: SweepKind,
    pub price: f64,
    pub zone_strength: f64,
}

/// Body of a signal frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalBody {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub symbol: String,
    pub timestamp: i64,
    pub direction: SignalDirection,
    pub confidence: f64,
    pub factors: Vec<String>,
}

pub fn format_frame<T: Serialize>(topic: &str, body: &T) -> String {
    // Serialization of these plain structs cannot fail
    let json = serde_json::to_string(body).unwrap_or_else(|_| "{}".to_string());
    format!("{} {}", topic, json)
}

/// Split a frame into (topic, json body).
pub fn parse_frame(frame: &str) -> Option<(&str, &str)> {
    frame.split_once(' ')
}

pub fn sweep_alert_frame(sweep: &MarketSweep, zone_strength: f64) -> String {
    let body = SweepAlertBody {
        kind: "sweep".to_string(),
        symbol: sweep.instrument.clone(),
        timestamp: sweep.timestamp,
        sweep_type: sweep.kind,
        price: sweep.price,
        zone_strength,
    };
    format_frame(TOPIC_ALERT, &body)
}

pub fn signal_frame(signal: &Signal) -> String {
    let body = SignalBody {
        kind: "signal".to_string(),
        id: signal.id.clone(),
        symbol: signal.instrument.clone(),
        timestamp: signal.generated_at,
        direction: signal.direction,
        confidence: signal.confidence,
        factors: signal.factors.clone(),
    };
    format_frame(TOPIC_SIGNAL, &body)
}
