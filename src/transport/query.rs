//! Query server: synchronous request/reply scoring over WebSocket. Each
//! text message is one request and gets exactly one response on the same
//! connection. Malformed requests are answered with the neutral placeholder
//! instead of closing the socket.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio_tungstenite::{accept_async, tungstenite::Message};

use crate::error::FlowError;
use crate::pipeline::engine::MarketEngine;
use crate::scoring::protection::{neutral_placeholder, RiskLevel};

#[derive(Debug, Deserialize)]
struct ScoreRequest {
    symbol: Option<String>,
    entry_price: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct ScoreResponse {
    pub symbol: String,
    pub entry_price: f64,
    pub protection_score: f64,
    pub risk_level: RiskLevel,
    pub recommendation: String,
    pub factors: BTreeMap<String, f64>,
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Answer one raw request. Pure apart from reading engine state, so the
/// protocol is testable without a socket.
pub fn answer(engine: &MarketEngine, text: &str, now: i64) -> ScoreResponse {
    match parse_request(text) {
        Ok((symbol, entry_price)) => {
            let scored = engine.score(&symbol, entry_price, now);
            ScoreResponse {
                symbol,
                entry_price,
                protection_score: scored.score,
                risk_level: scored.risk_level,
                recommendation: scored.recommendation,
                factors: scored.factors,
                timestamp: now,
                error: None,
            }
        }
        Err(e) => {
            log::warn!("malformed scoring request: {}", e);
            let placeholder = neutral_placeholder();
            ScoreResponse {
                symbol: String::new(),
                entry_price: 0.0,
                protection_score: placeholder.score,
                risk_level: placeholder.risk_level,
                recommendation: placeholder.recommendation,
                factors: placeholder.factors,
                timestamp: now,
                error: Some(e.to_string()),
            }
        }
    }
}

fn parse_request(text: &str) -> Result<(String, f64), FlowError> {
    let request: ScoreRequest = serde_json::from_str(text)
        .map_err(|e| FlowError::MalformedInput(format!("request is not valid json: {}", e)))?;

    let symbol = request
        .symbol
        .filter(|s| !s.is_empty())
        .ok_or_else(|| FlowError::MalformedInput("missing symbol".to_string()))?;

    let entry_price = request
        .entry_price
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or_else(|| FlowError::MalformedInput("missing or invalid entry_price".to_string()))?;

    Ok((symbol, entry_price))
}

pub async fn run_query_server(
    addr: String,
    engine: Arc<MarketEngine>,
    mut shutdown: watch::Receiver<bool>,
) {
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            log::error!("query server failed to bind {}: {}", addr, e);
            return;
        }
    };
    log::info!("query server listening on ws://{}", addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let engine = engine.clone();
                        let client_shutdown = shutdown.clone();
                        tokio::spawn(handle_client(stream, peer, engine, client_shutdown));
                    }
                    Err(e) => log::warn!("query accept failed: {}", e),
                }
            }
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    log::info!("query server stopped");
}

async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    engine: Arc<MarketEngine>,
    mut shutdown: watch::Receiver<bool>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            log::warn!("query handshake failed for {}: {}", peer, e);
            return;
        }
    };
    log::debug!("query client connected: {}", peer);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let response = answer(&engine, &text, Utc::now().timestamp());
                        let json = serde_json::to_string(&response)
                            .unwrap_or_else(|_| "{}".to_string());
                        if ws_sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // ping/pong handled by the library
                    Some(Err(e)) => {
                        log::warn!("query socket error for {}: {}", peer, e);
                        break;
                    }
                }
            }
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    let _ = ws_sender.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    }

    log::debug!("query client disconnected: {}", peer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorConfig;
    use crate::market::types::Tick;

    fn engine() -> MarketEngine {
        MarketEngine::new(DetectorConfig::default())
    }

    #[test]
    fn test_valid_request_scores() {
        let engine = engine();
        engine.process_tick(Tick {
            instrument: "EURUSD".to_string(),
            bid: 1.1000,
            ask: 1.1002,
            volume: 1.0,
            timestamp: 1_700_000_000,
        });

        let response = answer(
            &engine,
            r#"{"symbol":"EURUSD","entry_price":1.1005}"#,
            1_700_000_010,
        );

        assert_eq!(response.symbol, "EURUSD");
        assert_eq!(response.entry_price, 1.1005);
        assert!((1.0..=10.0).contains(&response.protection_score));
        assert!(response.error.is_none());
    }

    #[test]
    fn test_unknown_symbol_gets_neutral_score_not_error() {
        let response = answer(
            &engine(),
            r#"{"symbol":"XAUUSD","entry_price":2000.0}"#,
            1_700_000_000,
        );

        assert!(response.error.is_none());
        assert_eq!(response.protection_score, 5.0);
    }

    #[test]
    fn test_malformed_request_gets_placeholder() {
        let cases = [
            "not json at all",
            r#"{"entry_price":1.1}"#,
            r#"{"symbol":"EURUSD"}"#,
            r#"{"symbol":"EURUSD","entry_price":-3.0}"#,
            r#"{"symbol":"","entry_price":1.1}"#,
        ];

        for case in cases {
            let response = answer(&engine(), case, 1_700_000_000);
            assert!(response.error.is_some(), "case {:?} must carry an error", case);
            assert_eq!(response.protection_score, 5.0);
            assert_eq!(response.risk_level, RiskLevel::Unknown);
        }
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let response = answer(
            &engine(),
            r#"{"symbol":"EURUSD","entry_price":1.1,"extra":"field"}"#,
            1_700_000_000,
        );
        assert!(response.error.is_none());
    }
}
