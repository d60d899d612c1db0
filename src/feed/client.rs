//! Feed client: subscribes to the upstream tick bridge over WebSocket and
//! pushes validated ticks into the ingestion channel.
//!
//! The channel send is awaited deliberately: when ingestion falls behind,
//! backpressure propagates to the socket instead of silently dropping ticks.

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::feed::backoff::ReconnectBackoff;
use crate::feed::normalizer::normalize;
use crate::market::types::Tick;

pub async fn run_feed(url: String, tx: mpsc::Sender<Tick>, mut shutdown: watch::Receiver<bool>) {
    log::info!("feed client starting for {}", url);
    let mut backoff = ReconnectBackoff::new(1, 60);

    loop {
        if *shutdown.borrow() {
            break;
        }

        match connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => {
                log::info!("connected to tick feed at {}", url);
                backoff.reset();

                let (_, mut read) = ws_stream.split();

                loop {
                    tokio::select! {
                        msg = read.next() => {
                            match msg {
                                Some(Ok(Message::Text(text))) => {
                                    let received_at = Utc::now().timestamp();
                                    match normalize(&text, received_at) {
                                        Ok(tick) => {
                                            if tx.send(tick).await.is_err() {
                                                log::warn!("ingestion channel closed, stopping feed");
                                                return;
                                            }
                                        }
                                        Err(e) => {
                                            log::warn!("dropping tick: {}", e);
                                        }
                                    }
                                }
                                Some(Ok(Message::Close(_))) => {
                                    log::warn!("feed connection closed by upstream");
                                    break;
                                }
                                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                                Some(Ok(_)) => {}
                                Some(Err(e)) => {
                                    log::error!("feed socket error: {}", e);
                                    break;
                                }
                                None => {
                                    log::warn!("feed stream ended");
                                    break;
                                }
                            }
                        }
                        res = shutdown.changed() => {
                            if res.is_err() || *shutdown.borrow() {
                                log::info!("feed client shutting down");
                                return;
                            }
                        }
                    }
                }
            }
            Err(e) => {
                log::error!("failed to connect to tick feed at {}: {}", url, e);
            }
        }

        let delay = backoff.next_delay();
        log::info!("reconnecting to feed in {}s", delay);
        tokio::select! {
            _ = sleep(Duration::from_secs(delay)) => {}
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    return;
                }
            }
        }
    }
}
