//! Publish server: broadcasts alert/signal frames to every connected
//! WebSocket client. Slow clients lag and skip frames, they are never
//! disconnected for falling behind.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, watch};
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub async fn run_publish_server(
    addr: String,
    tx: Arc<broadcast::Sender<String>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            log::error!("publish server failed to bind {}: {}", addr, e);
            return;
        }
    };
    log::info!("publish server listening on ws://{}", addr);

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        let rx = tx.subscribe();
                        let client_shutdown = shutdown.clone();
                        tokio::spawn(handle_client(stream, peer, rx, client_shutdown));
                    }
                    Err(e) => log::warn!("publish accept failed: {}", e),
                }
            }
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    log::info!("publish server stopped");
}

async fn handle_client(
    stream: TcpStream,
    peer: SocketAddr,
    mut rx: broadcast::Receiver<String>,
    mut shutdown: watch::Receiver<bool>,
) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            log::warn!("publish handshake failed for {}: {}", peer, e);
            return;
        }
    };
    log::info!("publish subscriber connected: {}", peer);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    loop {
        tokio::select! {
            frame = rx.recv() => {
                match frame {
                    Ok(frame) => {
                        if ws_sender.send(Message::Text(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Falling behind is survivable; dropping frames is not
                        // an error for a fire-and-forget feed.
                        log::warn!("subscriber {} lagged, skipped {} frames", peer, skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // subscribers only listen
                    Some(Err(e)) => {
                        log::warn!("publish socket error for {}: {}", peer, e);
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

    log::info!("publish subscriber disconnected: {}", peer);
}
