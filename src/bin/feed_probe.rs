//! Feed connectivity probe: connect to FEED_WS_URL, decode a handful of
//! ticks, print them and exit. Useful for checking a bridge before pointing
//! the runtime at it.

use chrono::Utc;
use dotenv::dotenv;
use futures::StreamExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use tickflow::feed::normalize;

const PROBE_TICKS: usize = 10;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let url = std::env::var("FEED_WS_URL")
        .map_err(|_| "FEED_WS_URL must be set (ws://host:port/path)")?;

    println!("connecting to {} ...", url);
    let (ws_stream, _) = connect_async(url.as_str()).await?;
    println!("connected, waiting for {} ticks", PROBE_TICKS);

    let (_, mut read) = ws_stream.split();
    let mut seen = 0usize;

    while let Some(msg) = read.next().await {
        match msg? {
            Message::Text(text) => match normalize(&text, Utc::now().timestamp()) {
                Ok(tick) => {
                    seen += 1;
                    println!(
                        "[{:2}] {} bid {:.5} ask {:.5} vol {:.2} ts {}",
                        seen, tick.instrument, tick.bid, tick.ask, tick.volume, tick.timestamp
                    );
                    if seen >= PROBE_TICKS {
                        break;
                    }
                }
                Err(e) => println!("  (skipped: {})", e),
            },
            Message::Close(_) => {
                println!("upstream closed the connection");
                break;
            }
            _ => {}
        }
    }

    println!("probe finished: {} ticks decoded", seen);
    Ok(())
}
