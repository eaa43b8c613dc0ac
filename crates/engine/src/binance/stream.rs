use std::time::Duration;

use futures_util::StreamExt;
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tracing::{info, warn};
use url::Url;

use common::{Error, PriceTick, Result, Shutdown};

const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Binance trade WebSocket stream for a single symbol.
///
/// Publishes the last traded price as `PriceTick` on a broadcast channel.
/// Reconnects automatically with exponential backoff.
pub struct BinanceStream {
    symbol: String,
    ws_base_url: String,
    tick_tx: broadcast::Sender<PriceTick>,
}

impl BinanceStream {
    pub fn new(
        symbol: impl Into<String>,
        ws_base_url: impl Into<String>,
        tick_tx: broadcast::Sender<PriceTick>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            ws_base_url: ws_base_url.into().trim_end_matches('/').to_string(),
            tick_tx,
        }
    }

    /// Run the stream loop until shutdown, reconnecting on failure.
    /// Call this inside a `tokio::spawn`.
    pub async fn run(self, shutdown: Shutdown) {
        let mut backoff = Duration::from_secs(1);

        loop {
            info!(symbol = %self.symbol, "Connecting to Binance trade stream");
            let delay = tokio::select! {
                res = self.connect_once() => match res {
                    Ok(()) => {
                        info!(symbol = %self.symbol, "Trade stream closed cleanly");
                        backoff = Duration::from_secs(1);
                        backoff
                    }
                    Err(e) => {
                        warn!(symbol = %self.symbol, error = %e, backoff = ?backoff, "Trade stream error, reconnecting");
                        let delay = backoff;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                        delay
                    }
                },
                _ = shutdown.wait() => break,
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.wait() => break,
            }
        }
        info!(symbol = %self.symbol, "Trade stream stopped");
    }

    fn url(&self) -> Result<Url> {
        let url_str = format!("{}/{}@trade", self.ws_base_url, self.symbol.to_lowercase());
        Url::parse(&url_str).map_err(|e| Error::WebSocket(e.to_string()))
    }

    async fn connect_once(&self) -> Result<()> {
        let (ws_stream, _) = connect_async(self.url()?)
            .await
            .map_err(|e| Error::WebSocket(e.to_string()))?;

        let (_, mut read) = ws_stream.split();

        while let Some(msg) = read.next().await {
            let msg = msg.map_err(|e| Error::WebSocket(e.to_string()))?;

            if let tokio_tungstenite::tungstenite::Message::Text(text) = msg {
                match parse_trade_event(&text) {
                    Ok(Some(tick)) => {
                        // Ignore send errors (no active receivers)
                        let _ = self.tick_tx.send(tick);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "Failed to parse trade event");
                    }
                }
            }
        }

        Ok(())
    }
}

// ─── Binance trade JSON parsing ──────────────────────────────────────────────

#[derive(Deserialize)]
struct TradeEvent {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "p")]
    price: Decimal,
    #[serde(rename = "T")]
    trade_time_ms: i64,
}

fn parse_trade_event(text: &str) -> Result<Option<PriceTick>> {
    let value: serde_json::Value = serde_json::from_str(text)?;
    if value.get("e").and_then(|v| v.as_str()) != Some("trade") {
        return Ok(None);
    }

    let event: TradeEvent = serde_json::from_value(value)?;
    Ok(Some(PriceTick {
        symbol: event.symbol,
        price: event.price,
        trade_time_ms: event.trade_time_ms,
    }))
}
