use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{shutdown, Config, ExchangeClient, PriceTick, Shutdown, TradingMode};
use engine::{BinanceClient, BinanceStream, CycleDriver};
use paper::PaperClient;
use strategy::MakerConfig;

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env().unwrap_or_else(|e| panic!("{e}"));
    let maker = MakerConfig::load(&cfg.strategy_config_path).unwrap_or_else(|e| panic!("{e}"));
    info!(
        mode = %cfg.trading_mode,
        symbol = %maker.symbol,
        buy_qty = %maker.buy_quantity,
        sell_qty = %maker.sell_quantity,
        buy_offset = %maker.buy_offset,
        sell_offset = %maker.sell_offset,
        "MakerBot starting"
    );

    let (trigger, shutdown) = shutdown::channel();

    // ── Binance REST ──────────────────────────────────────────────────────────
    let binance = Arc::new(
        BinanceClient::new(&cfg.binance_api_key, &cfg.binance_secret, &cfg.binance_rest_url)
            .unwrap_or_else(|e| panic!("{e}")),
    );

    match binance.market_snapshot(&maker.symbol).await {
        Ok(snapshot) => info!(
            symbol = %snapshot.symbol,
            price = %snapshot.price,
            best_bid = ?snapshot.best_bid(),
            best_ask = ?snapshot.best_ask(),
            spread = ?snapshot.spread(),
            agg_trades = snapshot.agg_trades.len(),
            recent_trades = snapshot.recent_trades.len(),
            server_time_ms = snapshot.server_time_ms,
            "Market snapshot"
        ),
        Err(e) => warn!(error = %e, "Market snapshot unavailable"),
    }

    // ── Exchange client (injected based on TRADING_MODE) ──────────────────────
    let exchange_client: Arc<dyn ExchangeClient> = match cfg.trading_mode {
        TradingMode::Live => {
            info!(url = %cfg.binance_rest_url, "Live trading mode, using BinanceClient");
            binance
        }
        TradingMode::Paper => {
            info!(balance = %cfg.paper_quote_balance, "Paper trading mode, using PaperClient");
            let paper = Arc::new(PaperClient::new(
                &maker.symbol,
                &maker.base_asset,
                &maker.quote_asset,
                cfg.paper_quote_balance,
            ));
            match binance.current_price(&maker.symbol).await {
                Ok(price) => {
                    paper.update_price(&maker.symbol, price).await;
                }
                Err(e) => warn!(error = %e, "No initial price, paper trading waits for the stream"),
            }

            let (tick_tx, tick_rx) = broadcast::channel::<PriceTick>(1024);
            let stream = BinanceStream::new(&maker.symbol, &cfg.binance_ws_url, tick_tx);
            tokio::spawn(stream.run(shutdown.clone()));
            tokio::spawn(feed_paper_prices(paper.clone(), tick_rx, shutdown.clone()));
            paper
        }
    };

    // ── Cycle driver ──────────────────────────────────────────────────────────
    let (driver, _handle) = CycleDriver::new(exchange_client, maker);
    tokio::spawn(shutdown::listen_for_shutdown(trigger.clone()));

    info!("All subsystems started. Waiting for shutdown signal.");
    match tokio::spawn(driver.run(shutdown)).await {
        Ok(Ok(())) => info!("Cycle driver stopped. Exiting."),
        Ok(Err(e)) => {
            error!(error = %e, "Cycle driver gave up");
            trigger.trigger();
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "Cycle driver task panicked");
            std::process::exit(1);
        }
    }
}

/// Forward live trade prices into the paper exchange so resting orders fill.
async fn feed_paper_prices(
    paper: Arc<PaperClient>,
    mut tick_rx: broadcast::Receiver<PriceTick>,
    shutdown: Shutdown,
) {
    loop {
        let tick = tokio::select! {
            res = tick_rx.recv() => res,
            _ = shutdown.wait() => break,
        };
        match tick {
            Ok(tick) => {
                for order in paper.update_price(&tick.symbol, tick.price).await {
                    info!(
                        order_id = order.order_id,
                        side = %order.side,
                        price = %order.price,
                        "Paper order filled"
                    );
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "Paper price feed lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}
