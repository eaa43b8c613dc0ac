use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use common::{ExchangeClient, Order, OrderStatus, Result, Shutdown};

/// How a fill wait ended.
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Filled,
    /// The order reached a terminal status other than FILLED.
    Closed(OrderStatus),
    /// The buy deadline passed before the fill.
    TimedOut,
    /// Shutdown was signalled.
    Cancelled,
}

/// Polls the exchange on a fixed interval until an order is done.
///
/// The first check happens immediately; later checks follow the interval.
/// Polling errors are logged and the next tick tries again.
pub struct FillWaiter {
    client: Arc<dyn ExchangeClient>,
    interval: Duration,
    buy_timeout: Option<Duration>,
}

impl FillWaiter {
    pub fn new(
        client: Arc<dyn ExchangeClient>,
        interval: Duration,
        buy_timeout: Option<Duration>,
    ) -> Self {
        Self {
            client,
            interval,
            buy_timeout,
        }
    }

    fn ticker(&self) -> time::Interval {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    /// Wait until the buy order's status is FILLED.
    pub async fn wait_for_buy_fill(&self, order: &Order, shutdown: &Shutdown) -> WaitOutcome {
        // A timeout too large to represent behaves like no timeout.
        let deadline = self.buy_timeout.and_then(|t| Instant::now().checked_add(t));
        let mut ticker = self.ticker();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => return WaitOutcome::Cancelled,
                _ = sleep_until_opt(deadline) => {
                    warn!(order_id = order.order_id, timeout = ?self.buy_timeout, "Buy order not filled before deadline");
                    return WaitOutcome::TimedOut;
                }
                _ = ticker.tick() => {}
            }

            match self.client.order_status(&order.symbol, order.order_id).await {
                Ok(status) if status.is_filled() => {
                    info!(order_id = order.order_id, price = %order.price, "Buy order filled");
                    return WaitOutcome::Filled;
                }
                Ok(status) if status.is_terminal() => {
                    warn!(order_id = order.order_id, %status, "Buy order closed without filling");
                    return WaitOutcome::Closed(status);
                }
                Ok(status) => {
                    debug!(order_id = order.order_id, %status, "Buy order awaiting fill");
                }
                Err(e) => {
                    warn!(order_id = order.order_id, error = %e, "Failed to poll buy order status");
                }
            }
        }
    }

    /// Wait until `symbol` has no open orders left.
    ///
    /// This does not look for a particular order id: any open order on the
    /// symbol keeps the wait going, and a sell canceled outside the bot ends
    /// it just like a fill would.
    pub async fn wait_for_sell_fill(&self, symbol: &str, shutdown: &Shutdown) -> WaitOutcome {
        let mut ticker = self.ticker();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.wait() => return WaitOutcome::Cancelled,
                _ = ticker.tick() => {}
            }

            match self.client.open_orders(symbol).await {
                Ok(orders) => {
                    let open = orders.iter().filter(|o| o.symbol == symbol).count();
                    if open == 0 {
                        info!(symbol, "No open orders left, sell order done");
                        return WaitOutcome::Filled;
                    }
                    debug!(symbol, open, "Sell order awaiting fill");
                }
                Err(e) => {
                    warn!(symbol, error = %e, "Failed to poll open orders");
                }
            }
        }
    }

    /// Open orders on `symbol` right now.
    pub async fn open_orders(&self, symbol: &str) -> Result<Vec<Order>> {
        self.client.open_orders(symbol).await
    }

    /// One-off status lookup, used to tell a filled sell from a canceled one.
    pub async fn final_status(&self, order: &Order) -> Result<OrderStatus> {
        self.client.order_status(&order.symbol, order.order_id).await
    }
}

fn sleep_until_opt(deadline: Option<Instant>) -> impl Future<Output = ()> {
    async move {
        match deadline {
            Some(deadline) => time::sleep_until(deadline).await,
            None => std::future::pending().await,
        }
    }
}
