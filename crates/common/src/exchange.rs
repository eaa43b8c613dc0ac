use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::{LimitOrderRequest, Order, OrderStatus, Result};

/// Abstraction over the exchange connection.
///
/// `BinanceClient` implements this for live trading.
/// `PaperClient` implements this for simulation.
///
/// Only the order placer and the fill waiter in `crates/engine` call it;
/// the cycle driver reaches the exchange through them.
#[async_trait]
pub trait ExchangeClient: Send + Sync {
    /// Get the latest price for a symbol.
    async fn current_price(&self, symbol: &str) -> Result<Decimal>;

    /// Free (unlocked) balance of an asset. Zero when the account holds none.
    async fn free_balance(&self, asset: &str) -> Result<Decimal>;

    /// Submit a GTC limit order and return the accepted order.
    async fn submit_limit_order(&self, request: &LimitOrderRequest) -> Result<Order>;

    /// Current status of an order.
    async fn order_status(&self, symbol: &str, order_id: u64) -> Result<OrderStatus>;

    /// All open orders for a symbol.
    async fn open_orders(&self, symbol: &str) -> Result<Vec<Order>>;

    /// Cancel a resting order.
    async fn cancel_order(&self, symbol: &str, order_id: u64) -> Result<()>;
}
