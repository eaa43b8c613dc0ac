use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use common::{
    DeclineReason, ExchangeClient, LimitOrderRequest, Order, OrderSide, Placement, Result,
};
use strategy::{pricing, MakerConfig};

/// Prices, balance-checks and submits the two limit orders of a cycle.
///
/// This is the ONLY component that calls `ExchangeClient::submit_limit_order`.
pub struct OrderPlacer {
    client: Arc<dyn ExchangeClient>,
    config: MakerConfig,
}

impl OrderPlacer {
    pub fn new(client: Arc<dyn ExchangeClient>, config: MakerConfig) -> Self {
        Self { client, config }
    }

    /// Free balance of `asset`; zero when the account holds none.
    pub async fn available_balance(&self, asset: &str) -> Result<Decimal> {
        self.client.free_balance(asset).await.map_err(|e| {
            warn!(asset, error = %e, "Failed to fetch available balance");
            e
        })
    }

    /// Place the buy leg below the current market price.
    ///
    /// Returns `Declined` without touching the order book when the quote
    /// balance cannot cover `buy_quantity` at the computed price.
    pub async fn place_buy_order(&self) -> Result<Placement> {
        let cfg = &self.config;
        let available = self.available_balance(&cfg.quote_asset).await?;
        let current = self.client.current_price(&cfg.symbol).await.map_err(|e| {
            warn!(symbol = %cfg.symbol, error = %e, "Failed to fetch current price");
            e
        })?;

        let price = pricing::buy_price(current, cfg.buy_offset, cfg.price_decimals);
        let required = pricing::required_quote(cfg.buy_quantity, price);

        if available < required {
            let reason = DeclineReason::InsufficientBalance {
                asset: cfg.quote_asset.clone(),
                available,
                required,
            };
            info!(symbol = %cfg.symbol, %available, %required, "Insufficient balance for buy, skipping");
            return Ok(Placement::Declined(reason));
        }

        let request = LimitOrderRequest::new(&cfg.symbol, OrderSide::Buy, cfg.buy_quantity, price);
        let order = self.submit(&request).await?;
        info!(
            symbol = %order.symbol,
            order_id = order.order_id,
            %current,
            price = %price,
            qty = %order.quantity,
            "Buy order placed"
        );
        Ok(Placement::Placed(order))
    }

    /// Place the sell leg above the buy order's posted price.
    pub async fn place_sell_order(&self, buy: &Order) -> Result<Order> {
        let cfg = &self.config;
        let price = pricing::sell_price(buy.price, cfg.sell_offset, cfg.price_decimals);
        let request =
            LimitOrderRequest::new(&cfg.symbol, OrderSide::Sell, cfg.sell_quantity, price);

        let order = self.submit(&request).await?;
        info!(
            symbol = %order.symbol,
            order_id = order.order_id,
            buy_price = %buy.price,
            price = %price,
            qty = %order.quantity,
            "Sell order placed"
        );
        Ok(order)
    }

    pub async fn cancel_order(&self, order: &Order) -> Result<()> {
        self.client
            .cancel_order(&order.symbol, order.order_id)
            .await
            .map_err(|e| {
                error!(order_id = order.order_id, error = %e, "Order cancel failed");
                e
            })?;
        info!(symbol = %order.symbol, order_id = order.order_id, side = %order.side, "Order canceled");
        Ok(())
    }

    async fn submit(&self, request: &LimitOrderRequest) -> Result<Order> {
        self.client.submit_limit_order(request).await.map_err(|e| {
            error!(
                symbol = %request.symbol,
                side = %request.side,
                price = %request.price,
                error = %e,
                "Order submission failed"
            );
            e
        })
    }
}
