use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    Error, ExchangeClient, LimitOrderRequest, Order, OrderSide, OrderStatus, Result,
};

/// Simulated exchange client for paper trading.
///
/// Limit orders rest in memory and fill at their limit price once a fed
/// price crosses them. Funds for a resting order are locked until it fills
/// or is canceled. No real orders are ever sent to Binance.
pub struct PaperClient {
    symbol: String,
    base_asset: String,
    quote_asset: String,
    book: Arc<RwLock<PaperBook>>,
}

#[derive(Default)]
struct PaperBook {
    /// Free balance per asset.
    balances: HashMap<String, Decimal>,
    last_price: Option<Decimal>,
    resting: Vec<Order>,
    /// Final status of orders that left the book.
    closed: HashMap<u64, OrderStatus>,
    next_id: u64,
}

impl PaperClient {
    pub fn new(
        symbol: impl Into<String>,
        base_asset: impl Into<String>,
        quote_asset: impl Into<String>,
        initial_quote_balance: Decimal,
    ) -> Self {
        let symbol = symbol.into();
        let quote_asset = quote_asset.into();
        info!(
            %symbol,
            balance = %initial_quote_balance,
            asset = %quote_asset,
            "PaperClient initialized"
        );

        let mut balances = HashMap::new();
        balances.insert(quote_asset.clone(), initial_quote_balance);

        Self {
            symbol,
            base_asset: base_asset.into(),
            quote_asset,
            book: Arc::new(RwLock::new(PaperBook {
                balances,
                next_id: 1,
                ..PaperBook::default()
            })),
        }
    }

    /// Record the latest traded price and fill every resting order it
    /// crosses. Returns the filled orders.
    pub async fn update_price(&self, symbol: &str, price: Decimal) -> Vec<Order> {
        if symbol != self.symbol {
            return Vec::new();
        }
        let mut book = self.book.write().await;
        book.last_price = Some(price);
        self.match_resting(&mut book, price)
    }

    fn match_resting(&self, book: &mut PaperBook, price: Decimal) -> Vec<Order> {
        let (crossed, resting): (Vec<Order>, Vec<Order>) =
            std::mem::take(&mut book.resting)
                .into_iter()
                .partition(|o| match o.side {
                    OrderSide::Buy => price <= o.price,
                    OrderSide::Sell => price >= o.price,
                });
        book.resting = resting;

        let mut filled = Vec::with_capacity(crossed.len());
        for mut order in crossed {
            let (asset, amount) = match order.side {
                OrderSide::Buy => (&self.base_asset, order.quantity),
                OrderSide::Sell => (&self.quote_asset, order.quantity * order.price),
            };
            *book.balances.entry(asset.clone()).or_default() += amount;
            book.closed.insert(order.order_id, OrderStatus::Filled);
            order.status = OrderStatus::Filled;

            debug!(
                order_id = order.order_id,
                side = %order.side,
                price = %order.price,
                qty = %order.quantity,
                "Paper fill simulated"
            );
            filled.push(order);
        }
        filled
    }

    fn locked_funds(&self, order: &Order) -> (String, Decimal) {
        match order.side {
            OrderSide::Buy => (self.quote_asset.clone(), order.quantity * order.price),
            OrderSide::Sell => (self.base_asset.clone(), order.quantity),
        }
    }
}

#[async_trait]
impl ExchangeClient for PaperClient {
    async fn current_price(&self, symbol: &str) -> Result<Decimal> {
        let book = self.book.read().await;
        match book.last_price {
            Some(price) if symbol == self.symbol => Ok(price),
            _ => Err(Error::Exchange(format!("No price available for {symbol}"))),
        }
    }

    async fn free_balance(&self, asset: &str) -> Result<Decimal> {
        Ok(self
            .book
            .read()
            .await
            .balances
            .get(asset)
            .copied()
            .unwrap_or(Decimal::ZERO))
    }

    async fn submit_limit_order(&self, request: &LimitOrderRequest) -> Result<Order> {
        if request.symbol != self.symbol {
            return Err(Error::Exchange(format!(
                "PaperClient only trades {}, got '{}'",
                self.symbol, request.symbol
            )));
        }
        if request.quantity <= Decimal::ZERO || request.price <= Decimal::ZERO {
            return Err(Error::Exchange("quantity and price must be positive".into()));
        }

        let mut book = self.book.write().await;
        let order = Order {
            order_id: book.next_id,
            client_order_id: request.client_order_id.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            quantity: request.quantity,
            price: request.price,
            status: OrderStatus::New,
        };

        let (asset, amount) = self.locked_funds(&order);
        let free = book.balances.entry(asset.clone()).or_default();
        if *free < amount {
            return Err(Error::Exchange(format!(
                "Account has insufficient balance for requested action: {asset} free {free}, needed {amount}"
            )));
        }
        *free -= amount;
        book.next_id += 1;
        book.resting.push(order.clone());

        // A limit that is already marketable fills straight away.
        if let Some(price) = book.last_price {
            self.match_resting(&mut book, price);
        }

        Ok(order)
    }

    async fn order_status(&self, symbol: &str, order_id: u64) -> Result<OrderStatus> {
        let book = self.book.read().await;
        if book
            .resting
            .iter()
            .any(|o| o.order_id == order_id && o.symbol == symbol)
        {
            return Ok(OrderStatus::New);
        }
        book.closed
            .get(&order_id)
            .copied()
            .ok_or_else(|| Error::Exchange(format!("Order {order_id} does not exist")))
    }

    async fn open_orders(&self, symbol: &str) -> Result<Vec<Order>> {
        Ok(self
            .book
            .read()
            .await
            .resting
            .iter()
            .filter(|o| o.symbol == symbol)
            .cloned()
            .collect())
    }

    async fn cancel_order(&self, symbol: &str, order_id: u64) -> Result<()> {
        let mut book = self.book.write().await;
        let idx = book
            .resting
            .iter()
            .position(|o| o.order_id == order_id && o.symbol == symbol)
            .ok_or_else(|| Error::Exchange(format!("Unknown order {order_id}")))?;

        let order = book.resting.remove(idx);
        let (asset, amount) = self.locked_funds(&order);
        *book.balances.entry(asset).or_default() += amount;
        book.closed.insert(order_id, OrderStatus::Canceled);
        Ok(())
    }
}
