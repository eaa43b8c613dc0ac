//! Scripted exchange used by the engine's unit tests.
//!
//! Each scripted sequence is consumed one entry per call; the last entry
//! repeats once the sequence is exhausted.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use common::{Error, ExchangeClient, LimitOrderRequest, Order, OrderSide, OrderStatus, Result};

#[derive(Debug, Clone, Copy)]
pub enum Fault {
    Http,
    Auth,
    /// Binance -2011, e.g. cancelling an order that already filled.
    UnknownOrder,
}

impl Fault {
    fn error(self) -> Error {
        match self {
            Fault::Http => Error::Http("connection reset".into()),
            Fault::Auth => Error::Auth("HTTP 401: invalid api key".into()),
            Fault::UnknownOrder => Error::Exchange(
                "HTTP 400: {\"code\":-2011,\"msg\":\"Unknown order sent.\"}".into(),
            ),
        }
    }
}

#[derive(Default)]
struct Script {
    prices: VecDeque<Decimal>,
    balances: HashMap<String, Decimal>,
    balance_fault: Option<Fault>,
    statuses: VecDeque<std::result::Result<OrderStatus, Fault>>,
    open_orders: VecDeque<std::result::Result<Vec<Order>, Fault>>,
    cancel_results: VecDeque<std::result::Result<(), Fault>>,
    failing_submissions: HashSet<usize>,
    submissions: Vec<LimitOrderRequest>,
    status_polls: HashMap<u64, usize>,
    open_order_polls: usize,
    price_queries: usize,
    cancels: Vec<u64>,
    next_id: u64,
}

fn next<T: Clone>(seq: &mut VecDeque<T>) -> Option<T> {
    if seq.len() > 1 {
        seq.pop_front()
    } else {
        seq.front().cloned()
    }
}

pub struct ScriptedExchange {
    script: Mutex<Script>,
    latency: Option<Duration>,
}

impl ScriptedExchange {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                next_id: 1,
                ..Script::default()
            }),
            latency: None,
        }
    }

    /// Make every call take this long, so a looping driver lets the clock move.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn with(self, f: impl FnOnce(&mut Script)) -> Self {
        f(&mut self.script.lock().unwrap());
        self
    }

    pub fn prices(self, prices: &[Decimal]) -> Self {
        self.with(|s| s.prices = prices.iter().copied().collect())
    }

    pub fn balance(self, asset: &str, amount: Decimal) -> Self {
        self.with(|s| {
            s.balances.insert(asset.to_string(), amount);
        })
    }

    pub fn balance_fault(self, fault: Fault) -> Self {
        self.with(|s| s.balance_fault = Some(fault))
    }

    pub fn statuses(self, statuses: Vec<std::result::Result<OrderStatus, Fault>>) -> Self {
        self.with(|s| s.statuses = statuses.into())
    }

    /// Account-wide open orders per poll; `open_orders(symbol)` filters them.
    pub fn open_orders(self, seq: Vec<std::result::Result<Vec<Order>, Fault>>) -> Self {
        self.with(|s| s.open_orders = seq.into())
    }

    /// Open orders on `symbol` per poll, `n` resting sells each.
    pub fn open_order_counts(self, symbol: &str, counts: &[usize]) -> Self {
        let seq = counts
            .iter()
            .map(|&n| Ok((0..n).map(|i| resting_order(symbol, 900 + i as u64)).collect()))
            .collect();
        self.open_orders(seq)
    }

    /// Outcome of each cancel call in turn.
    pub fn cancel_results(self, results: Vec<std::result::Result<(), Fault>>) -> Self {
        self.with(|s| s.cancel_results = results.into())
    }

    /// Reject the submissions at these zero-based positions.
    pub fn fail_submissions(self, positions: &[usize]) -> Self {
        self.with(|s| s.failing_submissions = positions.iter().copied().collect())
    }

    pub fn submissions(&self) -> Vec<LimitOrderRequest> {
        self.script.lock().unwrap().submissions.clone()
    }

    pub fn status_polls(&self, order_id: u64) -> usize {
        self.script
            .lock()
            .unwrap()
            .status_polls
            .get(&order_id)
            .copied()
            .unwrap_or(0)
    }

    pub fn open_order_polls(&self) -> usize {
        self.script.lock().unwrap().open_order_polls
    }

    pub fn price_queries(&self) -> usize {
        self.script.lock().unwrap().price_queries
    }

    pub fn cancels(&self) -> Vec<u64> {
        self.script.lock().unwrap().cancels.clone()
    }
}

pub fn resting_order(symbol: &str, order_id: u64) -> Order {
    Order {
        order_id,
        client_order_id: format!("resting-{order_id}"),
        symbol: symbol.to_string(),
        side: OrderSide::Sell,
        quantity: Decimal::ONE,
        price: Decimal::ONE_HUNDRED,
        status: OrderStatus::New,
    }
}

#[async_trait]
impl ExchangeClient for ScriptedExchange {
    async fn current_price(&self, symbol: &str) -> Result<Decimal> {
        self.delay().await;
        let mut s = self.script.lock().unwrap();
        s.price_queries += 1;
        next(&mut s.prices).ok_or_else(|| Error::Exchange(format!("no price for {symbol}")))
    }

    async fn free_balance(&self, asset: &str) -> Result<Decimal> {
        self.delay().await;
        let s = self.script.lock().unwrap();
        if let Some(fault) = s.balance_fault {
            return Err(fault.error());
        }
        Ok(s.balances.get(asset).copied().unwrap_or(Decimal::ZERO))
    }

    async fn submit_limit_order(&self, request: &LimitOrderRequest) -> Result<Order> {
        self.delay().await;
        let mut s = self.script.lock().unwrap();
        let position = s.submissions.len();
        s.submissions.push(request.clone());
        if s.failing_submissions.contains(&position) {
            return Err(Error::Exchange("HTTP 400: {\"code\":-1013}".into()));
        }
        let order_id = s.next_id;
        s.next_id += 1;
        Ok(Order {
            order_id,
            client_order_id: request.client_order_id.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            quantity: request.quantity,
            price: request.price,
            status: OrderStatus::New,
        })
    }

    async fn order_status(&self, _symbol: &str, order_id: u64) -> Result<OrderStatus> {
        self.delay().await;
        let mut s = self.script.lock().unwrap();
        *s.status_polls.entry(order_id).or_default() += 1;
        match next(&mut s.statuses) {
            Some(Ok(status)) => Ok(status),
            Some(Err(fault)) => Err(fault.error()),
            None => Ok(OrderStatus::New),
        }
    }

    async fn open_orders(&self, symbol: &str) -> Result<Vec<Order>> {
        self.delay().await;
        let mut s = self.script.lock().unwrap();
        s.open_order_polls += 1;
        match next(&mut s.open_orders) {
            Some(Ok(orders)) => Ok(orders.into_iter().filter(|o| o.symbol == symbol).collect()),
            Some(Err(fault)) => Err(fault.error()),
            None => Ok(Vec::new()),
        }
    }

    async fn cancel_order(&self, _symbol: &str, order_id: u64) -> Result<()> {
        self.delay().await;
        let mut s = self.script.lock().unwrap();
        s.cancels.push(order_id);
        match next(&mut s.cancel_results) {
            Some(Err(fault)) => Err(fault.error()),
            _ => Ok(()),
        }
    }
}
