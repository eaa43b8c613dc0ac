use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use common::{
    CycleState, DeclineReason, Error, ExchangeClient, Order, OrderStatus, Placement, Result,
    Shutdown,
};
use strategy::{MakerConfig, RetryConfig};

use crate::placer::OrderPlacer;
use crate::waiter::{FillWaiter, WaitOutcome};

/// How one buy→sell cycle ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// Both legs placed and the symbol's open orders drained.
    Completed { buy: Order, sell: Order },
    /// No buy was placed.
    Declined(DeclineReason),
    /// The buy never filled and was given up on.
    BuyAbandoned { buy: Order, wait: WaitOutcome },
    /// Shutdown interrupted the cycle.
    Cancelled,
}

/// Cloneable, read-only view of the driver.
#[derive(Clone)]
pub struct DriverHandle {
    state_rx: watch::Receiver<CycleState>,
    cycles: Arc<AtomicU64>,
}

impl DriverHandle {
    pub fn state(&self) -> CycleState {
        self.state_rx.borrow().clone()
    }

    pub fn in_flight(&self) -> bool {
        self.state_rx.borrow().in_flight()
    }

    pub fn cycles_completed(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Receive every state transition.
    pub fn subscribe(&self) -> watch::Receiver<CycleState> {
        self.state_rx.clone()
    }
}

/// Runs the maker cycle: buy below market, wait, sell above the buy, wait,
/// and start over.
///
/// Cycles never overlap. A new buy is only placed from `CycleState::Idle`.
pub struct CycleDriver {
    symbol: String,
    placer: OrderPlacer,
    waiter: FillWaiter,
    decline_delay: Duration,
    retry: RetryConfig,
    state_tx: watch::Sender<CycleState>,
    cycles: Arc<AtomicU64>,
}

impl CycleDriver {
    pub fn new(client: Arc<dyn ExchangeClient>, config: MakerConfig) -> (Self, DriverHandle) {
        let (state_tx, state_rx) = watch::channel(CycleState::Idle);
        let cycles = Arc::new(AtomicU64::new(0));

        let handle = DriverHandle {
            state_rx,
            cycles: cycles.clone(),
        };

        let driver = CycleDriver {
            symbol: config.symbol.clone(),
            waiter: FillWaiter::new(
                client.clone(),
                config.poll_interval(),
                config.buy_fill_timeout(),
            ),
            decline_delay: config.decline_delay(),
            retry: config.retry.clone(),
            placer: OrderPlacer::new(client, config),
            state_tx,
            cycles,
        };

        (driver, handle)
    }

    fn set_state(&self, state: CycleState) {
        debug!(symbol = %self.symbol, state = %state, "Cycle state");
        self.state_tx.send_replace(state);
    }

    /// Run cycles until shutdown, a fatal error, or the failure budget runs out.
    /// Call from `tokio::spawn`.
    pub async fn run(self, shutdown: Shutdown) -> Result<()> {
        info!(symbol = %self.symbol, "Cycle driver started");

        if let Err(e) = self.recover(&shutdown).await {
            if e.is_fatal() {
                error!(error = %e, "Startup recovery failed");
                return Err(e);
            }
            warn!(error = %e, "Could not check for leftover open orders, starting anyway");
        }

        let initial_backoff = self.retry.initial_backoff();
        let mut backoff = initial_backoff;
        let mut failures: u32 = 0;

        while !shutdown.is_triggered() {
            let delay = match self.run_cycle(&shutdown).await {
                Ok(CycleOutcome::Completed { buy, sell }) => {
                    info!(
                        symbol = %self.symbol,
                        buy_price = %buy.price,
                        sell_price = %sell.price,
                        cycles = self.cycles.load(Ordering::Relaxed),
                        "Cycle completed"
                    );
                    failures = 0;
                    backoff = initial_backoff;
                    None
                }
                Ok(CycleOutcome::BuyAbandoned { buy, wait }) => {
                    info!(order_id = buy.order_id, wait = ?wait, "Buy abandoned, starting a new cycle");
                    failures = 0;
                    backoff = initial_backoff;
                    None
                }
                Ok(CycleOutcome::Declined(reason)) => {
                    info!(%reason, delay = ?self.decline_delay, "Buy declined, retrying later");
                    failures = 0;
                    backoff = initial_backoff;
                    Some(self.decline_delay)
                }
                Ok(CycleOutcome::Cancelled) => break,
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Cycle failed with a fatal error, stopping");
                    return Err(e);
                }
                Err(e) => {
                    failures += 1;
                    if let Some(budget) = self.retry.max_consecutive_failures {
                        if failures >= budget {
                            error!(failures, error = %e, "Failure budget exhausted, stopping");
                            return Err(Error::FailureBudgetExhausted {
                                failures,
                                last: e.to_string(),
                            });
                        }
                    }
                    warn!(failures, error = %e, backoff = ?backoff, "Cycle failed, backing off");
                    let delay = backoff;
                    backoff = (backoff * 2).min(self.retry.max_backoff());
                    Some(delay)
                }
            };

            if let Some(delay) = delay {
                if !pause(delay, &shutdown).await {
                    break;
                }
            }
        }

        info!(symbol = %self.symbol, "Cycle driver stopped");
        Ok(())
    }

    /// Wait out open orders left on the symbol by an earlier process before
    /// the first buy, so a restart does not stack a second cycle on top.
    pub async fn recover(&self, shutdown: &Shutdown) -> Result<()> {
        let open = self.waiter.open_orders(&self.symbol).await?;
        if open.is_empty() {
            return Ok(());
        }

        let ids: Vec<u64> = open.iter().map(|o| o.order_id).collect();
        warn!(symbol = %self.symbol, ?ids, "Open orders found at startup, waiting for them to clear");
        if self.waiter.wait_for_sell_fill(&self.symbol, shutdown).await == WaitOutcome::Filled {
            info!(symbol = %self.symbol, "Leftover orders cleared");
        }
        Ok(())
    }

    /// Run exactly one cycle from `Idle` back to `Idle`.
    ///
    /// A failed buy placement returns `Err`. Once the buy is on the book only
    /// fatal errors escape, plus a cancel that fails while the buy is still
    /// open. That buy stays in `AwaitingBuyFill` and the next call retries
    /// the cancel instead of placing another buy. Shutdown during the sell
    /// wait leaves the state at `AwaitingSellFill`, since the sell is still
    /// resting on the exchange.
    pub async fn run_cycle(&self, shutdown: &Shutdown) -> Result<CycleOutcome> {
        let (buy, wait) = match self.stranded_buy() {
            Some(buy) => {
                warn!(order_id = buy.order_id, "Retrying cancel of a buy still on the book");
                (buy, WaitOutcome::TimedOut)
            }
            None => {
                let buy = match self.placer.place_buy_order().await? {
                    Placement::Placed(order) => order,
                    Placement::Declined(reason) => return Ok(CycleOutcome::Declined(reason)),
                };
                self.set_state(CycleState::BuyPlaced { buy: buy.clone() });

                self.set_state(CycleState::AwaitingBuyFill { buy: buy.clone() });
                let wait = self.waiter.wait_for_buy_fill(&buy, shutdown).await;
                (buy, wait)
            }
        };

        match wait {
            WaitOutcome::Filled => {}
            WaitOutcome::Closed(_) => {
                self.set_state(CycleState::Idle);
                return Ok(CycleOutcome::BuyAbandoned { buy, wait });
            }
            WaitOutcome::TimedOut | WaitOutcome::Cancelled => {
                match self.withdraw_buy(&buy).await? {
                    Withdrawal::Filled => {}
                    Withdrawal::Closed if wait == WaitOutcome::Cancelled => {
                        self.set_state(CycleState::Idle);
                        return Ok(CycleOutcome::Cancelled);
                    }
                    Withdrawal::Closed => {
                        self.set_state(CycleState::Idle);
                        return Ok(CycleOutcome::BuyAbandoned { buy, wait });
                    }
                }
            }
        }

        let sell = match self.place_sell_with_retry(&buy, shutdown).await {
            Ok(Some(sell)) => sell,
            Ok(None) => {
                warn!(order_id = buy.order_id, "Shutdown before the sell was placed, bought inventory left unsold");
                self.set_state(CycleState::Idle);
                return Ok(CycleOutcome::Cancelled);
            }
            Err(e) => {
                self.set_state(CycleState::Idle);
                return Err(e);
            }
        };
        self.set_state(CycleState::SellPlaced {
            buy: buy.clone(),
            sell: sell.clone(),
        });

        self.set_state(CycleState::AwaitingSellFill {
            buy: buy.clone(),
            sell: sell.clone(),
        });
        if self.waiter.wait_for_sell_fill(&self.symbol, shutdown).await == WaitOutcome::Cancelled {
            info!(order_id = sell.order_id, "Shutdown with the sell order still resting");
            return Ok(CycleOutcome::Cancelled);
        }

        match self.waiter.final_status(&sell).await {
            Ok(OrderStatus::Filled) => {}
            Ok(status) => {
                warn!(order_id = sell.order_id, %status, "Sell order left the book without filling")
            }
            Err(e) => warn!(order_id = sell.order_id, error = %e, "Could not confirm sell status"),
        }

        self.set_state(CycleState::Idle);
        self.cycles.fetch_add(1, Ordering::Relaxed);
        Ok(CycleOutcome::Completed { buy, sell })
    }

    /// Buy left in `AwaitingBuyFill` by an earlier cycle whose cancel failed.
    fn stranded_buy(&self) -> Option<Order> {
        match &*self.state_tx.borrow() {
            CycleState::AwaitingBuyFill { buy } => Some(buy.clone()),
            _ => None,
        }
    }

    /// Cancel an unfilled buy. When the cancel is refused, the order's own
    /// status decides: a fill carries on to the sell, an order still open
    /// is an error and keeps the cycle in flight.
    async fn withdraw_buy(&self, buy: &Order) -> Result<Withdrawal> {
        // A partial fill stays in the account as base asset.
        let cancel_err = match self.placer.cancel_order(buy).await {
            Ok(()) => return Ok(Withdrawal::Closed),
            Err(e) => e,
        };

        match self.waiter.final_status(buy).await {
            Ok(status) if status.is_filled() => {
                warn!(order_id = buy.order_id, "Buy filled before it could be canceled, selling it");
                Ok(Withdrawal::Filled)
            }
            Ok(status) if status.is_terminal() => {
                info!(order_id = buy.order_id, %status, "Buy already closed");
                Ok(Withdrawal::Closed)
            }
            Ok(status) => {
                warn!(order_id = buy.order_id, %status, "Buy still open after failed cancel");
                Err(cancel_err)
            }
            Err(e) => {
                warn!(order_id = buy.order_id, error = %e, "Could not read buy status after failed cancel");
                Err(cancel_err)
            }
        }
    }

    /// The buy has filled, so the sell is retried until it is accepted.
    /// Returns `None` on shutdown.
    async fn place_sell_with_retry(&self, buy: &Order, shutdown: &Shutdown) -> Result<Option<Order>> {
        let mut backoff = self.retry.initial_backoff();
        loop {
            match self.placer.place_sell_order(buy).await {
                Ok(sell) => return Ok(Some(sell)),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(order_id = buy.order_id, error = %e, backoff = ?backoff, "Sell placement failed, retrying");
                }
            }
            if !pause(backoff, shutdown).await {
                return Ok(None);
            }
            backoff = (backoff * 2).min(self.retry.max_backoff());
        }
    }
}

/// Where a buy ended up after the driver tried to cancel it.
#[derive(Debug, PartialEq)]
enum Withdrawal {
    /// Off the book without filling.
    Closed,
    /// Filled before the cancel landed.
    Filled,
}

/// Sleep unless shutdown comes first. Returns `false` on shutdown.
async fn pause(delay: Duration, shutdown: &Shutdown) -> bool {
    tokio::select! {
        biased;
        _ = shutdown.wait() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Fault, ScriptedExchange};
    use common::{shutdown, OrderSide};
    use rust_decimal_macros::dec;
    use tokio::time::Instant;

    const SECOND: Duration = Duration::from_secs(1);

    fn driver(exchange: &Arc<ScriptedExchange>, config: MakerConfig) -> (CycleDriver, DriverHandle) {
        CycleDriver::new(exchange.clone(), config)
    }

    fn funded() -> ScriptedExchange {
        ScriptedExchange::new()
            .prices(&[dec!(100.00)])
            .balance("USDT", dec!(500))
    }

    #[tokio::test(start_paused = true)]
    async fn full_cycle_end_to_end() {
        let exchange = Arc::new(
            funded()
                .statuses(vec![
                    Ok(OrderStatus::New),
                    Ok(OrderStatus::New),
                    Ok(OrderStatus::Filled),
                ])
                .open_order_counts("SOLUSDT", &[1, 1, 0]),
        );
        let (driver, handle) = driver(&exchange, MakerConfig::default());
        let (_trigger, shutdown) = shutdown::channel();

        let start = Instant::now();
        let outcome = driver.run_cycle(&shutdown).await.unwrap();

        let CycleOutcome::Completed { buy, sell } = outcome else {
            panic!("expected a completed cycle, got {outcome:?}");
        };
        assert_eq!(buy.price, dec!(99.80));
        assert_eq!(sell.price, dec!(100.00));
        assert_eq!(sell.side, OrderSide::Sell);
        assert_eq!(sell.quantity, dec!(3));

        assert_eq!(exchange.status_polls(buy.order_id), 3);
        assert_eq!(exchange.open_order_polls(), 3);
        // Two intervals on each leg.
        assert_eq!(start.elapsed(), 4 * SECOND);

        assert_eq!(handle.state(), CycleState::Idle);
        assert!(!handle.in_flight());
        assert_eq!(handle.cycles_completed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn declined_buy_leaves_driver_idle() {
        let exchange = Arc::new(
            ScriptedExchange::new()
                .prices(&[dec!(100.00)])
                .balance("USDT", dec!(100)),
        );
        let (driver, handle) = driver(&exchange, MakerConfig::default());
        let (_trigger, shutdown) = shutdown::channel();

        let outcome = driver.run_cycle(&shutdown).await.unwrap();

        assert!(matches!(outcome, CycleOutcome::Declined(_)));
        assert!(exchange.submissions().is_empty());
        assert!(!handle.in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_buy_submission_returns_error_and_stays_idle() {
        let exchange = Arc::new(funded().fail_submissions(&[0]));
        let (driver, handle) = driver(&exchange, MakerConfig::default());
        let (_trigger, shutdown) = shutdown::channel();

        assert!(driver.run_cycle(&shutdown).await.is_err());
        assert!(!handle.in_flight());
        assert_eq!(exchange.status_polls(1), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_is_in_flight_while_waiting_for_buy() {
        let exchange = Arc::new(funded().statuses(vec![Ok(OrderStatus::New)]));
        let (driver, handle) = driver(&exchange, MakerConfig::default());
        let (trigger, shutdown) = shutdown::channel();

        let task = tokio::spawn(async move { driver.run_cycle(&shutdown).await });
        tokio::time::sleep(5 * SECOND).await;

        assert!(handle.in_flight());
        assert!(matches!(handle.state(), CycleState::AwaitingBuyFill { .. }));

        trigger.trigger();
        let outcome = task.await.unwrap().unwrap();

        assert_eq!(outcome, CycleOutcome::Cancelled);
        // The resting buy is pulled on shutdown.
        assert_eq!(exchange.cancels(), vec![1]);
        assert!(!handle.in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn unfilled_buy_is_cancelled_after_deadline() {
        let exchange = Arc::new(funded().statuses(vec![Ok(OrderStatus::New)]));
        let config = MakerConfig {
            buy_fill_timeout_secs: Some(3),
            ..MakerConfig::default()
        };
        let (driver, handle) = driver(&exchange, config);
        let (_trigger, shutdown) = shutdown::channel();

        let outcome = driver.run_cycle(&shutdown).await.unwrap();

        let CycleOutcome::BuyAbandoned { buy, wait } = outcome else {
            panic!("expected an abandoned buy, got {outcome:?}");
        };
        assert_eq!(wait, WaitOutcome::TimedOut);
        assert_eq!(exchange.cancels(), vec![buy.order_id]);
        assert_eq!(exchange.submissions().len(), 1);
        assert!(!handle.in_flight());
    }

    fn slow_polls_with_deadline() -> MakerConfig {
        // Polls at 0s and 2s, deadline at 3s.
        MakerConfig {
            poll_interval_ms: 2_000,
            buy_fill_timeout_secs: Some(3),
            ..MakerConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn buy_that_fills_during_cancel_still_gets_a_sell() {
        let exchange = Arc::new(
            funded()
                .statuses(vec![
                    Ok(OrderStatus::New),
                    Ok(OrderStatus::New),
                    Ok(OrderStatus::Filled),
                ])
                .cancel_results(vec![Err(Fault::UnknownOrder)])
                .open_order_counts("SOLUSDT", &[0]),
        );
        let (driver, handle) = driver(&exchange, slow_polls_with_deadline());
        let (_trigger, shutdown) = shutdown::channel();

        let start = Instant::now();
        let outcome = driver.run_cycle(&shutdown).await.unwrap();

        let CycleOutcome::Completed { buy, sell } = outcome else {
            panic!("expected the filled buy to be sold, got {outcome:?}");
        };
        assert_eq!(exchange.cancels(), vec![buy.order_id]);
        assert_eq!(sell.price, dec!(100.00));
        let sides: Vec<OrderSide> = exchange.submissions().iter().map(|s| s.side).collect();
        assert_eq!(sides, vec![OrderSide::Buy, OrderSide::Sell]);
        assert_eq!(start.elapsed(), 3 * SECOND);
        assert_eq!(handle.cycles_completed(), 1);
        assert!(!handle.in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn buy_left_open_by_failed_cancel_stays_in_flight() {
        let exchange = Arc::new(
            funded()
                .statuses(vec![Ok(OrderStatus::New)])
                .cancel_results(vec![Err(Fault::Http), Ok(())]),
        );
        let (driver, handle) = driver(&exchange, slow_polls_with_deadline());
        let (_trigger, shutdown) = shutdown::channel();

        let err = driver.run_cycle(&shutdown).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
        assert!(handle.in_flight());
        assert!(matches!(handle.state(), CycleState::AwaitingBuyFill { buy } if buy.order_id == 1));

        // The next cycle finishes pulling the same buy rather than adding one.
        let outcome = driver.run_cycle(&shutdown).await.unwrap();
        assert!(matches!(
            outcome,
            CycleOutcome::BuyAbandoned { ref buy, wait: WaitOutcome::TimedOut } if buy.order_id == 1
        ));
        assert_eq!(exchange.cancels(), vec![1, 1]);
        assert_eq!(exchange.submissions().len(), 1);
        assert!(!handle.in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn driver_backs_off_until_open_buy_is_cancelled() {
        let exchange = Arc::new(
            funded()
                .statuses(vec![Ok(OrderStatus::New)])
                .cancel_results(vec![Err(Fault::Http), Err(Fault::Http), Ok(())]),
        );
        let (driver, _handle) = driver(&exchange, slow_polls_with_deadline());
        let (trigger, shutdown) = shutdown::channel();

        let task = tokio::spawn(driver.run(shutdown));

        // Cancel fails at 3s and 4s, lands at 6s.
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(exchange.submissions().len(), 1);

        // Then the next buy goes out straight away.
        tokio::time::sleep(SECOND).await;
        assert_eq!(exchange.submissions().len(), 2);

        trigger.trigger();
        task.await.unwrap().unwrap();
        assert_eq!(exchange.cancels(), vec![1, 1, 1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn externally_cancelled_buy_is_not_cancelled_again() {
        let exchange = Arc::new(funded().statuses(vec![Ok(OrderStatus::Canceled)]));
        let (driver, _handle) = driver(&exchange, MakerConfig::default());
        let (_trigger, shutdown) = shutdown::channel();

        let outcome = driver.run_cycle(&shutdown).await.unwrap();

        assert!(matches!(
            outcome,
            CycleOutcome::BuyAbandoned { wait: WaitOutcome::Closed(OrderStatus::Canceled), .. }
        ));
        assert!(exchange.cancels().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_sell_is_retried_with_backoff() {
        let exchange = Arc::new(
            funded()
                .statuses(vec![Ok(OrderStatus::Filled)])
                .open_order_counts("SOLUSDT", &[0])
                .fail_submissions(&[1, 2]),
        );
        let (driver, _handle) = driver(&exchange, MakerConfig::default());
        let (_trigger, shutdown) = shutdown::channel();

        let start = Instant::now();
        let outcome = driver.run_cycle(&shutdown).await.unwrap();

        assert!(matches!(outcome, CycleOutcome::Completed { .. }));
        let submissions = exchange.submissions();
        assert_eq!(submissions.len(), 4);
        assert!(submissions[1..].iter().all(|s| s.side == OrderSide::Sell));
        assert!(submissions[1..].iter().all(|s| s.price == dec!(100.00)));
        // 1s then 2s of backoff between the three sell attempts.
        assert_eq!(start.elapsed(), 3 * SECOND);
    }

    #[tokio::test(start_paused = true)]
    async fn driver_starts_next_cycle_with_next_price() {
        let exchange = Arc::new(
            ScriptedExchange::new()
                .latency(Duration::from_millis(5))
                .prices(&[dec!(100.00), dec!(101.00)])
                .balance("USDT", dec!(500))
                .statuses(vec![Ok(OrderStatus::Filled)])
                .open_order_counts("SOLUSDT", &[0]),
        );
        let (driver, handle) = driver(&exchange, MakerConfig::default());
        let (trigger, shutdown) = shutdown::channel();

        let task = tokio::spawn(driver.run(shutdown));
        while exchange.submissions().len() < 3 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        trigger.trigger();
        task.await.unwrap().unwrap();

        let submissions = exchange.submissions();
        assert_eq!(submissions[0].price, dec!(99.80));
        assert_eq!(submissions[1].price, dec!(100.00));
        assert_eq!(submissions[2].side, OrderSide::Buy);
        // 101.00 * 0.998 = 100.798
        assert_eq!(submissions[2].price, dec!(100.80));
        assert!(handle.cycles_completed() >= 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_budget_stops_the_driver() {
        let exchange = Arc::new(
            ScriptedExchange::new()
                .prices(&[dec!(100.00)])
                .balance_fault(Fault::Http),
        );
        let mut config = MakerConfig::default();
        config.retry.max_consecutive_failures = Some(3);
        let (driver, _handle) = driver(&exchange, config);
        let (_trigger, shutdown) = shutdown::channel();

        let start = Instant::now();
        let err = driver.run(shutdown).await.unwrap_err();

        assert!(matches!(err, Error::FailureBudgetExhausted { failures: 3, .. }));
        // Backoff of 1s then 2s between the three attempts.
        assert_eq!(start.elapsed(), 3 * SECOND);
        assert!(exchange.submissions().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn auth_failure_stops_the_driver_immediately() {
        let exchange = Arc::new(
            ScriptedExchange::new()
                .prices(&[dec!(100.00)])
                .balance_fault(Fault::Auth),
        );
        let (driver, _handle) = driver(&exchange, MakerConfig::default());
        let (_trigger, shutdown) = shutdown::channel();

        let start = Instant::now();
        let err = driver.run(shutdown).await.unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn declined_buys_are_retried_after_a_delay() {
        let exchange = Arc::new(
            ScriptedExchange::new()
                .prices(&[dec!(100.00)])
                .balance("USDT", dec!(10)),
        );
        let (driver, handle) = driver(&exchange, MakerConfig::default());
        let (trigger, shutdown) = shutdown::channel();

        let task = tokio::spawn(driver.run(shutdown));
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        trigger.trigger();
        task.await.unwrap().unwrap();

        // Attempts at 0s, 1s and 2s.
        assert_eq!(exchange.price_queries(), 3);
        assert!(exchange.submissions().is_empty());
        assert!(!handle.in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn restart_waits_for_leftover_orders_before_buying() {
        let exchange = Arc::new(
            funded()
                .statuses(vec![Ok(OrderStatus::New)])
                .open_order_counts("SOLUSDT", &[1, 1, 1, 0]),
        );
        let (driver, _handle) = driver(&exchange, MakerConfig::default());
        let (trigger, shutdown) = shutdown::channel();

        let task = tokio::spawn(driver.run(shutdown));

        // Startup check at 0s, then drain polls at 0s, 1s and 2s.
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert!(exchange.submissions().is_empty());

        tokio::time::sleep(SECOND).await;
        assert_eq!(exchange.submissions().len(), 1);

        trigger.trigger();
        task.await.unwrap().unwrap();
    }
}
