pub mod binance;
pub mod driver;
pub mod placer;
pub mod waiter;

#[cfg(test)]
mod testing;

pub use binance::{BinanceClient, BinanceStream, MarketSnapshot};
pub use driver::{CycleDriver, CycleOutcome, DriverHandle};
pub use placer::OrderPlacer;
pub use waiter::{FillWaiter, WaitOutcome};
