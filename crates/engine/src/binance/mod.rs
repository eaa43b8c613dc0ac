pub mod rest;
pub mod stream;

pub use rest::{BinanceClient, MarketSnapshot};
pub use stream::BinanceStream;
