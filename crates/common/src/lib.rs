pub mod config;
pub mod error;
pub mod exchange;
pub mod shutdown;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use exchange::ExchangeClient;
pub use shutdown::{Shutdown, ShutdownTrigger};
pub use types::*;
