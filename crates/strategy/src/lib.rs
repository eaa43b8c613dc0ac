pub mod config;
pub mod pricing;

pub use config::{MakerConfig, RetryConfig};
