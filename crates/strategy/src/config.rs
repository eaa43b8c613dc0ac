use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use common::{Error, Result};

/// Maker cycle parameters (TOML).
///
/// Example `config/maker.toml`:
/// ```toml
/// symbol = "SOLUSDT"
/// base_asset = "SOL"
/// quote_asset = "USDT"
/// buy_quantity = "3"
/// sell_quantity = "3"
/// buy_offset = "0.002"
/// sell_offset = "0.002"
/// poll_interval_ms = 1000
///
/// [retry]
/// initial_backoff_ms = 1000
/// max_backoff_ms = 60000
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MakerConfig {
    /// Trading pair, e.g. "SOLUSDT".
    pub symbol: String,
    pub base_asset: String,
    /// Asset spent on the buy leg; its free balance gates every buy.
    pub quote_asset: String,
    pub buy_quantity: Decimal,
    pub sell_quantity: Decimal,
    /// Fraction below market for the buy limit (0.002 = 0.2%).
    pub buy_offset: Decimal,
    /// Fraction above the buy price for the sell limit.
    pub sell_offset: Decimal,
    /// Price precision of the symbol.
    pub price_decimals: u32,
    pub poll_interval_ms: u64,
    /// Pause before retrying after a declined buy.
    pub decline_delay_ms: u64,
    /// Cancel an unfilled buy after this long. Unset waits forever.
    pub buy_fill_timeout_secs: Option<u64>,
    pub retry: RetryConfig,
}

/// Backoff applied by the cycle driver after a failed cycle.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Stop after this many failed cycles in a row. Unset retries forever.
    pub max_consecutive_failures: Option<u32>,
}

impl Default for MakerConfig {
    fn default() -> Self {
        Self {
            symbol: "SOLUSDT".to_string(),
            base_asset: "SOL".to_string(),
            quote_asset: "USDT".to_string(),
            buy_quantity: Decimal::from(3),
            sell_quantity: Decimal::from(3),
            buy_offset: Decimal::new(2, 3),
            sell_offset: Decimal::new(2, 3),
            price_decimals: 2,
            poll_interval_ms: 1_000,
            decline_delay_ms: 1_000,
            buy_fill_timeout_secs: None,
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
            max_consecutive_failures: None,
        }
    }
}

impl MakerConfig {
    /// Load and validate from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read strategy config at '{path}': {e}"))
        })?;
        let cfg = Self::from_toml(&content)
            .map_err(|e| Error::Config(format!("Invalid strategy config at '{path}': {e}")))?;
        info!(
            path,
            symbol = %cfg.symbol,
            poll_interval_ms = cfg.poll_interval_ms,
            buy_fill_timeout_secs = ?cfg.buy_fill_timeout_secs,
            "Strategy config loaded"
        );
        Ok(cfg)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let cfg: MakerConfig =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        cfg.validate()?;
        debug!(?cfg, "Strategy config validated");
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buy_quantity <= Decimal::ZERO || self.sell_quantity <= Decimal::ZERO {
            return Err(Error::Config("order quantities must be positive".into()));
        }
        for (name, offset) in [("buy_offset", self.buy_offset), ("sell_offset", self.sell_offset)] {
            if offset < Decimal::ZERO || offset >= Decimal::ONE {
                return Err(Error::Config(format!("{name} must be in [0, 1), got {offset}")));
            }
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(Error::Config(
                "retry.initial_backoff_ms must not exceed retry.max_backoff_ms".into(),
            ));
        }
        if self.symbol != format!("{}{}", self.base_asset, self.quote_asset) {
            return Err(Error::Config(format!(
                "symbol '{}' is not {} + {}",
                self.symbol, self.base_asset, self.quote_asset
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn decline_delay(&self) -> Duration {
        Duration::from_millis(self.decline_delay_ms)
    }

    pub fn buy_fill_timeout(&self) -> Option<Duration> {
        self.buy_fill_timeout_secs.map(Duration::from_secs)
    }
}

impl RetryConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }
}
