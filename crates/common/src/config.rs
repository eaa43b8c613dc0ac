use rust_decimal::Decimal;

use crate::{Error, Result, TradingMode};

pub const DEFAULT_REST_URL: &str = "https://api.binance.com";
pub const DEFAULT_WS_URL: &str = "wss://stream.binance.com:9443/ws";

/// Process configuration loaded from environment variables at startup.
/// Strategy parameters live in the TOML file named by `strategy_config_path`.
#[derive(Clone)]
pub struct Config {
    // Exchange credentials (empty in paper mode)
    pub binance_api_key: String,
    pub binance_secret: String,
    pub binance_rest_url: String,
    pub binance_ws_url: String,

    // Trading
    pub trading_mode: TradingMode,
    pub paper_quote_balance: Decimal,

    // Strategy config file path
    pub strategy_config_path: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("binance_api_key", &"<redacted>")
            .field("binance_secret", &"<redacted>")
            .field("binance_rest_url", &self.binance_rest_url)
            .field("binance_ws_url", &self.binance_ws_url)
            .field("trading_mode", &self.trading_mode)
            .field("paper_quote_balance", &self.paper_quote_balance)
            .field("strategy_config_path", &self.strategy_config_path)
            .finish()
    }
}

impl Config {
    /// Load configuration from the process environment.
    /// Loads `.env` if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // ignore error if .env not present
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| {
            lookup(key).filter(|v| !v.trim().is_empty()).ok_or_else(|| {
                Error::Config(format!(
                    "Required environment variable '{key}' is not set. Check your .env file."
                ))
            })
        };

        let trading_mode = match required("TRADING_MODE")?.to_lowercase().as_str() {
            "paper" => TradingMode::Paper,
            "live" => TradingMode::Live,
            other => {
                return Err(Error::Config(format!(
                    "TRADING_MODE must be 'paper' or 'live', got: '{other}'"
                )))
            }
        };

        let (binance_api_key, binance_secret) = match trading_mode {
            TradingMode::Live => (required("BINANCE_API_KEY")?, required("BINANCE_SECRET")?),
            TradingMode::Paper => (
                lookup("BINANCE_API_KEY").unwrap_or_default(),
                lookup("BINANCE_SECRET").unwrap_or_default(),
            ),
        };

        let paper_quote_balance = match lookup("PAPER_QUOTE_BALANCE") {
            Some(v) => v.trim().parse::<Decimal>().map_err(|e| {
                Error::Config(format!("PAPER_QUOTE_BALANCE is not a number: '{v}' ({e})"))
            })?,
            None => Decimal::from(10_000),
        };

        Ok(Config {
            binance_api_key,
            binance_secret,
            binance_rest_url: lookup("BINANCE_REST_URL")
                .unwrap_or_else(|| DEFAULT_REST_URL.to_string()),
            binance_ws_url: lookup("BINANCE_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string()),
            trading_mode,
            paper_quote_balance,
            strategy_config_path: lookup("STRATEGY_CONFIG_PATH")
                .unwrap_or_else(|| "config/maker.toml".to_string()),
        })
    }
}
