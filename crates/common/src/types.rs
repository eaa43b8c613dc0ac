use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order lifecycle status as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    PendingCancel,
    Rejected,
    Expired,
    ExpiredInMatch,
    #[serde(other)]
    Unknown,
}

impl OrderStatus {
    pub fn is_filled(&self) -> bool {
        matches!(self, OrderStatus::Filled)
    }

    /// The order will never trade again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
                | OrderStatus::ExpiredInMatch
        )
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::PendingCancel => "PENDING_CANCEL",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::ExpiredInMatch => "EXPIRED_IN_MATCH",
            OrderStatus::Unknown => "UNKNOWN",
        };
        write!(f, "{s}")
    }
}

/// Limit order parameters sent to the exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
    /// Our own identifier, echoed back by the exchange.
    pub client_order_id: String,
}

impl LimitOrderRequest {
    pub fn new(symbol: impl Into<String>, side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
            price,
            client_order_id: uuid::Uuid::new_v4().simple().to_string(),
        }
    }
}

/// Snapshot of an exchange order. The exchange owns the real thing; this is
/// what we saw at submission or on the last poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: u64,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    /// Limit price as posted.
    pub price: Decimal,
    pub status: OrderStatus,
}

/// Why the placer chose not to submit an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DeclineReason {
    InsufficientBalance {
        asset: String,
        available: Decimal,
        required: Decimal,
    },
}

impl std::fmt::Display for DeclineReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeclineReason::InsufficientBalance {
                asset,
                available,
                required,
            } => write!(
                f,
                "insufficient {asset} balance: available {available}, required {required}"
            ),
        }
    }
}

/// Result of an order placement attempt that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Placement {
    Placed(Order),
    Declined(DeclineReason),
}

/// Where the buy→sell cycle currently stands.
///
/// Anything other than `Idle` means a cycle is in flight; a new buy is only
/// submitted from `Idle`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    BuyPlaced {
        buy: Order,
    },
    AwaitingBuyFill {
        buy: Order,
    },
    SellPlaced {
        buy: Order,
        sell: Order,
    },
    AwaitingSellFill {
        buy: Order,
        sell: Order,
    },
}

impl CycleState {
    pub fn in_flight(&self) -> bool {
        !matches!(self, CycleState::Idle)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CycleState::Idle => "idle",
            CycleState::BuyPlaced { .. } => "buy_placed",
            CycleState::AwaitingBuyFill { .. } => "awaiting_buy_fill",
            CycleState::SellPlaced { .. } => "sell_placed",
            CycleState::AwaitingSellFill { .. } => "awaiting_sell_fill",
        }
    }
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Last traded price for a symbol, as published by the trade stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub price: Decimal,
    pub trade_time_ms: i64,
}

/// Whether the bot is running against the real exchange or simulating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradingMode {
    Live,
    Paper,
}

impl std::fmt::Display for TradingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradingMode::Live => write!(f, "live"),
            TradingMode::Paper => write!(f, "paper"),
        }
    }
}
