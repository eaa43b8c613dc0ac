//! Limit price math for the maker cycle.
//!
//! Prices are rounded half-up (midpoint away from zero) to the symbol's
//! price precision and always carry exactly that many decimals, so
//! `100.005` becomes `100.01` and `99.8` is rendered as `99.80`.

use rust_decimal::{Decimal, RoundingStrategy};

/// Round a price to `decimals` places, half-up, with a fixed scale.
pub fn round_price(value: Decimal, decimals: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(decimals, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(decimals);
    rounded
}

/// Limit price for the buy leg: `round(current * (1 - offset))`.
pub fn buy_price(current: Decimal, offset: Decimal, decimals: u32) -> Decimal {
    round_price(current * (Decimal::ONE - offset), decimals)
}

/// Limit price for the sell leg: `round(buy * (1 + offset))`.
///
/// Derived from the buy order's posted price, not its realised fill price.
pub fn sell_price(buy: Decimal, offset: Decimal, decimals: u32) -> Decimal {
    round_price(buy * (Decimal::ONE + offset), decimals)
}

/// Quote-asset amount needed to buy `quantity` at `price`.
pub fn required_quote(quantity: Decimal, price: Decimal) -> Decimal {
    quantity * price
}
