//! Price rounding helpers
//!
//! "Worse" always means worse for the trader: a higher buy price, a lower
//! sell price, a wider stop.

use meridian_core::Price;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

/// Default price increment
pub const TICK: Price = dec!(0.01);

/// Move `price` one `tick` up or down
pub fn nudge(price: Price, up: bool, tick: Price) -> Price {
    if up { price + tick } else { price - tick }
}

/// Snap to the nearest whole or half dollar in the given direction when it
/// lies within `within` of `price`; otherwise leave the price alone.
pub fn snap_to_half_dollar(price: Price, up: bool, within: Price) -> Price {
    if within <= Decimal::ZERO {
        return price;
    }
    let doubled = price * Decimal::TWO;
    let candidate = if up { doubled.ceil() } else { doubled.floor() } / Decimal::TWO;
    if (candidate - price).abs() <= within {
        candidate
    } else {
        price
    }
}

/// Round half-to-even onto the tick grid
pub fn round_to_tick(price: Price, tick: Price) -> Price {
    if tick <= Decimal::ZERO {
        return price;
    }
    let steps = (price / tick).round_dp_with_strategy(0, RoundingStrategy::MidpointNearestEven);
    (steps * tick).normalize()
}

/// Round onto the tick grid away from zero (`up`) or toward it
pub fn round_to_tick_directed(price: Price, up: bool, tick: Price) -> Price {
    if tick <= Decimal::ZERO {
        return price;
    }
    let steps = price / tick;
    let steps = if up { steps.ceil() } else { steps.floor() };
    (steps * tick).normalize()
}

/// Largest multiple of `increment` not above `value`; an increment of zero
/// or less means whole units
pub fn round_down_to_increment(value: Decimal, increment: Decimal) -> Decimal {
    let increment = if increment <= Decimal::ZERO {
        Decimal::ONE
    } else {
        increment
    };
    (value / increment).floor() * increment
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_within_range() {
        assert_eq!(snap_to_half_dollar(dec!(21.49), true, dec!(0.02)), dec!(21.50));
        assert_eq!(snap_to_half_dollar(dec!(21.51), true, dec!(0.02)), dec!(21.51));
        assert_eq!(snap_to_half_dollar(dec!(21.02), false, dec!(0.02)), dec!(21.00));
        assert_eq!(snap_to_half_dollar(dec!(21.03), false, dec!(0.02)), dec!(21.03));
        // Never snaps against the requested direction
        assert_eq!(snap_to_half_dollar(dec!(21.01), true, dec!(0.02)), dec!(21.01));
        assert_eq!(snap_to_half_dollar(dec!(21.49), true, Decimal::ZERO), dec!(21.49));
    }

    #[test]
    fn test_tick_rounding() {
        assert_eq!(round_to_tick(dec!(21.175), TICK), dec!(21.18));
        assert_eq!(round_to_tick(dec!(21.185), TICK), dec!(21.18));
        assert_eq!(round_to_tick_directed(dec!(21.1801), true, TICK), dec!(21.19));
        assert_eq!(round_to_tick_directed(dec!(21.1899), false, TICK), dec!(21.18));
    }

    #[test]
    fn test_round_down_to_increment() {
        assert_eq!(round_down_to_increment(dec!(322), dec!(100)), dec!(300));
        assert_eq!(round_down_to_increment(dec!(99), dec!(100)), dec!(0));
        assert_eq!(round_down_to_increment(dec!(322), Decimal::ZERO), dec!(322));
    }
}
