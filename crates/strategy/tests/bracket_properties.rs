//! Property tests for the exit policies.
//!
//! 1. Bracket legs always cover exactly the filled quantity
//! 2. Stops sit on the protective side of the fill, targets beyond it
//! 3. Trailing only ever tightens a stop

use chrono::{Duration, TimeZone, Utc};
use meridian_core::{CandleItem, CandlePeriod, CandleSeries, Direction, Price};
use meridian_strategy::policy::trailing::{heikin_ashi_stop, structural_stop};
use meridian_strategy::{BracketPolicy, TargetLeg};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Long), Just(Direction::Short)]
}

/// Fills between 0.05 and 500.00
fn arb_fill() -> impl Strategy<Value = Price> {
    (5i64..50_000).prop_map(|c| Decimal::new(c, 2))
}

/// Per-share risk between 0.0001 and 5.0000
fn arb_unit_risk() -> impl Strategy<Value = Price> {
    (1i64..50_000).prop_map(|r| Decimal::new(r, 4))
}

fn arb_policy() -> impl Strategy<Value = BracketPolicy> {
    (
        1i64..40,
        prop::collection::vec((1i64..60, 0u32..5), 1..4),
    )
        .prop_filter("some weight", |(_, legs)| legs.iter().any(|(_, w)| *w > 0))
        .prop_map(|(stop, legs)| BracketPolicy {
            stop_multiple: Decimal::new(stop, 1),
            targets: legs
                .into_iter()
                .map(|(m, w)| TargetLeg::new(Decimal::new(m, 1), w))
                .collect(),
            ..Default::default()
        })
}

/// Bars as (open, close, spread below, spread above) in cents around 20.00
fn arb_bars() -> impl Strategy<Value = Vec<(i64, i64, i64, i64)>> {
    prop::collection::vec((1_900i64..2_100, 1_900i64..2_100, 0i64..20, 0i64..20), 2..12)
}

fn series_from(bars: &[(i64, i64, i64, i64)]) -> CandleSeries {
    let start = Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap();
    let mut series = CandleSeries::new("AAPL", 5);
    for (i, (open, close, below, above)) in bars.iter().enumerate() {
        let low = open.min(close) - below;
        let high = open.max(close) + above;
        let bar = CandleItem::new(
            CandlePeriod::new(start + Duration::minutes(5 * i as i64), Duration::minutes(5)),
            Decimal::new(*open, 2),
            Decimal::new(high, 2),
            Decimal::new(low, 2),
            Decimal::new(*close, 2),
            1_000,
            Decimal::new(*close, 2),
            10,
        );
        series.push(bar).unwrap();
    }
    series
}

// ── 1. Quantity ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn legs_cover_the_quantity(
        policy in arb_policy(),
        direction in arb_direction(),
        fill in arb_fill(),
        risk in arb_unit_risk(),
        quantity in 1u32..100_000,
        first_leg in 0u16..10,
    ) {
        let legs = policy.build(direction, fill, quantity, risk, first_leg).unwrap();

        prop_assert_eq!(legs.iter().map(|l| l.quantity).sum::<u32>(), quantity);
        prop_assert!(legs.iter().all(|l| l.quantity > 0));
        prop_assert!(legs.len() <= policy.targets.len());
        for (i, leg) in legs.iter().enumerate() {
            prop_assert_eq!(leg.leg, first_leg + i as u16);
        }
    }
}

// ── 2. Prices ────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn leg_prices_bracket_the_fill(
        policy in arb_policy(),
        direction in arb_direction(),
        fill in arb_fill(),
        risk in arb_unit_risk(),
        quantity in 1u32..10_000,
    ) {
        let legs = policy.build(direction, fill, quantity, risk, 0).unwrap();

        for leg in &legs {
            prop_assert!(leg.stop_price >= policy.min_price);
            prop_assert!(leg.target_price >= policy.min_price);
            prop_assert_eq!(leg.stop_price, leg.stop_price.round_dp(2));
            prop_assert_eq!(leg.target_price, leg.target_price.round_dp(2));
            match direction {
                Direction::Long => {
                    prop_assert!(leg.stop_price < fill);
                    prop_assert!(leg.target_price > fill);
                }
                Direction::Short => {
                    prop_assert!(leg.stop_price > fill);
                    prop_assert!(leg.target_price < fill);
                }
            }
        }
    }

    #[test]
    fn fills_at_the_floor_are_refused(
        direction in arb_direction(),
        risk in arb_unit_risk(),
    ) {
        let policy = BracketPolicy::default();
        prop_assert!(policy.build(direction, dec!(0.03), 100, risk, 0).is_err());
    }
}

// ── 3. Trailing ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn trail_only_tightens(
        bars in arb_bars(),
        direction in arb_direction(),
        offset in 0i64..300,
    ) {
        let series = series_from(&bars);
        let current = match direction {
            Direction::Long => Decimal::new(1_850 + offset, 2),
            Direction::Short => Decimal::new(2_150 - offset, 2),
        };

        for candidate in [
            structural_stop(&series, direction, current),
            heikin_ashi_stop(&series, direction, current),
        ]
        .into_iter()
        .flatten()
        {
            prop_assert!(direction.is_tighter_stop(candidate, current));
        }
    }

    #[test]
    fn trail_is_a_fixed_point(bars in arb_bars(), direction in arb_direction()) {
        let series = series_from(&bars);
        let start = match direction {
            Direction::Long => dec!(18.00),
            Direction::Short => dec!(22.00),
        };
        // Once applied, the same bars propose nothing further
        if let Some(stop) = structural_stop(&series, direction, start) {
            prop_assert_eq!(structural_stop(&series, direction, stop), None);
        }
    }
}
