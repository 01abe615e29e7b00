//! Stop trailing
//!
//! Every function here returns `Some(stop)` only when the new stop is
//! strictly tighter than `current`; a stop never moves back.

use chrono::NaiveTime;
use meridian_core::{CandleItem, CandleSeries, Direction, Price};
use serde::{Deserialize, Serialize};

use super::rounding::{TICK, round_to_tick_directed};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrailMode {
    /// Break-even promotion only
    #[default]
    None,
    /// Favourable raw bars
    Structural,
    /// Favourable Heikin-Ashi bars
    HeikinAshi,
    /// One-minute VWAP
    MinuteVwap,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrailingPolicy {
    pub mode: TrailMode,
    /// Local time at which the stop is promoted to break-even
    pub break_even_time: Option<NaiveTime>,
}

impl TrailingPolicy {
    pub fn new(mode: TrailMode, break_even_time: Option<NaiveTime>) -> Self {
        Self {
            mode,
            break_even_time,
        }
    }

    /// Whether `series` drives this policy's bar trail
    pub fn trails_on(&self, series: &CandleSeries, primary_bar_size: u32) -> bool {
        match self.mode {
            TrailMode::None => false,
            TrailMode::Structural | TrailMode::HeikinAshi => {
                series.bar_size_minutes == primary_bar_size
            }
            TrailMode::MinuteVwap => series.bar_size_minutes == 1,
        }
    }

    /// Candidate from the configured bar trail after a new bar
    pub fn bar_trail(
        &self,
        series: &CandleSeries,
        direction: Direction,
        current: Price,
    ) -> Option<Price> {
        match self.mode {
            TrailMode::None => None,
            TrailMode::Structural => structural_stop(series, direction, current),
            TrailMode::HeikinAshi => heikin_ashi_stop(series, direction, current),
            TrailMode::MinuteVwap => minute_vwap_stop(series, direction, current),
        }
    }
}

fn scan_completed(bars: &[CandleItem], direction: Direction, current: Price) -> Option<Price> {
    let mut stop = current;
    for bar in bars.iter().rev() {
        let extreme = bar.favorable_extreme(direction);
        if !bar.is_favorable(direction) || !direction.is_tighter_stop(extreme, stop) {
            break;
        }
        stop = extreme;
    }
    direction.is_tighter_stop(stop, current).then_some(stop)
}

/// Walk back from the last completed bar while bars are favourably coloured
/// and keep improving the stop
pub fn structural_stop(series: &CandleSeries, direction: Direction, current: Price) -> Option<Price> {
    scan_completed(series.completed(), direction, current)
}

/// [`structural_stop`] over the Heikin-Ashi transform of `series`
pub fn heikin_ashi_stop(
    series: &CandleSeries,
    direction: Direction,
    current: Price,
) -> Option<Price> {
    scan_completed(series.heikin_ashi().completed(), direction, current)
}

/// Average fill, or the prior bar's extreme when that is already better
pub fn break_even_stop(
    direction: Direction,
    average_fill: Price,
    prior_bar: Option<&CandleItem>,
    current: Price,
) -> Option<Price> {
    let candidate = match prior_bar {
        Some(bar) if direction.is_tighter_stop(bar.favorable_extreme(direction), average_fill) => {
            bar.favorable_extreme(direction)
        }
        _ => average_fill,
    };
    direction
        .is_tighter_stop(candidate, current)
        .then_some(candidate)
}

/// Advance to the just-closed minute's VWAP while the live minute's VWAP
/// keeps moving away from it. One-minute series only.
pub fn minute_vwap_stop(
    series: &CandleSeries,
    direction: Direction,
    current: Price,
) -> Option<Price> {
    if series.bar_size_minutes != 1 {
        return None;
    }
    let closed = series.last_completed()?.vwap;
    let live = series.last()?.vwap;
    if !direction.is_tighter_stop(closed, current) || !direction.is_tighter_stop(live, closed) {
        return None;
    }
    // Onto the tick grid, on the loose side
    let stop = round_to_tick_directed(closed, direction == Direction::Short, TICK);
    direction.is_tighter_stop(stop, current).then_some(stop)
}

/// A stop is only worth sending while it sits on the protective side of the market
pub fn is_protective(direction: Direction, stop: Price, live: Price) -> bool {
    direction.is_tighter_stop(live, stop)
}

/// The tightest of `candidates`, if any
pub fn tightest(direction: Direction, candidates: impl IntoIterator<Item = Price>) -> Option<Price> {
    candidates.into_iter().reduce(|best, next| {
        if direction.is_tighter_stop(next, best) {
            next
        } else {
            best
        }
    })
}
