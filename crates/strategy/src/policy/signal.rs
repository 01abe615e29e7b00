//! Entry signal qualification and pricing
//!
//! The signal bar is the bar whose period ends `trigger_offset_minutes`
//! after the session open. Checks run in a fixed order and the first
//! failure decides the reject reason:
//!
//! 1. zero range                              -> NoRange
//! 2. body / range below `min_body_ratio`     -> BodyRatio
//! 3. bar colour disagrees with the side      -> SideMismatch
//! 4. no entry-limit row for the close        -> NoEntryLimit
//! 5. range / close not below percentOfPrice  -> RangeTooWide
//! 6. |entry - stop| below 2 x limitAmount    -> StopTooClose
//! 7. sized quantity is zero                  -> ZeroQuantity

use chrono::{Duration, NaiveDate};
use meridian_calendar::TradingSessionCalendar;
use meridian_core::{
    CandleItem, Direction, Entrylimit, EntrylimitTable, NumericError, Percent, Price,
    RejectReason, Shares, Timestamp, Tradestrategy,
};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::rounding::{TICK, nudge, round_down_to_increment, snap_to_half_dollar};
use crate::error::{Result, StrategyRuleError, codes};

/// Where the initial protective stop is anchored on the signal bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StopAnchor {
    /// The bar's open
    #[default]
    Open,
    /// The bar's opposite extreme, one tick beyond it
    Extreme,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntrySignalPolicy {
    /// Minutes after the open at which the signal bar ends
    pub trigger_offset_minutes: u32,
    /// Minimum body / range of the signal bar
    pub min_body_ratio: Percent,
    pub stop_anchor: StopAnchor,
    pub tick: Price,
}

impl Default for EntrySignalPolicy {
    fn default() -> Self {
        Self {
            trigger_offset_minutes: 5,
            min_body_ratio: Percent::new(dec!(0.5)),
            stop_anchor: StopAnchor::Open,
            tick: TICK,
        }
    }
}

/// A qualified signal, priced and sized
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySignal {
    pub direction: Direction,
    /// Stop (aux) price of the stop-limit entry
    pub entry_price: Price,
    pub limit_price: Price,
    pub stop_price: Price,
    pub quantity: Shares,
    /// Live price beyond which the breakout is void
    pub invalidation_price: Price,
    pub signal_bar: CandleItem,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalDecision {
    Accept(EntrySignal),
    Reject(RejectReason),
}

impl EntrySignalPolicy {
    /// End of the signal bar's period on `day`
    pub fn signal_bar_end(
        &self,
        calendar: &TradingSessionCalendar,
        day: NaiveDate,
    ) -> meridian_calendar::Result<Timestamp> {
        Ok(calendar.session_open(day)? + Duration::minutes(i64::from(self.trigger_offset_minutes)))
    }

    /// Qualify the signal bar and, when it passes, price and size the entry
    pub fn evaluate(
        &self,
        bar: &CandleItem,
        tradestrategy: &Tradestrategy,
        entry_limits: &EntrylimitTable,
    ) -> Result<SignalDecision> {
        let range = bar.range();
        if range <= Decimal::ZERO {
            return Ok(SignalDecision::Reject(RejectReason::NoRange));
        }

        let body_ratio = bar.body_ratio().unwrap_or(Decimal::ZERO);
        if body_ratio < self.min_body_ratio.value()? {
            return Ok(SignalDecision::Reject(RejectReason::BodyRatio));
        }

        let Some(bar_direction) = bar.direction() else {
            return Ok(SignalDecision::Reject(RejectReason::SideMismatch));
        };
        let direction = tradestrategy.direction.unwrap_or(bar_direction);
        if direction != bar_direction {
            return Ok(SignalDecision::Reject(RejectReason::SideMismatch));
        }

        let Some(row) = entry_limits.for_price(bar.close) else {
            return Ok(SignalDecision::Reject(RejectReason::NoEntryLimit));
        };

        let range_fraction = range
            .checked_div(bar.close)
            .ok_or(NumericError::DivisionByZero)?;
        if range_fraction >= row.percent_of_price.value()? {
            return Ok(SignalDecision::Reject(RejectReason::RangeTooWide));
        }

        let price_round = if row.price_round.is_empty() {
            Decimal::ZERO
        } else {
            row.price_round.value()?
        };
        let entry_price = self.entry_price(bar, direction, price_round);
        let stop_price = self.stop_price(bar, direction, price_round);
        let distance = (entry_price - stop_price).abs();

        let limit_amount = row.limit_amount.value()?;
        if distance < limit_amount * Decimal::TWO || distance.is_zero() {
            return Ok(SignalDecision::Reject(RejectReason::StopTooClose));
        }

        let quantity = self.quantity(tradestrategy, row, entry_price, distance)?;
        if quantity == 0 {
            return Ok(SignalDecision::Reject(RejectReason::ZeroQuantity));
        }

        Ok(SignalDecision::Accept(EntrySignal {
            direction,
            entry_price,
            limit_price: entry_price + direction.sign() * limit_amount,
            stop_price,
            quantity,
            invalidation_price: bar.favorable_extreme(direction),
            signal_bar: bar.clone(),
        }))
    }

    /// High + tick for long, low - tick for short, then snapped further out
    pub fn entry_price(&self, bar: &CandleItem, direction: Direction, price_round: Price) -> Price {
        let up = direction == Direction::Long;
        let extreme = match direction {
            Direction::Long => bar.high,
            Direction::Short => bar.low,
        };
        snap_to_half_dollar(nudge(extreme, up, self.tick), up, price_round)
    }

    /// Stop anchor, snapped away from the entry
    pub fn stop_price(&self, bar: &CandleItem, direction: Direction, price_round: Price) -> Price {
        let up = direction == Direction::Short;
        let anchor = match self.stop_anchor {
            StopAnchor::Open => bar.open,
            StopAnchor::Extreme => nudge(bar.favorable_extreme(direction), up, self.tick),
        };
        snap_to_half_dollar(anchor, up, price_round)
    }

    /// `floor(risk / distance)` rounded down to the share increment, capped
    /// by buying power x percentOfMargin when both are known
    pub fn quantity(
        &self,
        tradestrategy: &Tradestrategy,
        row: &Entrylimit,
        entry_price: Price,
        distance: Price,
    ) -> Result<Shares> {
        let risk = tradestrategy.risk_amount.value()?;
        if risk <= Decimal::ZERO || distance <= Decimal::ZERO {
            return Ok(0);
        }
        let increment = if row.share_round.is_empty() {
            Decimal::ONE
        } else {
            row.share_round.value()?
        };

        let mut shares = round_down_to_increment((risk / distance).floor(), increment);

        if let Some(buying_power) = &tradestrategy.buying_power
            && row.percent_of_margin.is_defined()
        {
            let margin = row.percent_of_margin.value()?;
            if margin > Decimal::ZERO && entry_price > Decimal::ZERO {
                let affordable = (buying_power.value()? * margin / entry_price).floor();
                shares = shares.min(round_down_to_increment(affordable, increment));
            }
        }

        shares.max(Decimal::ZERO).to_u32().ok_or_else(|| {
            StrategyRuleError::new(codes::SIZING, 1, format!("quantity {shares} out of range"))
                .into()
        })
    }
}
