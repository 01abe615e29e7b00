use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::entities::Direction;
use crate::error::MarketDataError;
use crate::values::{Price, Timestamp};

/// Half-open time interval `[start, end)` a candle aggregates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CandlePeriod {
    pub start: Timestamp,
    pub end: Timestamp,
}

impl CandlePeriod {
    pub fn new(start: Timestamp, length: Duration) -> Self {
        Self {
            start,
            end: start + length,
        }
    }

    /// The period of `length` containing `time`, aligned to the epoch
    pub fn containing(time: Timestamp, length: Duration) -> Self {
        let secs = length.num_seconds().max(1);
        let ts = time.timestamp();
        let start_secs = ts - ts.rem_euclid(secs);
        let start = DateTime::<Utc>::from_timestamp(start_secs, 0).unwrap_or(time);
        Self::new(start, length)
    }

    pub fn length(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, time: Timestamp) -> bool {
        time >= self.start && time < self.end
    }
}

/// Open/high/low/close/volume/VWAP for one period
///
/// The most recent candle of a series is live and may still change; once
/// `closed` is set the candle is immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleItem {
    pub period: CandlePeriod,
    pub open: Price,
    pub high: Price,
    pub low: Price,
    pub close: Price,
    pub volume: u64,
    pub vwap: Price,
    pub trade_count: u32,
    #[serde(default)]
    pub closed: bool,
}

impl CandleItem {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        period: CandlePeriod,
        open: Price,
        high: Price,
        low: Price,
        close: Price,
        volume: u64,
        vwap: Price,
        trade_count: u32,
    ) -> Self {
        Self {
            period,
            open,
            high,
            low,
            close,
            volume,
            vwap,
            trade_count,
            closed: false,
        }
    }

    /// A fresh candle opened by a single trade print
    pub fn from_tick(period: CandlePeriod, price: Price, size: u64) -> Self {
        Self::new(period, price, price, price, price, size, price, 1)
    }

    pub fn start(&self) -> Timestamp {
        self.period.start
    }

    pub fn end(&self) -> Timestamp {
        self.period.end
    }

    fn ensure_live(&self) -> Result<(), MarketDataError> {
        if self.closed {
            return Err(MarketDataError::CandleClosed(self.period.start.to_rfc3339()));
        }
        Ok(())
    }

    /// Fold a trade print into the live candle, keeping VWAP volume-weighted
    pub fn merge_tick(&mut self, price: Price, size: u64) -> Result<(), MarketDataError> {
        self.ensure_live()?;
        let prior_volume = Decimal::from(self.volume);
        let added = Decimal::from(size);
        let total = prior_volume + added;
        if !total.is_zero() {
            self.vwap = (self.vwap * prior_volume + price * added) / total;
        }
        self.high = self.high.max(price);
        self.low = self.low.min(price);
        self.close = price;
        self.volume += size;
        self.trade_count += 1;
        Ok(())
    }

    /// Replace the live values with a newer snapshot of the same period
    pub fn update_from(&mut self, newer: &CandleItem) -> Result<(), MarketDataError> {
        self.ensure_live()?;
        self.high = newer.high;
        self.low = newer.low;
        self.close = newer.close;
        self.volume = newer.volume;
        self.vwap = newer.vwap;
        self.trade_count = newer.trade_count;
        Ok(())
    }

    pub fn close_bar(&mut self) {
        self.closed = true;
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    /// Bullish for long, bearish for short
    pub fn is_favorable(&self, direction: Direction) -> bool {
        match direction {
            Direction::Long => self.is_bullish(),
            Direction::Short => self.is_bearish(),
        }
    }

    /// The direction the candle closed in, if any
    pub fn direction(&self) -> Option<Direction> {
        if self.is_bullish() {
            Some(Direction::Long)
        } else if self.is_bearish() {
            Some(Direction::Short)
        } else {
            None
        }
    }

    /// Low for long, high for short
    pub fn favorable_extreme(&self, direction: Direction) -> Price {
        match direction {
            Direction::Long => self.low,
            Direction::Short => self.high,
        }
    }

    pub fn range(&self) -> Price {
        self.high - self.low
    }

    pub fn body(&self) -> Price {
        (self.close - self.open).abs()
    }

    /// Body as a fraction of range; `None` for a zero-range bar
    pub fn body_ratio(&self) -> Option<Decimal> {
        let range = self.range();
        if range.is_zero() {
            None
        } else {
            Some(self.body() / range)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn period() -> CandlePeriod {
        CandlePeriod::new(
            Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap(),
            Duration::minutes(5),
        )
    }

    #[test]
    fn test_period_is_half_open() {
        let p = period();
        assert!(p.contains(p.start));
        assert!(!p.contains(p.end));
        assert_eq!(p.length(), Duration::minutes(5));
    }

    #[test]
    fn test_period_alignment() {
        let t = Utc.with_ymd_and_hms(2024, 3, 4, 14, 33, 17).unwrap();
        let p = CandlePeriod::containing(t, Duration::minutes(5));
        assert_eq!(p.start, Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap());
    }

    #[test]
    fn test_merge_tick_vwap() {
        let mut c = CandleItem::from_tick(period(), dec!(10), 100);
        c.merge_tick(dec!(11), 300).unwrap();
        assert_eq!(c.vwap, dec!(10.75));
        assert_eq!(c.high, dec!(11));
        assert_eq!(c.volume, 400);
        assert_eq!(c.trade_count, 2);
    }

    #[test]
    fn test_closed_candle_is_immutable() {
        let mut c = CandleItem::from_tick(period(), dec!(10), 100);
        c.close_bar();
        assert!(matches!(
            c.merge_tick(dec!(11), 1),
            Err(MarketDataError::CandleClosed(_))
        ));
    }

    #[test]
    fn test_body_ratio_and_color() {
        let c = CandleItem::new(
            period(),
            dec!(21.20),
            dec!(21.50),
            dec!(21.15),
            dec!(21.40),
            1000,
            dec!(21.35),
            10,
        );
        assert!(c.is_bullish());
        assert_eq!(c.direction(), Some(Direction::Long));
        assert_eq!(c.range(), dec!(0.35));
        assert_eq!(c.favorable_extreme(Direction::Short), dec!(21.50));
        assert!(c.body_ratio().unwrap() > dec!(0.57));
    }
}
