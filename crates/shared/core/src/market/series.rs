use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::{CandleItem, CandlePeriod};
use crate::entities::InstrumentId;
use crate::error::MarketDataError;
use crate::values::{Price, Timestamp};

/// Ordered candles of one bar size for one instrument
///
/// Items are strictly increasing by period start. Every item but the last is
/// closed; the last one is the live, still-forming bar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleSeries {
    pub instrument_id: InstrumentId,
    pub bar_size_minutes: u32,
    items: Vec<CandleItem>,
}

impl CandleSeries {
    pub fn new(instrument_id: impl Into<InstrumentId>, bar_size_minutes: u32) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            bar_size_minutes,
            items: Vec::new(),
        }
    }

    /// Build a series from items already known to be ordered and closed except the last
    pub(crate) fn from_parts(
        instrument_id: InstrumentId,
        bar_size_minutes: u32,
        items: Vec<CandleItem>,
    ) -> Self {
        Self {
            instrument_id,
            bar_size_minutes,
            items,
        }
    }

    pub fn bar_size(&self) -> Duration {
        Duration::minutes(i64::from(self.bar_size_minutes))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[CandleItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&CandleItem> {
        self.items.get(index)
    }

    /// The live bar
    pub fn last(&self) -> Option<&CandleItem> {
        self.items.last()
    }

    /// The most recently completed bar (the one before the live bar)
    pub fn last_completed(&self) -> Option<&CandleItem> {
        self.items.len().checked_sub(2).and_then(|i| self.items.get(i))
    }

    /// Completed bars, oldest first
    pub fn completed(&self) -> &[CandleItem] {
        let n = self.items.len().saturating_sub(1);
        &self.items[..n]
    }

    /// Add or update a bar. Returns true when `item` opened a new period,
    /// which closes the previous live bar.
    pub fn push(&mut self, item: CandleItem) -> Result<bool, MarketDataError> {
        let expected = self.bar_size().num_seconds();
        let got = item.period.length().num_seconds();
        if got != expected {
            return Err(MarketDataError::PeriodMismatch { got, expected });
        }

        match self.items.last_mut() {
            Some(last) if last.period.start == item.period.start => {
                last.update_from(&item)?;
                Ok(false)
            }
            Some(last) if item.period.start < last.period.start => {
                Err(MarketDataError::OutOfOrder {
                    got: item.period.start.to_rfc3339(),
                    last: last.period.start.to_rfc3339(),
                })
            }
            Some(last) => {
                last.close_bar();
                self.items.push(item);
                Ok(true)
            }
            None => {
                self.items.push(item);
                Ok(true)
            }
        }
    }

    /// Fold a trade print into the series. Returns true when it opened a new bar.
    pub fn add_tick(
        &mut self,
        time: Timestamp,
        price: Price,
        size: u64,
    ) -> Result<bool, MarketDataError> {
        let period = CandlePeriod::containing(time, self.bar_size());
        if let Some(last) = self.items.last_mut()
            && last.period == period
        {
            last.merge_tick(price, size)?;
            return Ok(false);
        }
        self.push(CandleItem::from_tick(period, price, size))
    }
}
