//! Heikin-Ashi smoothing
//!
//! HA close = (O + H + L + C) / 4
//! HA open  = (prev HA open + prev HA close) / 2, first bar (O + C) / 2
//! HA high  = max(H, HA open, HA close)
//! HA low   = min(L, HA open, HA close)

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{CandleItem, CandleSeries};

impl CandleSeries {
    /// The smoothed series used by Heikin-Ashi trailing. Volume, VWAP and
    /// the closed flags carry over from the raw bars.
    pub fn heikin_ashi(&self) -> CandleSeries {
        let mut out: Vec<CandleItem> = Vec::with_capacity(self.len());
        for raw in self.items() {
            let ha_close = (raw.open + raw.high + raw.low + raw.close) / dec!(4);
            let ha_open = match out.last() {
                Some(prev) => (prev.open + prev.close) / Decimal::TWO,
                None => (raw.open + raw.close) / Decimal::TWO,
            };
            let mut item = raw.clone();
            item.open = ha_open;
            item.close = ha_close;
            item.high = raw.high.max(ha_open).max(ha_close);
            item.low = raw.low.min(ha_open).min(ha_close);
            out.push(item);
        }
        CandleSeries::from_parts(self.instrument_id.clone(), self.bar_size_minutes, out)
    }
}

#[cfg(test)]
mod tests {
    use crate::market::{CandleItem, CandlePeriod, CandleSeries};
    use chrono::{Duration, TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_heikin_ashi_values() {
        let mut s = CandleSeries::new("AAPL", 5);
        let t0 = Utc.with_ymd_and_hms(2024, 3, 4, 14, 30, 0).unwrap();
        let p0 = CandlePeriod::new(t0, Duration::minutes(5));
        let p1 = CandlePeriod::new(t0 + Duration::minutes(5), Duration::minutes(5));
        s.push(CandleItem::new(p0, dec!(10), dec!(12), dec!(9), dec!(11), 100, dec!(10.5), 1))
            .unwrap();
        s.push(CandleItem::new(p1, dec!(11), dec!(13), dec!(10), dec!(12), 100, dec!(11.5), 1))
            .unwrap();

        let ha = s.heikin_ashi();
        assert_eq!(ha.len(), 2);
        let first = ha.get(0).unwrap();
        assert_eq!(first.open, dec!(10.5));
        assert_eq!(first.close, dec!(10.5));
        assert!(first.closed);

        let second = ha.get(1).unwrap();
        assert_eq!(second.open, dec!(10.5));
        assert_eq!(second.close, dec!(11.5));
        assert_eq!(second.high, dec!(13));
        assert_eq!(second.low, dec!(10));
        assert!(second.is_bullish());
    }
}
