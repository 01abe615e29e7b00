use chrono::{DateTime, Datelike, LocalResult, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use meridian_core::{ConfigurationError, Timestamp};
use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::config::CalendarConfig;
use crate::error::{CalendarError, Result};

/// Exchange sessions, holidays and trading-day arithmetic
///
/// Built once from a validated [`CalendarConfig`] and never mutated; share it
/// between rule instances behind an `Arc`. Dates are exchange-local calendar
/// dates; instants are UTC.
#[derive(Debug, Clone)]
pub struct TradingSessionCalendar {
    timezone: Tz,
    market_open: NaiveTime,
    market_close: NaiveTime,
    non_trading_weekdays: HashSet<Weekday>,
    holidays: BTreeMap<i32, BTreeSet<u32>>,
    max_scan_days: u32,
}

impl TradingSessionCalendar {
    pub fn new(config: &CalendarConfig) -> std::result::Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            timezone: config.parse_timezone()?,
            market_open: config.market_open,
            market_close: config.market_close,
            non_trading_weekdays: config.parse_weekdays()?,
            holidays: config.holidays.clone(),
            max_scan_days: config.max_scan_days,
        })
    }

    pub fn from_json(json: &str) -> std::result::Result<Self, ConfigurationError> {
        Self::new(&CalendarConfig::from_json(json)?)
    }

    /// US equities session (New York, 09:30-16:00, weekends closed, no holidays)
    pub fn us_equities() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            market_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            market_close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
            non_trading_weekdays: [Weekday::Sat, Weekday::Sun].into_iter().collect(),
            holidays: BTreeMap::new(),
            max_scan_days: crate::config::DEFAULT_MAX_SCAN_DAYS,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn market_open(&self) -> NaiveTime {
        self.market_open
    }

    pub fn market_close(&self) -> NaiveTime {
        self.market_close
    }

    pub fn max_scan_days(&self) -> u32 {
        self.max_scan_days
    }

    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays
            .get(&date.year())
            .is_some_and(|days| days.contains(&date.ordinal()))
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !self.non_trading_weekdays.contains(&date.weekday()) && !self.is_holiday(date)
    }

    /// Step `n` trading days from `date`; negative `n` steps backward
    pub fn add_trading_days(&self, date: NaiveDate, n: i32) -> Result<NaiveDate> {
        let forward = n >= 0;
        let mut current = date;
        for _ in 0..n.unsigned_abs() {
            current = self.step_to_trading_day(current, forward)?;
        }
        Ok(current)
    }

    /// First trading day strictly after `date`
    pub fn next_trading_day(&self, date: NaiveDate) -> Result<NaiveDate> {
        self.step_to_trading_day(date, true)
    }

    /// Last trading day strictly before `date`
    pub fn prev_trading_day(&self, date: NaiveDate) -> Result<NaiveDate> {
        self.step_to_trading_day(date, false)
    }

    fn step_to_trading_day(&self, from: NaiveDate, forward: bool) -> Result<NaiveDate> {
        let mut current = from;
        for _ in 0..self.max_scan_days {
            current = if forward {
                current.succ_opt()
            } else {
                current.pred_opt()
            }
            .ok_or(CalendarError::DateOutOfRange(from))?;
            if self.is_trading_day(current) {
                return Ok(current);
            }
        }
        log::warn!(
            "[Calendar] no trading day within {} days of {}",
            self.max_scan_days,
            from
        );
        Err(CalendarError::NoTradingDay {
            from,
            scanned: self.max_scan_days,
        })
    }

    /// Trading days in `(from, to]`, negative when `to` precedes `from`
    pub fn trading_days_between(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        let (lo, hi, sign) = if to >= from { (from, to, 1) } else { (to, from, -1) };
        let count = lo
            .iter_days()
            .skip(1)
            .take_while(|d| *d <= hi)
            .filter(|d| self.is_trading_day(*d))
            .count();
        sign * count as i64
    }

    /// Express a UTC instant in exchange-local time
    pub fn to_exchange_time(&self, time: Timestamp) -> DateTime<Tz> {
        time.with_timezone(&self.timezone)
    }

    /// Exchange-local calendar date of a UTC instant
    pub fn exchange_date(&self, time: Timestamp) -> NaiveDate {
        self.to_exchange_time(time).date_naive()
    }

    /// The UTC instant of a local wall-clock time on `date`. On a DST
    /// overlap the earlier instant is used.
    pub fn at_local_time(&self, date: NaiveDate, time: NaiveTime) -> Result<Timestamp> {
        match self.timezone.from_local_datetime(&date.and_time(time)) {
            LocalResult::Single(t) => Ok(t.with_timezone(&Utc)),
            LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
            LocalResult::None => Err(CalendarError::NonexistentLocalTime { date, time }),
        }
    }

    pub fn session_open(&self, date: NaiveDate) -> Result<Timestamp> {
        self.at_local_time(date, self.market_open)
    }

    pub fn session_close(&self, date: NaiveDate) -> Result<Timestamp> {
        self.at_local_time(date, self.market_close)
    }

    /// Inside the session `[open, close)` of a trading day
    pub fn is_market_hours(&self, time: Timestamp) -> bool {
        let local = self.to_exchange_time(time);
        let t = local.time();
        self.is_trading_day(local.date_naive()) && t >= self.market_open && t < self.market_close
    }
}

impl Default for TradingSessionCalendar {
    fn default() -> Self {
        Self::us_equities()
    }
}
