//! Meridian Trading Session Calendar
//!
//! An explicitly constructed, immutable calendar injected into every rule
//! instance. It answers three kinds of question:
//!
//! ```text
//!   is it a trading day?     weekday set + per-year holiday ordinals
//!   is the market open?      [open, close) in the exchange timezone
//!   which day is n away?     bounded day-by-day scan, skipping closures
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use meridian_calendar::TradingSessionCalendar;
//!
//! let calendar = TradingSessionCalendar::from_json(r#"{ "holidays": { "2024": [186] } }"#)?;
//! let next = calendar.next_trading_day(today)?;
//! let open = calendar.session_open(next)?;
//! ```

mod calendar;
pub mod config;
pub mod error;

pub use calendar::TradingSessionCalendar;
pub use config::{CalendarConfig, DEFAULT_MAX_SCAN_DAYS};
pub use error::{CalendarError, Result};
