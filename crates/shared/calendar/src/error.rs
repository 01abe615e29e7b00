use chrono::{NaiveDate, NaiveTime};
use meridian_core::ConfigurationError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("No trading day within {scanned} days of {from}")]
    NoTradingDay { from: NaiveDate, scanned: u32 },

    #[error("Date out of range stepping from {0}")]
    DateOutOfRange(NaiveDate),

    #[error("{time} does not exist on {date} in the exchange timezone")]
    NonexistentLocalTime { date: NaiveDate, time: NaiveTime },

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, CalendarError>;
