//! Error types shared by the core domain

use thiserror::Error;

/// Errors raised when an operation touches a value type that holds no usable number
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("Invalid numeric state for {kind}: '{input}'")]
    InvalidNumericState { kind: &'static str, input: String },

    #[error("Empty {kind} cannot take part in arithmetic")]
    Empty { kind: &'static str },

    #[error("Division by zero")]
    DivisionByZero,
}

/// An order or trade operation whose precondition no longer holds
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderStateError {
    #[error("Order {order_id} is {status} and cannot be {action}")]
    Terminal {
        order_id: String,
        status: String,
        action: &'static str,
    },

    #[error("Fill of {requested} exceeds remaining {remaining} on order {order_id}")]
    Overfill {
        order_id: String,
        requested: u32,
        remaining: u32,
    },

    #[error("Order {0} is not a stop order")]
    NotAStop(String),

    #[error("Unknown order: {0}")]
    UnknownOrder(String),

    #[error("Trade {0} already has an open-position order")]
    DuplicateEntry(String),

    #[error("Duplicate order id: {0}")]
    DuplicateOrder(String),
}

/// Bar updates that would break the series ordering or a closed bar
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketDataError {
    #[error("Candle starting {0} is closed")]
    CandleClosed(String),

    #[error("Candle starting {got} is before the last candle starting {last}")]
    OutOfOrder { got: String, last: String },

    #[error("Candle length {got}s does not match series bar size {expected}s")]
    PeriodMismatch { got: i64, expected: i64 },
}

/// Malformed calendar, entry-limit or engine configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    #[error("Failed to read config file '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid calendar config: {0}")]
    InvalidCalendar(String),

    #[error("Invalid entry limit config: {0}")]
    InvalidEntryLimit(String),

    #[error("Invalid strategy config: {0}")]
    InvalidStrategy(String),

    #[error("Invalid tradestrategy config: {0}")]
    InvalidTradestrategy(String),
}

impl From<NumericError> for ConfigurationError {
    fn from(e: NumericError) -> Self {
        ConfigurationError::Parse(e.to_string())
    }
}

pub type NumericResult<T> = std::result::Result<T, NumericError>;
