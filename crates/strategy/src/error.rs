//! Error types for the strategy crate

use meridian_calendar::CalendarError;
use meridian_core::{ConfigurationError, MarketDataError, NumericError, OrderStateError};
use thiserror::Error;

use crate::policy::BracketError;

/// Rule codes carried by [`StrategyRuleError`]
pub mod codes {
    /// Signal bar turned down; sub-code is the reject reason's
    pub const SIGNAL: u32 = 100;
    /// Position sizing
    pub const SIZING: u32 = 200;
    /// Bracket construction
    pub const BRACKET: u32 = 300;
    /// Liquidation could not be placed or was refused
    pub const LIQUIDATION: u32 = 400;
    /// Codes reported for the wrapped error kinds
    pub const CONFIGURATION: u32 = 900;
    pub const NUMERIC: u32 = 901;
    pub const ORDER_STATE: u32 = 902;
    pub const CALENDAR: u32 = 903;
    pub const MARKET_DATA: u32 = 904;
}

/// A deliberate business-rule failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Rule error {code}.{sub_code}: {message}")]
pub struct StrategyRuleError {
    pub code: u32,
    pub sub_code: u32,
    pub message: String,
}

impl StrategyRuleError {
    pub fn new(code: u32, sub_code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            sub_code,
            message: message.into(),
        }
    }
}

/// Anything a rule step can fail with
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error(transparent)]
    Rule(#[from] StrategyRuleError),

    #[error("Configuration: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Numeric: {0}")]
    Numeric(#[from] NumericError),

    #[error("Order state: {0}")]
    OrderState(#[from] OrderStateError),

    #[error("Calendar: {0}")]
    Calendar(#[from] CalendarError),

    #[error("Bracket: {0}")]
    Bracket(#[from] BracketError),

    #[error("Market data: {0}")]
    MarketData(#[from] MarketDataError),
}

impl RuleError {
    /// `(code, sub_code)` for logging and fault reports
    pub fn codes(&self) -> (u32, u32) {
        match self {
            RuleError::Rule(e) => (e.code, e.sub_code),
            RuleError::Configuration(_) => (codes::CONFIGURATION, 0),
            RuleError::Numeric(_) => (codes::NUMERIC, 0),
            RuleError::OrderState(_) => (codes::ORDER_STATE, 0),
            RuleError::Calendar(_) => (codes::CALENDAR, 0),
            RuleError::Bracket(e) => (codes::BRACKET, e.sub_code()),
            RuleError::MarketData(_) => (codes::MARKET_DATA, 0),
        }
    }
}

pub type Result<T> = std::result::Result<T, RuleError>;
