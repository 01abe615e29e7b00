use serde::{Deserialize, Serialize};

/// Order types the engine sends to the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    /// Execute at current market price
    Market,
    /// Execute at specified price or better
    Limit,
    /// Market order triggered when price reaches stop price
    Stop,
    /// Limit order triggered when price reaches stop price
    StopLimit,
}

impl OrderType {
    /// Whether this type carries a stop (aux) price
    pub fn has_stop(&self) -> bool {
        matches!(self, OrderType::Stop | OrderType::StopLimit)
    }

    /// Whether this type carries a limit price
    pub fn has_limit(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }
}

/// What an order does inside its trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderRole {
    /// Opens the position
    Entry,
    /// Protective stop leg of a bracket
    Stop,
    /// Profit target leg of a bracket
    Target,
    /// Flattens the position at timeout or end of day
    Liquidation,
}

impl OrderRole {
    /// True for orders that reduce the position
    pub fn is_exit(&self) -> bool {
        !matches!(self, OrderRole::Entry)
    }
}

/// Time-in-force instructions for order validity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Cancelled by the broker at the end of the trading day
    Day,
    /// Remains active until explicitly cancelled
    Gtc,
}
