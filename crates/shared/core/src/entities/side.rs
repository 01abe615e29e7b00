use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order action (Buy or Sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Returns the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Broker-style action code
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

/// Trade direction - long (BOT) or short (SLD)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Bought first, profits when price rises
    Long,
    /// Sold first, profits when price falls
    Short,
}

impl Direction {
    /// Returns the opposite direction
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// +1 for long, -1 for short
    pub fn sign(&self) -> Decimal {
        match self {
            Direction::Long => Decimal::ONE,
            Direction::Short => Decimal::NEGATIVE_ONE,
        }
    }

    /// Action that opens a position in this direction
    pub fn entry_action(&self) -> Side {
        match self {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
        }
    }

    /// Action that closes a position in this direction
    pub fn exit_action(&self) -> Side {
        self.entry_action().opposite()
    }

    /// True if `candidate` is strictly better for the trader than `reference`
    /// when used as a protective stop (higher for long, lower for short)
    pub fn is_tighter_stop(&self, candidate: Decimal, reference: Decimal) -> bool {
        match self {
            Direction::Long => candidate > reference,
            Direction::Short => candidate < reference,
        }
    }

    /// Broker-style side code used in reports
    pub fn code(&self) -> &'static str {
        match self {
            Direction::Long => "BOT",
            Direction::Short => "SLD",
        }
    }
}
