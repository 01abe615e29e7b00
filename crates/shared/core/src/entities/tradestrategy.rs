use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Direction, InstrumentId};
use crate::values::Money;

/// Why a signal bar was turned down. Each reason carries its own sub-code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RejectReason {
    /// High equals low; nothing to measure
    NoRange,
    /// Body too small relative to the bar's range
    BodyRatio,
    /// Bar direction disagrees with the configured side
    SideMismatch,
    /// No entry-limit row covers the price
    NoEntryLimit,
    /// Range as a fraction of price exceeds the row's percentOfPrice
    RangeTooWide,
    /// Entry and stop closer than twice the row's limitAmount
    StopTooClose,
    /// Risk amount buys less than one share increment
    ZeroQuantity,
    /// The first bar seen was already past the trigger time
    SignalWindowMissed,
    /// The broker refused the entry order
    BrokerRejected,
}

impl RejectReason {
    pub fn sub_code(&self) -> u32 {
        match self {
            RejectReason::NoRange => 1,
            RejectReason::BodyRatio => 2,
            RejectReason::SideMismatch => 3,
            RejectReason::NoEntryLimit => 4,
            RejectReason::RangeTooWide => 5,
            RejectReason::StopTooClose => 6,
            RejectReason::ZeroQuantity => 7,
            RejectReason::SignalWindowMissed => 8,
            RejectReason::BrokerRejected => 9,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RejectReason::NoRange => "signal bar has no range",
            RejectReason::BodyRatio => "signal bar body below minimum ratio",
            RejectReason::SideMismatch => "signal bar direction does not match side",
            RejectReason::NoEntryLimit => "no entry limit for price",
            RejectReason::RangeTooWide => "signal bar range exceeds percent of price",
            RejectReason::StopTooClose => "stop closer than twice the limit amount",
            RejectReason::ZeroQuantity => "risk amount too small for one share increment",
            RejectReason::SignalWindowMissed => "signal bar window already passed",
            RejectReason::BrokerRejected => "entry order rejected by broker",
        }
    }
}

/// Status of a scheduled instrument/day, as seen by the reporting layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TradestrategyStatus {
    #[default]
    Scheduled,
    /// Rule running, no signal yet
    Waiting,
    /// Entry order at the broker
    EntrySubmitted,
    /// Position held
    Open,
    /// Position fully exited
    Closed,
    /// Invalidated or stopped before a position was taken
    Cancelled,
    /// Entry not filled before the cutoff
    Unfilled,
    /// Signal or entry turned down
    Rejected(RejectReason),
    /// The rule raised an error
    Error,
}

impl TradestrategyStatus {
    /// Status code written to the store
    pub fn code(&self) -> &'static str {
        match self {
            TradestrategyStatus::Scheduled => "SCHEDULED",
            TradestrategyStatus::Waiting => "WAITING",
            TradestrategyStatus::EntrySubmitted => "SUBMITTED",
            TradestrategyStatus::Open => "OPEN",
            TradestrategyStatus::Closed => "CLOSED",
            TradestrategyStatus::Cancelled => "CANCELLED",
            TradestrategyStatus::Unfilled => "UNFILLED",
            TradestrategyStatus::Rejected(_) => "REJECTED",
            TradestrategyStatus::Error => "ERROR",
        }
    }

    /// Terminal statuses are never left again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradestrategyStatus::Closed
                | TradestrategyStatus::Cancelled
                | TradestrategyStatus::Unfilled
                | TradestrategyStatus::Rejected(_)
        )
    }
}

impl fmt::Display for TradestrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradestrategyStatus::Rejected(reason) => {
                write!(f, "REJECTED({}: {})", reason.sub_code(), reason.description())
            }
            other => write!(f, "{}", other.code()),
        }
    }
}

/// One instrument scheduled to trade one strategy on one day
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tradestrategy {
    pub id: String,
    pub instrument_id: InstrumentId,
    pub trading_day: NaiveDate,
    /// Name of the strategy configuration to run
    pub strategy: String,
    /// Configured side; `None` takes the signal bar's direction
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Dollars at risk between entry and stop
    pub risk_amount: Money,
    /// Bar size in minutes
    pub bar_size_minutes: u32,
    /// Account buying power used with the entry limit's percentOfMargin
    #[serde(default)]
    pub buying_power: Option<Money>,
    #[serde(default)]
    pub status: TradestrategyStatus,
}

impl Tradestrategy {
    pub fn new(
        id: impl Into<String>,
        instrument_id: impl Into<InstrumentId>,
        trading_day: NaiveDate,
        strategy: impl Into<String>,
        risk_amount: Money,
        bar_size_minutes: u32,
    ) -> Self {
        Self {
            id: id.into(),
            instrument_id: instrument_id.into(),
            trading_day,
            strategy: strategy.into(),
            direction: None,
            risk_amount,
            bar_size_minutes,
            buying_power: None,
            status: TradestrategyStatus::Scheduled,
        }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_buying_power(mut self, buying_power: Money) -> Self {
        self.buying_power = Some(buying_power);
        self
    }

    pub fn bar_size(&self) -> Duration {
        Duration::minutes(i64::from(self.bar_size_minutes))
    }
}
