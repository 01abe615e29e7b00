use serde::{Deserialize, Serialize};
use std::fmt;

/// Life-cycle state of one rule instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RuleState {
    #[default]
    WaitingForSignal,
    /// Entry at the broker, nothing filled
    OrderSubmitted,
    /// Shares held without a protective bracket
    PositionOpenUncovered,
    PositionCovered,
    /// Cancelling residual orders
    Terminating,
    Done,
}

impl RuleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleState::WaitingForSignal => "WAITING_FOR_SIGNAL",
            RuleState::OrderSubmitted => "ORDER_SUBMITTED",
            RuleState::PositionOpenUncovered => "POSITION_OPEN_UNCOVERED",
            RuleState::PositionCovered => "POSITION_COVERED",
            RuleState::Terminating => "TERMINATING",
            RuleState::Done => "DONE",
        }
    }
}

impl fmt::Display for RuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
