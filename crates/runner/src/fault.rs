use meridian_core::Timestamp;
use meridian_strategy::RuleError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A rule step that returned an error, as reported on the engine's fault channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFault {
    pub tradestrategy_id: String,
    /// Label of the rule instance
    pub rule: String,
    pub code: u32,
    pub sub_code: u32,
    pub message: String,
    /// Time of the bar or broker event being processed
    pub timestamp: Timestamp,
}

impl RuleFault {
    pub fn new(tradestrategy_id: &str, rule: &str, error: &RuleError, timestamp: Timestamp) -> Self {
        let (code, sub_code) = error.codes();
        Self {
            tradestrategy_id: tradestrategy_id.to_string(),
            rule: rule.to_string(),
            code,
            sub_code,
            message: error.to_string(),
            timestamp,
        }
    }
}

impl fmt::Display for RuleFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}.{}] {}",
            self.rule, self.code, self.sub_code, self.message
        )
    }
}
