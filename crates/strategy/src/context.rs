use meridian_calendar::TradingSessionCalendar;
use meridian_core::EntrylimitTable;
use std::sync::Arc;

/// Read-only configuration shared by every rule instance
///
/// Reloading builds a new context; a context is never mutated in place.
#[derive(Debug, Clone)]
pub struct RuleContext {
    pub calendar: Arc<TradingSessionCalendar>,
    pub entry_limits: Arc<EntrylimitTable>,
}

impl RuleContext {
    pub fn new(calendar: Arc<TradingSessionCalendar>, entry_limits: Arc<EntrylimitTable>) -> Self {
        Self {
            calendar,
            entry_limits,
        }
    }
}
