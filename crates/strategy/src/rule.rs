use meridian_core::{CandleSeries, Timestamp, Trade, Tradestrategy, TradestrategyStatus};
use meridian_gateway::BrokerEvent;

use crate::action::Action;
use crate::context::RuleContext;
use crate::error::Result;
use crate::state::RuleState;

/// One rule instance drives one tradestrategy through its day
///
/// Instances are single-threaded: the host delivers every bar update and
/// broker notification for the instrument in arrival order and dispatches
/// the returned actions before the next call.
pub trait StrategyRule: Send {
    /// Label used in logs and fault reports
    fn name(&self) -> &str;

    fn tradestrategy(&self) -> &Tradestrategy;

    fn state(&self) -> RuleState;

    fn status(&self) -> TradestrategyStatus {
        self.tradestrategy().status
    }

    /// The position container, once an entry was placed
    fn trade(&self) -> Option<&Trade>;

    /// A bar update of `series`; `is_new_bar` is set when the update opened
    /// a new period and so completed the previous bar
    fn on_bar(
        &mut self,
        ctx: &RuleContext,
        series: &CandleSeries,
        is_new_bar: bool,
    ) -> Result<Vec<Action>>;

    /// A broker notification about one of this rule's orders
    fn on_order_event(&mut self, ctx: &RuleContext, event: &BrokerEvent) -> Result<Vec<Action>>;

    /// Stop trading: cancel what is working and flatten what is held
    fn request_cancel(&mut self, now: Timestamp) -> Result<Vec<Action>>;

    fn is_done(&self) -> bool {
        self.state() == RuleState::Done
    }

    fn owns_order(&self, order_id: &str) -> bool {
        self.trade().is_some_and(|t| t.order(order_id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Rules are held as trait objects by the host
    fn _assert_rule_object_safe(_: &dyn StrategyRule) {}
}
