use meridian_core::{OrderId, Price, TradeOrder, TradestrategyStatus};
use meridian_gateway::OrderCommand;

/// Actions a rule can request
///
/// Rules never call the broker or the store directly; the host dispatches
/// these in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Forward to the broker gateway
    Broker(OrderCommand),
    /// Record a tradestrategy status transition
    UpdateStatus(TradestrategyStatus),
}

impl Action {
    pub fn submit_entry(order: TradeOrder) -> Self {
        Action::Broker(OrderCommand::SubmitEntry(order))
    }

    pub fn submit_bracket(stop: TradeOrder, target: TradeOrder, oca_group: impl Into<String>) -> Self {
        Action::Broker(OrderCommand::SubmitBracket {
            stop,
            target,
            oca_group: oca_group.into(),
        })
    }

    pub fn submit_order(order: TradeOrder) -> Self {
        Action::Broker(OrderCommand::SubmitOrder(order))
    }

    pub fn cancel(order_id: impl Into<OrderId>) -> Self {
        Action::Broker(OrderCommand::Cancel {
            order_id: order_id.into(),
        })
    }

    pub fn amend_stop(order_id: impl Into<OrderId>, price: Price) -> Self {
        Action::Broker(OrderCommand::AmendStopPrice {
            order_id: order_id.into(),
            price,
        })
    }

    pub fn command(&self) -> Option<&OrderCommand> {
        match self {
            Action::Broker(command) => Some(command),
            Action::UpdateStatus(_) => None,
        }
    }
}
