use meridian_core::{OrderId, Price, TradeOrder};
use serde::{Deserialize, Serialize};

use crate::broker::BrokerGateway;
use crate::error::GatewayResult;

/// One broker call, as a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OrderCommand {
    SubmitEntry(TradeOrder),
    SubmitBracket {
        stop: TradeOrder,
        target: TradeOrder,
        oca_group: String,
    },
    /// Any other order, e.g. a liquidation
    SubmitOrder(TradeOrder),
    Cancel { order_id: OrderId },
    AmendStopPrice { order_id: OrderId, price: Price },
}

impl OrderCommand {
    /// Replay the command against a gateway
    pub fn dispatch(self, gateway: &dyn BrokerGateway) -> GatewayResult<()> {
        match self {
            OrderCommand::SubmitEntry(order) => gateway.submit_entry(order).map(|_| ()),
            OrderCommand::SubmitBracket {
                stop,
                target,
                oca_group,
            } => gateway.submit_bracket(stop, target, &oca_group).map(|_| ()),
            OrderCommand::SubmitOrder(order) => gateway.submit_order(order).map(|_| ()),
            OrderCommand::Cancel { order_id } => gateway.cancel(&order_id),
            OrderCommand::AmendStopPrice { order_id, price } => {
                gateway.amend_stop_price(&order_id, price)
            }
        }
    }

    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            OrderCommand::SubmitEntry(_) => "submit_entry",
            OrderCommand::SubmitBracket { .. } => "submit_bracket",
            OrderCommand::SubmitOrder(_) => "submit_order",
            OrderCommand::Cancel { .. } => "cancel",
            OrderCommand::AmendStopPrice { .. } => "amend_stop_price",
        }
    }

    /// Ids of the orders this command places at the broker
    pub fn placed_ids(&self) -> Vec<&str> {
        match self {
            OrderCommand::SubmitEntry(order) | OrderCommand::SubmitOrder(order) => {
                vec![order.id.as_str()]
            }
            OrderCommand::SubmitBracket { stop, target, .. } => {
                vec![stop.id.as_str(), target.id.as_str()]
            }
            OrderCommand::Cancel { .. } | OrderCommand::AmendStopPrice { .. } => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use meridian_core::{OrderRole, Side};
    use rust_decimal_macros::dec;

    #[test]
    fn test_placed_ids() {
        let now = Utc::now();
        let stop = TradeOrder::stop("ts1-2", "AAPL", Side::Sell, OrderRole::Stop, 100, dec!(21.18), now);
        let target =
            TradeOrder::limit("ts1-3", "AAPL", Side::Sell, OrderRole::Target, 100, dec!(22.18), now);

        let bracket = OrderCommand::SubmitBracket {
            stop,
            target,
            oca_group: "ts1-oca".to_string(),
        };
        assert_eq!(bracket.placed_ids(), vec!["ts1-2", "ts1-3"]);
        assert_eq!(bracket.kind(), "submit_bracket");

        let cancel = OrderCommand::Cancel {
            order_id: "ts1-2".to_string(),
        };
        assert!(cancel.placed_ids().is_empty());
    }
}
