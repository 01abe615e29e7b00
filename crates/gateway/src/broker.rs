//! The broker port

use meridian_core::{OrderId, Price, TradeOrder};

use crate::error::GatewayResult;

/// Outbound broker calls made by the engine
///
/// Every call is fire-and-forget: an `Ok` means the command was accepted for
/// delivery, not that the broker acted on it. Outcomes arrive later as
/// [`BrokerEvent`](crate::BrokerEvent)s.
pub trait BrokerGateway: Send + Sync {
    fn submit_entry(&self, order: TradeOrder) -> GatewayResult<OrderId>;

    /// Submit a stop and a target sharing one OCA group
    fn submit_bracket(
        &self,
        stop: TradeOrder,
        target: TradeOrder,
        oca_group: &str,
    ) -> GatewayResult<(OrderId, OrderId)>;

    fn submit_order(&self, order: TradeOrder) -> GatewayResult<OrderId>;

    fn cancel(&self, order_id: &str) -> GatewayResult<()>;

    fn amend_stop_price(&self, order_id: &str, price: Price) -> GatewayResult<()>;
}
