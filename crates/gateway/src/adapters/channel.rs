//! Tokio channel-based broker shim
//!
//! Turns each broker call into an [`OrderCommand`] on a bounded mpsc
//! channel. Sending never blocks: a full queue is reported as an error
//! rather than waited on.

use meridian_core::{OrderId, Price, TradeOrder};
use tokio::sync::mpsc;

use crate::broker::BrokerGateway;
use crate::error::{GatewayError, GatewayResult};
use crate::messages::OrderCommand;

/// Channel-based gateway; the receiving half drives the real broker
#[derive(Clone)]
pub struct ChannelBrokerGateway {
    tx: mpsc::Sender<OrderCommand>,
}

impl ChannelBrokerGateway {
    pub fn new(tx: mpsc::Sender<OrderCommand>) -> Self {
        Self { tx }
    }

    /// Create a gateway/receiver pair with given capacity
    pub fn pair(capacity: usize) -> (Self, mpsc::Receiver<OrderCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    fn send(&self, command: OrderCommand) -> GatewayResult<()> {
        log::debug!("[ChannelBroker] {}", command.kind());
        self.tx.try_send(command).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => GatewayError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => GatewayError::ChannelClosed,
        })
    }
}

impl BrokerGateway for ChannelBrokerGateway {
    fn submit_entry(&self, order: TradeOrder) -> GatewayResult<OrderId> {
        let id = order.id.clone();
        self.send(OrderCommand::SubmitEntry(order))?;
        Ok(id)
    }

    fn submit_bracket(
        &self,
        stop: TradeOrder,
        target: TradeOrder,
        oca_group: &str,
    ) -> GatewayResult<(OrderId, OrderId)> {
        let ids = (stop.id.clone(), target.id.clone());
        self.send(OrderCommand::SubmitBracket {
            stop,
            target,
            oca_group: oca_group.to_string(),
        })?;
        Ok(ids)
    }

    fn submit_order(&self, order: TradeOrder) -> GatewayResult<OrderId> {
        let id = order.id.clone();
        self.send(OrderCommand::SubmitOrder(order))?;
        Ok(id)
    }

    fn cancel(&self, order_id: &str) -> GatewayResult<()> {
        self.send(OrderCommand::Cancel {
            order_id: order_id.to_string(),
        })
    }

    fn amend_stop_price(&self, order_id: &str, price: Price) -> GatewayResult<()> {
        self.send(OrderCommand::AmendStopPrice {
            order_id: order_id.to_string(),
            price,
        })
    }
}
