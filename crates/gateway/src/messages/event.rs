use meridian_core::{OrderId, Price, Shares, Timestamp};
use serde::{Deserialize, Serialize};

/// Asynchronous notification from the broker about one order
///
/// `Fill` completes the order; `PartialFill` leaves a remainder working.
/// Both carry the quantity and price of this execution only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BrokerEvent {
    Fill {
        order_id: OrderId,
        quantity: Shares,
        price: Price,
        timestamp: Timestamp,
    },
    PartialFill {
        order_id: OrderId,
        quantity: Shares,
        price: Price,
        timestamp: Timestamp,
    },
    Cancelled {
        order_id: OrderId,
        timestamp: Timestamp,
    },
    Rejected {
        order_id: OrderId,
        reason: String,
        timestamp: Timestamp,
    },
}

impl BrokerEvent {
    pub fn order_id(&self) -> &str {
        match self {
            BrokerEvent::Fill { order_id, .. }
            | BrokerEvent::PartialFill { order_id, .. }
            | BrokerEvent::Cancelled { order_id, .. }
            | BrokerEvent::Rejected { order_id, .. } => order_id,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            BrokerEvent::Fill { timestamp, .. }
            | BrokerEvent::PartialFill { timestamp, .. }
            | BrokerEvent::Cancelled { timestamp, .. }
            | BrokerEvent::Rejected { timestamp, .. } => *timestamp,
        }
    }

    /// Executed quantity and price, for fill events
    pub fn execution(&self) -> Option<(Shares, Price)> {
        match self {
            BrokerEvent::Fill {
                quantity, price, ..
            }
            | BrokerEvent::PartialFill {
                quantity, price, ..
            } => Some((*quantity, *price)),
            _ => None,
        }
    }
}
