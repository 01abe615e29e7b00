use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{InstrumentId, OrderRole, OrderStatus, OrderType, Side, TimeInForce};
use crate::error::OrderStateError;
use crate::values::{Price, Shares, Timestamp};

/// Client-assigned order identifier
pub type OrderId = String;

/// One order of a trade, as known to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrder {
    pub id: OrderId,
    /// The instrument being traded
    pub instrument_id: InstrumentId,
    pub action: Side,
    pub order_type: OrderType,
    pub role: OrderRole,
    /// Bracket leg index; stop and target of one leg share it
    pub leg: Option<u16>,
    pub quantity: Shares,
    pub filled_quantity: Shares,
    /// Required for Limit and StopLimit orders
    pub limit_price: Option<Price>,
    /// Required for Stop and StopLimit orders
    pub stop_price: Option<Price>,
    pub average_fill_price: Option<Price>,
    pub time_in_force: TimeInForce,
    /// One-cancels-all group shared by bracket legs
    pub oca_group: Option<String>,
    pub status: OrderStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl TradeOrder {
    /// Create a new unsubmitted order
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<OrderId>,
        instrument_id: impl Into<InstrumentId>,
        action: Side,
        order_type: OrderType,
        role: OrderRole,
        quantity: Shares,
        limit_price: Option<Price>,
        stop_price: Option<Price>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            instrument_id: instrument_id.into(),
            action,
            order_type,
            role,
            leg: None,
            quantity,
            filled_quantity: 0,
            limit_price,
            stop_price,
            average_fill_price: None,
            time_in_force: TimeInForce::Day,
            oca_group: None,
            status: OrderStatus::Unsubmitted,
            created_at: timestamp,
            updated_at: timestamp,
        }
    }

    /// Market order
    pub fn market(
        id: impl Into<OrderId>,
        instrument_id: impl Into<InstrumentId>,
        action: Side,
        role: OrderRole,
        quantity: Shares,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(
            id,
            instrument_id,
            action,
            OrderType::Market,
            role,
            quantity,
            None,
            None,
            timestamp,
        )
    }

    /// Limit order
    pub fn limit(
        id: impl Into<OrderId>,
        instrument_id: impl Into<InstrumentId>,
        action: Side,
        role: OrderRole,
        quantity: Shares,
        limit_price: Price,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(
            id,
            instrument_id,
            action,
            OrderType::Limit,
            role,
            quantity,
            Some(limit_price),
            None,
            timestamp,
        )
    }

    /// Stop (market) order
    pub fn stop(
        id: impl Into<OrderId>,
        instrument_id: impl Into<InstrumentId>,
        action: Side,
        role: OrderRole,
        quantity: Shares,
        stop_price: Price,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(
            id,
            instrument_id,
            action,
            OrderType::Stop,
            role,
            quantity,
            None,
            Some(stop_price),
            timestamp,
        )
    }

    /// Stop-limit order
    #[allow(clippy::too_many_arguments)]
    pub fn stop_limit(
        id: impl Into<OrderId>,
        instrument_id: impl Into<InstrumentId>,
        action: Side,
        role: OrderRole,
        quantity: Shares,
        stop_price: Price,
        limit_price: Price,
        timestamp: Timestamp,
    ) -> Self {
        Self::new(
            id,
            instrument_id,
            action,
            OrderType::StopLimit,
            role,
            quantity,
            Some(limit_price),
            Some(stop_price),
            timestamp,
        )
    }

    /// Attach the order to a one-cancels-all group as bracket leg `leg`
    pub fn with_oca(mut self, group: impl Into<String>, leg: u16) -> Self {
        self.oca_group = Some(group.into());
        self.leg = Some(leg);
        self
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    /// Validate the order based on order type requirements
    pub fn validate(&self) -> bool {
        let prices_ok = match self.order_type {
            OrderType::Market => true,
            OrderType::Limit => self.limit_price.is_some(),
            OrderType::Stop => self.stop_price.is_some(),
            OrderType::StopLimit => self.limit_price.is_some() && self.stop_price.is_some(),
        };
        let positive = [self.limit_price, self.stop_price]
            .iter()
            .flatten()
            .all(|p| *p > Decimal::ZERO);
        prices_ok && positive && self.quantity > 0
    }

    /// Returns remaining quantity to be filled
    pub fn remaining_quantity(&self) -> Shares {
        self.quantity.saturating_sub(self.filled_quantity)
    }

    /// Returns true if the order is completely filled
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }

    /// Returns true while the order can still fill
    pub fn is_working(&self) -> bool {
        self.status.is_active()
    }

    fn terminal_error(&self, action: &'static str) -> OrderStateError {
        OrderStateError::Terminal {
            order_id: self.id.clone(),
            status: self.status.to_string(),
            action,
        }
    }

    /// Record that the order was handed to the broker
    pub fn mark_submitted(&mut self, timestamp: Timestamp) -> Result<(), OrderStateError> {
        match self.status {
            OrderStatus::Unsubmitted => {
                self.status = OrderStatus::Submitted;
                self.updated_at = timestamp;
                Ok(())
            }
            OrderStatus::Submitted | OrderStatus::PartiallyFilled => Ok(()),
            _ => Err(self.terminal_error("submitted")),
        }
    }

    /// Apply an execution of `quantity` shares at `price`
    pub fn apply_fill(
        &mut self,
        quantity: Shares,
        price: Price,
        timestamp: Timestamp,
    ) -> Result<(), OrderStateError> {
        if self.status.is_terminal() {
            return Err(self.terminal_error("filled"));
        }
        let remaining = self.remaining_quantity();
        if quantity == 0 || quantity > remaining {
            return Err(OrderStateError::Overfill {
                order_id: self.id.clone(),
                requested: quantity,
                remaining,
            });
        }

        let prior = Decimal::from(self.filled_quantity);
        let added = Decimal::from(quantity);
        let total = prior + added;
        let notional = self.average_fill_price.unwrap_or(Decimal::ZERO) * prior + price * added;
        self.average_fill_price = Some(notional / total);
        self.filled_quantity += quantity;
        self.status = if self.filled_quantity >= self.quantity {
            OrderStatus::Filled
        } else {
            OrderStatus::PartiallyFilled
        };
        self.updated_at = timestamp;
        Ok(())
    }

    /// Mark the order cancelled. Returns false if it already was.
    pub fn apply_cancel(&mut self, timestamp: Timestamp) -> Result<bool, OrderStateError> {
        match self.status {
            OrderStatus::Cancelled => Ok(false),
            OrderStatus::Filled | OrderStatus::Rejected => Err(self.terminal_error("cancelled")),
            _ => {
                self.status = OrderStatus::Cancelled;
                self.updated_at = timestamp;
                Ok(true)
            }
        }
    }

    /// Mark the order rejected by the broker
    pub fn apply_reject(&mut self, timestamp: Timestamp) -> Result<(), OrderStateError> {
        if self.status.is_terminal() {
            return Err(self.terminal_error("rejected"));
        }
        self.status = OrderStatus::Rejected;
        self.updated_at = timestamp;
        Ok(())
    }

    /// Move the stop (aux) price of a working stop order
    pub fn amend_stop_price(
        &mut self,
        price: Price,
        timestamp: Timestamp,
    ) -> Result<(), OrderStateError> {
        if !self.order_type.has_stop() {
            return Err(OrderStateError::NotAStop(self.id.clone()));
        }
        if self.status.is_terminal() {
            return Err(self.terminal_error("amended"));
        }
        self.stop_price = Some(price);
        self.updated_at = timestamp;
        Ok(())
    }
}
