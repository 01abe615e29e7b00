use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Direction, InstrumentId, OrderId, OrderRole, TradeOrder};
use crate::error::OrderStateError;
use crate::values::{Price, Shares, Timestamp};

/// Unique identifier for a trade
pub type TradeId = Uuid;

/// Position life cycle container: the entry order plus every exit order
///
/// At most one open-position (entry) order exists per trade. Once it fills,
/// stop and target legs share an OCA group; legs are paired by `leg` index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub tradestrategy_id: String,
    pub instrument_id: InstrumentId,
    pub direction: Direction,
    orders: Vec<TradeOrder>,
    pub opened_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
}

impl Trade {
    pub fn new(
        tradestrategy_id: impl Into<String>,
        instrument_id: impl Into<InstrumentId>,
        direction: Direction,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tradestrategy_id: tradestrategy_id.into(),
            instrument_id: instrument_id.into(),
            direction,
            orders: Vec::new(),
            opened_at: None,
            closed_at: None,
        }
    }

    /// All orders in submission order
    pub fn orders(&self) -> &[TradeOrder] {
        &self.orders
    }

    pub fn order(&self, order_id: &str) -> Option<&TradeOrder> {
        self.orders.iter().find(|o| o.id == order_id)
    }

    fn order_mut(&mut self, order_id: &str) -> Result<&mut TradeOrder, OrderStateError> {
        self.orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or_else(|| OrderStateError::UnknownOrder(order_id.to_string()))
    }

    /// Add an order; a second entry order is refused
    pub fn add_order(&mut self, order: TradeOrder) -> Result<(), OrderStateError> {
        if self.order(&order.id).is_some() {
            return Err(OrderStateError::DuplicateOrder(order.id));
        }
        if order.role == OrderRole::Entry && self.open_position_order().is_some() {
            return Err(OrderStateError::DuplicateEntry(self.id.to_string()));
        }
        self.orders.push(order);
        Ok(())
    }

    /// The entry order, if one was placed
    pub fn open_position_order(&self) -> Option<&TradeOrder> {
        self.orders.iter().find(|o| o.role == OrderRole::Entry)
    }

    /// Shares bought (long) or sold (short) by the entry order
    pub fn entry_filled(&self) -> Shares {
        self.open_position_order()
            .map(|o| o.filled_quantity)
            .unwrap_or(0)
    }

    /// Shares closed by exit orders
    pub fn exit_filled(&self) -> Shares {
        self.orders
            .iter()
            .filter(|o| o.role.is_exit())
            .map(|o| o.filled_quantity)
            .sum()
    }

    /// Shares currently held
    pub fn open_quantity(&self) -> Shares {
        self.entry_filled().saturating_sub(self.exit_filled())
    }

    pub fn average_entry_price(&self) -> Option<Price> {
        self.open_position_order()
            .and_then(|o| o.average_fill_price)
    }

    /// Working orders of any role
    pub fn working_orders(&self) -> impl Iterator<Item = &TradeOrder> {
        self.orders.iter().filter(|o| o.is_working())
    }

    /// Working protective stop legs
    pub fn working_stops(&self) -> impl Iterator<Item = &TradeOrder> {
        self.working_orders().filter(|o| o.role == OrderRole::Stop)
    }

    /// Shares protected by working stop legs
    pub fn covered_quantity(&self) -> Shares {
        self.working_stops().map(|o| o.remaining_quantity()).sum()
    }

    /// The stop price currently protecting the position (least favorable leg)
    pub fn current_stop_price(&self) -> Option<Price> {
        let stops = self.working_stops().filter_map(|o| o.stop_price);
        match self.direction {
            Direction::Long => stops.min(),
            Direction::Short => stops.max(),
        }
    }

    /// Working orders in the same OCA group and leg as `order_id`
    pub fn siblings(&self, order_id: &str) -> Vec<&TradeOrder> {
        let Some(order) = self.order(order_id) else {
            return Vec::new();
        };
        self.working_orders()
            .filter(|o| {
                o.id != order.id
                    && o.oca_group.is_some()
                    && o.oca_group == order.oca_group
                    && o.leg == order.leg
            })
            .collect()
    }

    /// Next unused bracket leg index
    pub fn next_leg_index(&self) -> u16 {
        self.orders
            .iter()
            .filter_map(|o| o.leg)
            .max()
            .map(|l| l + 1)
            .unwrap_or(0)
    }

    pub fn mark_submitted(
        &mut self,
        order_id: &str,
        timestamp: Timestamp,
    ) -> Result<(), OrderStateError> {
        self.order_mut(order_id)?.mark_submitted(timestamp)
    }

    /// Apply an execution and track when the position opened and closed
    pub fn apply_fill(
        &mut self,
        order_id: &str,
        quantity: Shares,
        price: Price,
        timestamp: Timestamp,
    ) -> Result<(), OrderStateError> {
        let is_exit = self
            .order(order_id)
            .ok_or_else(|| OrderStateError::UnknownOrder(order_id.to_string()))?
            .role
            .is_exit();
        if is_exit {
            let held = self.open_quantity();
            if quantity > held {
                return Err(OrderStateError::Overfill {
                    order_id: order_id.to_string(),
                    requested: quantity,
                    remaining: held,
                });
            }
        }

        self.order_mut(order_id)?
            .apply_fill(quantity, price, timestamp)?;

        if self.opened_at.is_none() && self.entry_filled() > 0 {
            self.opened_at = Some(timestamp);
        }
        if self.is_closed() && self.closed_at.is_none() {
            self.closed_at = Some(timestamp);
        }
        Ok(())
    }

    pub fn apply_cancel(
        &mut self,
        order_id: &str,
        timestamp: Timestamp,
    ) -> Result<bool, OrderStateError> {
        self.order_mut(order_id)?.apply_cancel(timestamp)
    }

    pub fn apply_reject(
        &mut self,
        order_id: &str,
        timestamp: Timestamp,
    ) -> Result<(), OrderStateError> {
        self.order_mut(order_id)?.apply_reject(timestamp)
    }

    pub fn amend_stop_price(
        &mut self,
        order_id: &str,
        price: Price,
        timestamp: Timestamp,
    ) -> Result<(), OrderStateError> {
        self.order_mut(order_id)?.amend_stop_price(price, timestamp)
    }

    /// True while shares are held
    pub fn is_open(&self) -> bool {
        self.open_quantity() > 0
    }

    /// True once a filled entry has been fully exited
    pub fn is_closed(&self) -> bool {
        self.entry_filled() > 0 && self.open_quantity() == 0
    }

    /// Profit or loss realized by exit fills so far
    pub fn realized_pnl(&self) -> Decimal {
        let Some(entry) = self.average_entry_price() else {
            return Decimal::ZERO;
        };
        self.orders
            .iter()
            .filter(|o| o.role.is_exit())
            .filter_map(|o| {
                o.average_fill_price
                    .map(|px| (px - entry) * Decimal::from(o.filled_quantity))
            })
            .sum::<Decimal>()
            * self.direction.sign()
    }

    /// Ids of orders that still need cancelling
    pub fn working_order_ids(&self) -> Vec<OrderId> {
        self.working_orders().map(|o| o.id.clone()).collect()
    }
}
