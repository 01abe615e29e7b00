//! Paper broker
//!
//! Keeps working orders in memory and matches them against bars as they are
//! fed in. Fills, cancels and rejections come out as [`BrokerEvent`]s on an
//! unbounded channel, exactly as a live broker's notifications would.
//!
//! Matching per bar (open/high/low/close):
//! - market: the bar open
//! - limit: touched when the bar trades through the limit; price is the
//!   open if it gapped through, else the limit
//! - stop: triggered when the bar trades through the stop; price is the
//!   open if it gapped through, else the stop
//! - stop-limit: triggers like a stop, fills like a limit once triggered
//!
//! Stops are matched before targets within a bar. A complete fill of an OCA
//! leg cancels the working orders of the same group and leg.

use dashmap::DashMap;
use meridian_core::{
    CandleItem, InstrumentId, OrderId, OrderType, Price, Shares, Side, Timestamp, TradeOrder,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::mpsc;

use crate::broker::BrokerGateway;
use crate::error::{GatewayError, GatewayResult};
use crate::messages::BrokerEvent;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperBrokerConfig {
    /// Largest quantity filled per order per bar; `None` fills in full
    pub max_fill_per_bar: Option<Shares>,
    /// Fill market orders at the last price as soon as they arrive
    pub fill_market_immediately: bool,
}

impl Default for PaperBrokerConfig {
    fn default() -> Self {
        Self {
            max_fill_per_bar: None,
            fill_market_immediately: true,
        }
    }
}

#[derive(Debug)]
struct WorkingOrder {
    seq: u64,
    order: TradeOrder,
    /// Stop-limit stop already touched
    triggered: bool,
}

pub struct PaperBroker {
    config: PaperBrokerConfig,
    orders: DashMap<OrderId, WorkingOrder>,
    last_trade: DashMap<InstrumentId, (Price, Timestamp)>,
    seq: AtomicU64,
    reject_next: AtomicBool,
    events: mpsc::UnboundedSender<BrokerEvent>,
}

impl PaperBroker {
    pub fn new(config: PaperBrokerConfig) -> (Self, mpsc::UnboundedReceiver<BrokerEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let broker = Self {
            config,
            orders: DashMap::new(),
            last_trade: DashMap::new(),
            seq: AtomicU64::new(0),
            reject_next: AtomicBool::new(false),
            events,
        };
        (broker, rx)
    }

    /// Reject the next submitted order
    pub fn reject_next(&self) {
        self.reject_next.store(true, Ordering::SeqCst);
    }

    pub fn last_price(&self, instrument_id: &InstrumentId) -> Option<Price> {
        self.last_trade.get(instrument_id).map(|e| e.0)
    }

    /// Snapshot of the working orders, oldest first
    pub fn working_orders(&self) -> Vec<TradeOrder> {
        let mut working: Vec<(u64, TradeOrder)> = self
            .orders
            .iter()
            .map(|e| (e.seq, e.order.clone()))
            .collect();
        working.sort_by_key(|(seq, _)| *seq);
        working.into_iter().map(|(_, o)| o).collect()
    }

    pub fn working_order(&self, order_id: &str) -> Option<TradeOrder> {
        self.orders.get(order_id).map(|e| e.order.clone())
    }

    fn emit(&self, event: BrokerEvent) {
        if self.events.send(event).is_err() {
            log::debug!("[PaperBroker] event receiver dropped");
        }
    }

    fn accept(&self, mut order: TradeOrder) -> GatewayResult<OrderId> {
        let id = order.id.clone();
        if self.orders.contains_key(&id) {
            return Err(GatewayError::DuplicateOrder(id));
        }

        let timestamp = self
            .last_trade
            .get(&order.instrument_id)
            .map(|e| e.1)
            .unwrap_or(order.created_at);

        if self.reject_next.swap(false, Ordering::SeqCst) {
            log::info!("[PaperBroker] rejecting {}", id);
            self.emit(BrokerEvent::Rejected {
                order_id: id.clone(),
                reason: "rejected by paper broker".to_string(),
                timestamp,
            });
            return Ok(id);
        }
        if !order.validate() {
            log::warn!("[PaperBroker] invalid order {}", id);
            self.emit(BrokerEvent::Rejected {
                order_id: id.clone(),
                reason: "missing price or zero quantity".to_string(),
                timestamp,
            });
            return Ok(id);
        }

        if order.mark_submitted(timestamp).is_err() {
            return Err(GatewayError::InvalidOrder {
                order_id: id,
                reason: format!("status {}", order.status),
            });
        }

        if order.order_type == OrderType::Market
            && self.config.fill_market_immediately
            && let Some(last) = self.last_trade.get(&order.instrument_id).map(|e| *e)
        {
            let (price, at) = last;
            log::debug!("[PaperBroker] {} filled at market {}", id, price);
            self.emit(BrokerEvent::Fill {
                order_id: id.clone(),
                quantity: order.remaining_quantity(),
                price,
                timestamp: at,
            });
            return Ok(id);
        }

        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.orders.insert(
            id.clone(),
            WorkingOrder {
                seq,
                order,
                triggered: false,
            },
        );
        Ok(id)
    }

    /// Match every working order of the bar's instrument against it
    pub fn on_bar(&self, instrument_id: &InstrumentId, bar: &CandleItem) {
        let timestamp = bar.end();
        self.last_trade
            .insert(instrument_id.clone(), (bar.close, timestamp));

        let mut candidates: Vec<(u8, u64, OrderId)> = self
            .orders
            .iter()
            .filter(|e| &e.order.instrument_id == instrument_id)
            .map(|e| (match_priority(&e.order), e.seq, e.key().clone()))
            .collect();
        candidates.sort();

        for (_, _, id) in candidates {
            // An earlier fill in this bar may have cancelled it through OCA
            let Some(mut working) = self.orders.get_mut(&id) else {
                continue;
            };
            let Some(price) = match_order(&mut working, bar) else {
                continue;
            };

            let remaining = working.order.remaining_quantity();
            let quantity = self
                .config
                .max_fill_per_bar
                .map_or(remaining, |cap| cap.min(remaining));
            if let Err(e) = working.order.apply_fill(quantity, price, timestamp) {
                log::error!("[PaperBroker] fill of {} failed: {}", id, e);
                continue;
            }
            let done = working.order.is_filled();
            let oca = working
                .order
                .oca_group
                .clone()
                .map(|group| (group, working.order.leg));
            drop(working);

            if done {
                self.orders.remove(&id);
                log::debug!("[PaperBroker] {} filled {} at {}", id, quantity, price);
                self.emit(BrokerEvent::Fill {
                    order_id: id.clone(),
                    quantity,
                    price,
                    timestamp,
                });
                if let Some((group, leg)) = oca {
                    self.cancel_oca(&id, &group, leg, timestamp);
                }
            } else {
                self.emit(BrokerEvent::PartialFill {
                    order_id: id,
                    quantity,
                    price,
                    timestamp,
                });
            }
        }
    }

    fn cancel_oca(&self, filled: &str, group: &str, leg: Option<u16>, timestamp: Timestamp) {
        let siblings: Vec<OrderId> = self
            .orders
            .iter()
            .filter(|e| {
                e.key() != filled
                    && e.order.oca_group.as_deref() == Some(group)
                    && e.order.leg == leg
            })
            .map(|e| e.key().clone())
            .collect();
        for id in siblings {
            if self.orders.remove(&id).is_some() {
                log::debug!("[PaperBroker] OCA cancel {}", id);
                self.emit(BrokerEvent::Cancelled {
                    order_id: id,
                    timestamp,
                });
            }
        }
    }
}

/// Markets first, then stops, then everything else
fn match_priority(order: &TradeOrder) -> u8 {
    match order.order_type {
        OrderType::Market => 0,
        OrderType::Stop => 1,
        OrderType::StopLimit => 2,
        OrderType::Limit => 3,
    }
}

fn limit_fill(side: Side, limit: Price, bar: &CandleItem) -> Option<Price> {
    match side {
        Side::Buy => (bar.low <= limit).then(|| bar.open.min(limit)),
        Side::Sell => (bar.high >= limit).then(|| bar.open.max(limit)),
    }
}

fn stop_touched(side: Side, stop: Price, bar: &CandleItem) -> Option<Price> {
    match side {
        Side::Buy => (bar.high >= stop).then(|| bar.open.max(stop)),
        Side::Sell => (bar.low <= stop).then(|| bar.open.min(stop)),
    }
}

fn match_order(working: &mut WorkingOrder, bar: &CandleItem) -> Option<Price> {
    let order = &working.order;
    match order.order_type {
        OrderType::Market => Some(bar.open),
        OrderType::Limit => limit_fill(order.action, order.limit_price?, bar),
        OrderType::Stop => stop_touched(order.action, order.stop_price?, bar),
        OrderType::StopLimit => {
            let limit = order.limit_price?;
            if working.triggered {
                return limit_fill(order.action, limit, bar);
            }
            let price = stop_touched(order.action, order.stop_price?, bar)?;
            working.triggered = true;
            let within = match order.action {
                Side::Buy => price <= limit,
                Side::Sell => price >= limit,
            };
            within.then_some(price)
        }
    }
}

impl BrokerGateway for PaperBroker {
    fn submit_entry(&self, order: TradeOrder) -> GatewayResult<OrderId> {
        self.accept(order)
    }

    fn submit_bracket(
        &self,
        mut stop: TradeOrder,
        mut target: TradeOrder,
        oca_group: &str,
    ) -> GatewayResult<(OrderId, OrderId)> {
        stop.oca_group.get_or_insert_with(|| oca_group.to_string());
        target.oca_group.get_or_insert_with(|| oca_group.to_string());
        let stop_id = self.accept(stop)?;
        let target_id = self.accept(target)?;
        Ok((stop_id, target_id))
    }

    fn submit_order(&self, order: TradeOrder) -> GatewayResult<OrderId> {
        self.accept(order)
    }

    fn cancel(&self, order_id: &str) -> GatewayResult<()> {
        let (_, working) = self
            .orders
            .remove(order_id)
            .ok_or_else(|| GatewayError::UnknownOrder(order_id.to_string()))?;
        let timestamp = self
            .last_trade
            .get(&working.order.instrument_id)
            .map(|e| e.1)
            .unwrap_or(working.order.updated_at);
        self.emit(BrokerEvent::Cancelled {
            order_id: order_id.to_string(),
            timestamp,
        });
        Ok(())
    }

    fn amend_stop_price(&self, order_id: &str, price: Price) -> GatewayResult<()> {
        let mut working = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| GatewayError::UnknownOrder(order_id.to_string()))?;
        let timestamp = working.order.updated_at;
        working
            .order
            .amend_stop_price(price, timestamp)
            .map_err(|e| GatewayError::InvalidOrder {
                order_id: order_id.to_string(),
                reason: e.to_string(),
            })
    }
}
