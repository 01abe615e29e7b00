//! Opening-range breakout rule
//!
//! ```text
//!  WAITING_FOR_SIGNAL --signal ok--> ORDER_SUBMITTED --fill--> POSITION_OPEN_UNCOVERED
//!          |                          |                               |
//!       rejected              invalidated / cutoff               bracket sent
//!          |                          |                               v
//!          +-----------> TERMINATING <------- exit / EOD ------ POSITION_COVERED
//!                            |                                   (trail stops)
//!                            v
//!                          DONE
//! ```
//!
//! TERMINATING is passed through within a single call: residual orders are
//! cancelled, any open quantity is liquidated at market, and the rule is DONE.

use chrono::NaiveTime;
use log::{debug, error, info, warn};
use meridian_core::{
    CandleItem, CandleSeries, Direction, OrderId, OrderRole, Price, RejectReason, Shares,
    Timestamp, Trade, TradeOrder, Tradestrategy, TradestrategyStatus,
};
use meridian_gateway::BrokerEvent;
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::action::Action;
use crate::config::StrategyConfig;
use crate::context::RuleContext;
use crate::error::{Result, StrategyRuleError, codes};
use crate::policy::rounding::round_to_tick_directed;
use crate::policy::trailing::{break_even_stop, is_protective, tightest};
use crate::policy::{
    BracketPolicy, EntrySignal, EntrySignalPolicy, SignalDecision, TrailingPolicy, bracket,
};
use crate::rule::StrategyRule;
use crate::state::RuleState;

/// Session instants for the trading day, resolved once
#[derive(Debug, Clone, Copy)]
struct Schedule {
    signal_end: Timestamp,
    entry_cutoff: Timestamp,
    close_position: Timestamp,
    break_even: Option<Timestamp>,
}

/// A session time is reached once the live bar's period runs past it
fn reached(live: &CandleItem, at: Timestamp) -> bool {
    live.end() > at
}

pub struct BreakoutRule {
    label: String,
    tradestrategy: Tradestrategy,
    signal_policy: EntrySignalPolicy,
    bracket_policy: BracketPolicy,
    trailing: TrailingPolicy,
    entry_cutoff_time: NaiveTime,
    close_position_time: NaiveTime,

    state: RuleState,
    trade: Option<Trade>,
    signal: Option<EntrySignal>,
    schedule: Option<Schedule>,
    unit_risk: Option<Price>,
    break_even_done: bool,
    cancel_requested: bool,
    pending_cancels: HashSet<OrderId>,
    order_counter: u64,
}

impl BreakoutRule {
    pub fn new(config: &StrategyConfig, tradestrategy: Tradestrategy) -> Self {
        Self {
            label: format!("{}:{}", config.kind.name(), tradestrategy.id),
            signal_policy: config.signal.clone(),
            bracket_policy: config.bracket.clone(),
            trailing: config.trailing(),
            entry_cutoff_time: config.entry_cutoff_time,
            close_position_time: config.close_position_time,
            tradestrategy,
            state: RuleState::WaitingForSignal,
            trade: None,
            signal: None,
            schedule: None,
            unit_risk: None,
            break_even_done: false,
            cancel_requested: false,
            pending_cancels: HashSet::new(),
            order_counter: 0,
        }
    }

    /// The accepted signal, once evaluated
    pub fn signal(&self) -> Option<&EntrySignal> {
        self.signal.as_ref()
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel_requested
    }

    fn next_order_id(&mut self) -> OrderId {
        self.order_counter += 1;
        format!("{}-{}", self.tradestrategy.id, self.order_counter)
    }

    fn oca_group(&self) -> String {
        format!("{}-oca", self.tradestrategy.id)
    }

    fn schedule(&mut self, ctx: &RuleContext) -> Result<Schedule> {
        if let Some(schedule) = self.schedule {
            return Ok(schedule);
        }
        let calendar = &ctx.calendar;
        let day = self.tradestrategy.trading_day;
        let schedule = Schedule {
            signal_end: self.signal_policy.signal_bar_end(calendar, day)?,
            entry_cutoff: calendar.at_local_time(day, self.entry_cutoff_time)?,
            close_position: calendar.at_local_time(day, self.close_position_time)?,
            break_even: self
                .trailing
                .break_even_time
                .map(|t| calendar.at_local_time(day, t))
                .transpose()?,
        };
        debug!(
            "[Rule {}] signal bar ends {}, entry cutoff {}, close {}",
            self.label, schedule.signal_end, schedule.entry_cutoff, schedule.close_position
        );
        self.schedule = Some(schedule);
        Ok(schedule)
    }

    /// Record a status change; terminal and error statuses are kept
    fn set_status(&mut self, status: TradestrategyStatus, actions: &mut Vec<Action>) {
        let current = self.tradestrategy.status;
        if current == status || current.is_terminal() || current == TradestrategyStatus::Error {
            return;
        }
        info!("[Rule {}] {} -> {}", self.label, current, status);
        self.tradestrategy.status = status;
        actions.push(Action::UpdateStatus(status));
    }

    // ── Signal ───────────────────────────────────────────────────────

    /// Runs on the first update whose just-closed bar is the signal bar,
    /// whether or not the feed flagged it as a new bar
    fn await_signal(
        &mut self,
        ctx: &RuleContext,
        series: &CandleSeries,
        live: &CandleItem,
        schedule: &Schedule,
        actions: &mut Vec<Action>,
    ) -> Result<()> {
        match series.last_completed() {
            Some(bar) if bar.end() == schedule.signal_end => {
                let decision =
                    self.signal_policy
                        .evaluate(bar, &self.tradestrategy, &ctx.entry_limits)?;
                match decision {
                    SignalDecision::Accept(signal) => self.submit_entry(signal, live.start(), actions),
                    SignalDecision::Reject(reason) => {
                        self.reject(reason, live.start(), actions);
                        Ok(())
                    }
                }
            }
            Some(bar) if bar.end() > schedule.signal_end => {
                self.reject(RejectReason::SignalWindowMissed, live.start(), actions);
                Ok(())
            }
            None if live.start() >= schedule.signal_end => {
                self.reject(RejectReason::SignalWindowMissed, live.start(), actions);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn reject(&mut self, reason: RejectReason, now: Timestamp, actions: &mut Vec<Action>) {
        info!(
            "[Rule {}] signal rejected ({}.{}): {}",
            self.label,
            codes::SIGNAL,
            reason.sub_code(),
            reason.description()
        );
        self.terminate(Some(TradestrategyStatus::Rejected(reason)), now, actions);
    }

    fn submit_entry(
        &mut self,
        signal: EntrySignal,
        now: Timestamp,
        actions: &mut Vec<Action>,
    ) -> Result<()> {
        let id = self.next_order_id();
        let instrument = self.tradestrategy.instrument_id.clone();
        let order = TradeOrder::stop_limit(
            id.clone(),
            instrument.clone(),
            signal.direction.entry_action(),
            OrderRole::Entry,
            signal.quantity,
            signal.entry_price,
            signal.limit_price,
            now,
        );

        let mut trade = Trade::new(self.tradestrategy.id.clone(), instrument, signal.direction);
        trade.add_order(order.clone())?;
        trade.mark_submitted(&id, now)?;

        info!(
            "[Rule {}] {} {} @ stop {} limit {}, protective stop {}",
            self.label,
            signal.direction.entry_action().as_str(),
            signal.quantity,
            signal.entry_price,
            signal.limit_price,
            signal.stop_price
        );
        actions.push(Action::submit_entry(order));
        self.trade = Some(trade);
        self.signal = Some(signal);
        self.state = RuleState::OrderSubmitted;
        self.set_status(TradestrategyStatus::EntrySubmitted, actions);
        Ok(())
    }

    fn watch_entry(
        &mut self,
        live: &CandleItem,
        now: Timestamp,
        schedule: &Schedule,
        actions: &mut Vec<Action>,
    ) {
        if reached(live, schedule.entry_cutoff) {
            info!("[Rule {}] entry unfilled at cutoff", self.label);
            self.terminate(Some(TradestrategyStatus::Unfilled), now, actions);
            return;
        }
        let Some(signal) = &self.signal else {
            return;
        };
        let invalidated = match signal.direction {
            Direction::Long => live.close < signal.invalidation_price,
            Direction::Short => live.close > signal.invalidation_price,
        };
        if invalidated {
            info!(
                "[Rule {}] breakout invalidated: {} crossed {}",
                self.label, live.close, signal.invalidation_price
            );
            self.terminate(Some(TradestrategyStatus::Cancelled), now, actions);
        }
    }

    // ── Position ─────────────────────────────────────────────────────

    /// Bracket whatever part of the open position has no working stop
    fn cover(&mut self, now: Timestamp, actions: &mut Vec<Action>) -> Result<()> {
        let Some(trade) = &self.trade else {
            return Ok(());
        };
        let uncovered = trade.open_quantity().saturating_sub(trade.covered_quantity());
        if uncovered == 0 {
            self.state = RuleState::PositionCovered;
            return Ok(());
        }
        let direction = trade.direction;
        let fill = trade.average_entry_price().unwrap_or(Decimal::ZERO);
        let first_leg = trade.next_leg_index();

        let unit_risk = match self.unit_risk {
            Some(r) => r,
            None => {
                let entry_quantity = trade
                    .open_position_order()
                    .map(|o| o.quantity)
                    .unwrap_or(uncovered);
                let r = bracket::unit_risk(self.tradestrategy.risk_amount.value()?, entry_quantity)?;
                self.unit_risk = Some(r);
                r
            }
        };

        let legs = match self
            .bracket_policy
            .build(direction, fill, uncovered, unit_risk, first_leg)
        {
            Ok(legs) => legs,
            Err(e) => {
                error!(
                    "[Rule {}] bracket failed ({}.{}): {}; liquidating",
                    self.label,
                    codes::BRACKET,
                    e.sub_code(),
                    e
                );
                self.set_status(TradestrategyStatus::Error, actions);
                self.terminate(None, now, actions);
                return Ok(());
            }
        };

        let oca = self.oca_group();
        let instrument = self.tradestrategy.instrument_id.clone();
        let exit = direction.exit_action();
        for leg in legs {
            let stop = TradeOrder::stop(
                self.next_order_id(),
                instrument.clone(),
                exit,
                OrderRole::Stop,
                leg.quantity,
                leg.stop_price,
                now,
            )
            .with_oca(oca.clone(), leg.leg);
            let target = TradeOrder::limit(
                self.next_order_id(),
                instrument.clone(),
                exit,
                OrderRole::Target,
                leg.quantity,
                leg.target_price,
                now,
            )
            .with_oca(oca.clone(), leg.leg);

            if let Some(trade) = self.trade.as_mut() {
                trade.add_order(stop.clone())?;
                trade.add_order(target.clone())?;
                trade.mark_submitted(&stop.id, now)?;
                trade.mark_submitted(&target.id, now)?;
            }
            info!(
                "[Rule {}] leg {}: {} shares, stop {}, target {}",
                self.label, leg.leg, leg.quantity, leg.stop_price, leg.target_price
            );
            actions.push(Action::submit_bracket(stop, target, oca.clone()));
        }
        self.state = RuleState::PositionCovered;
        Ok(())
    }

    /// Tighten working stops after a completed bar
    fn trail(
        &mut self,
        series: &CandleSeries,
        live: &CandleItem,
        now: Timestamp,
        schedule: &Schedule,
        actions: &mut Vec<Action>,
    ) -> Result<()> {
        let Some(trade) = &self.trade else {
            return Ok(());
        };
        let Some(current) = trade.current_stop_price() else {
            return Ok(());
        };
        let direction = trade.direction;
        let primary = series.bar_size_minutes == self.tradestrategy.bar_size_minutes;

        let mut candidates = Vec::new();
        let break_even_due =
            primary && !self.break_even_done && schedule.break_even.is_some_and(|t| reached(live, t));
        if break_even_due && let Some(average) = trade.average_entry_price() {
            candidates.extend(break_even_stop(
                direction,
                average,
                series.last_completed(),
                current,
            ));
        }
        if self
            .trailing
            .trails_on(series, self.tradestrategy.bar_size_minutes)
        {
            candidates.extend(self.trailing.bar_trail(series, direction, current));
        }
        if break_even_due {
            self.break_even_done = true;
        }

        // Loose side of the tick grid
        let tick = self.bracket_policy.tick;
        let candidates = candidates
            .into_iter()
            .map(|p| round_to_tick_directed(p, direction == Direction::Short, tick))
            .filter(|p| direction.is_tighter_stop(*p, current));
        let Some(stop) = tightest(direction, candidates) else {
            return Ok(());
        };
        if !is_protective(direction, stop, live.close) {
            debug!(
                "[Rule {}] trail {} not protective against {}",
                self.label, stop, live.close
            );
            return Ok(());
        }

        let Some(trade) = self.trade.as_mut() else {
            return Ok(());
        };
        let to_amend: Vec<OrderId> = trade
            .working_stops()
            .filter(|o| {
                o.stop_price
                    .is_some_and(|p| direction.is_tighter_stop(stop, p))
                    && !self.pending_cancels.contains(&o.id)
            })
            .map(|o| o.id.clone())
            .collect();
        for id in to_amend {
            trade.amend_stop_price(&id, stop, now)?;
            info!("[Rule {}] stop {} -> {}", self.label, id, stop);
            actions.push(Action::amend_stop(id, stop));
        }
        Ok(())
    }

    /// Cancel an entry remainder still working after the cutoff
    fn cancel_stale_entry(
        &mut self,
        live: &CandleItem,
        schedule: &Schedule,
        actions: &mut Vec<Action>,
    ) {
        if !reached(live, schedule.entry_cutoff) {
            return;
        }
        let Some(trade) = &self.trade else {
            return;
        };
        if let Some(entry) = trade.open_position_order()
            && entry.is_working()
            && self.pending_cancels.insert(entry.id.clone())
        {
            info!("[Rule {}] cancelling entry remainder at cutoff", self.label);
            actions.push(Action::cancel(entry.id.clone()));
        }
    }

    // ── Termination ──────────────────────────────────────────────────

    /// Cancel every working order except liquidations
    fn cancel_working(&mut self, actions: &mut Vec<Action>) {
        let Some(trade) = &self.trade else {
            return;
        };
        for order in trade.working_orders() {
            if order.role != OrderRole::Liquidation && self.pending_cancels.insert(order.id.clone()) {
                actions.push(Action::cancel(order.id.clone()));
            }
        }
    }

    /// Market order for the open quantity not already being liquidated
    fn liquidate(&mut self, now: Timestamp, actions: &mut Vec<Action>) {
        let Some(trade) = &self.trade else {
            return;
        };
        let pending: Shares = trade
            .working_orders()
            .filter(|o| o.role == OrderRole::Liquidation)
            .map(|o| o.remaining_quantity())
            .sum();
        let quantity = trade.open_quantity().saturating_sub(pending);
        if quantity == 0 {
            return;
        }
        let exit = trade.direction.exit_action();

        let id = self.next_order_id();
        let order = TradeOrder::market(
            id.clone(),
            self.tradestrategy.instrument_id.clone(),
            exit,
            OrderRole::Liquidation,
            quantity,
            now,
        );
        if let Some(trade) = self.trade.as_mut()
            && let Err(e) = trade
                .add_order(order.clone())
                .and_then(|_| trade.mark_submitted(&id, now))
        {
            warn!("[Rule {}] liquidation order not recorded: {}", self.label, e);
            return;
        }
        info!(
            "[Rule {}] liquidating {} {} at market",
            self.label,
            exit.as_str(),
            quantity
        );
        actions.push(Action::submit_order(order));
    }

    fn terminate(
        &mut self,
        status: Option<TradestrategyStatus>,
        now: Timestamp,
        actions: &mut Vec<Action>,
    ) {
        self.state = RuleState::Terminating;
        if let Some(status) = status {
            self.set_status(status, actions);
        }
        self.cancel_working(actions);
        self.liquidate(now, actions);
        self.state = RuleState::Done;
        info!("[Rule {}] done ({})", self.label, self.tradestrategy.status);
    }

    fn end_of_day(&mut self, now: Timestamp, actions: &mut Vec<Action>) {
        let status = match self.state {
            RuleState::WaitingForSignal => Some(TradestrategyStatus::Cancelled),
            RuleState::OrderSubmitted => Some(TradestrategyStatus::Unfilled),
            _ => None,
        };
        info!("[Rule {}] close-position time reached in {}", self.label, self.state);
        self.terminate(status, now, actions);
    }

    // ── Broker events ────────────────────────────────────────────────

    fn on_fill(&mut self, order: &TradeOrder, now: Timestamp, actions: &mut Vec<Action>) -> Result<()> {
        if order.role == OrderRole::Entry {
            return match self.state {
                RuleState::OrderSubmitted | RuleState::PositionOpenUncovered => {
                    self.set_status(TradestrategyStatus::Open, actions);
                    self.state = RuleState::PositionOpenUncovered;
                    self.cover(now, actions)
                }
                RuleState::PositionCovered => self.cover(now, actions),
                _ => {
                    warn!(
                        "[Rule {}] entry filled after termination; flattening",
                        self.label
                    );
                    self.liquidate(now, actions);
                    Ok(())
                }
            };
        }

        let Some(trade) = &self.trade else {
            return Ok(());
        };
        if trade.is_closed() {
            self.set_status(TradestrategyStatus::Closed, actions);
            if self.state != RuleState::Done {
                self.terminate(None, now, actions);
            }
            return Ok(());
        }

        // A leg done while shares remain: its OCA partner must go
        let filled = trade.order(&order.id).is_some_and(|o| o.is_filled());
        if filled && order.role != OrderRole::Liquidation && self.state != RuleState::Done {
            let siblings: Vec<OrderId> = trade.siblings(&order.id).iter().map(|o| o.id.clone()).collect();
            for id in siblings {
                if self.pending_cancels.insert(id.clone()) {
                    actions.push(Action::cancel(id));
                }
            }
        }
        Ok(())
    }

    fn on_cancelled(&mut self, order: &TradeOrder, now: Timestamp, actions: &mut Vec<Action>) -> Result<()> {
        match (order.role, self.state) {
            (OrderRole::Entry, RuleState::OrderSubmitted) => {
                info!("[Rule {}] entry cancelled by broker", self.label);
                self.terminate(Some(TradestrategyStatus::Cancelled), now, actions);
                Ok(())
            }
            (OrderRole::Stop, RuleState::PositionCovered) => {
                let exposed = self
                    .trade
                    .as_ref()
                    .is_some_and(|t| t.covered_quantity() < t.open_quantity());
                if exposed {
                    warn!("[Rule {}] stop {} cancelled, re-covering", self.label, order.id);
                    self.state = RuleState::PositionOpenUncovered;
                    self.cover(now, actions)?;
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn on_rejected(
        &mut self,
        order: &TradeOrder,
        reason: &str,
        now: Timestamp,
        actions: &mut Vec<Action>,
    ) -> Result<()> {
        match order.role {
            OrderRole::Entry if self.state == RuleState::OrderSubmitted => {
                warn!("[Rule {}] entry rejected: {}", self.label, reason);
                self.terminate(
                    Some(TradestrategyStatus::Rejected(RejectReason::BrokerRejected)),
                    now,
                    actions,
                );
                Ok(())
            }
            OrderRole::Stop | OrderRole::Target => {
                let open = self.trade.as_ref().is_some_and(|t| t.is_open());
                if open && self.state != RuleState::Done {
                    warn!(
                        "[Rule {}] bracket leg {} rejected: {}; liquidating",
                        self.label, order.id, reason
                    );
                    self.terminate(None, now, actions);
                }
                Ok(())
            }
            OrderRole::Liquidation => Err(StrategyRuleError::new(
                codes::LIQUIDATION,
                1,
                format!("liquidation {} rejected: {}", order.id, reason),
            )
            .into()),
            OrderRole::Entry => Ok(()),
        }
    }
}

impl StrategyRule for BreakoutRule {
    fn name(&self) -> &str {
        &self.label
    }

    fn tradestrategy(&self) -> &Tradestrategy {
        &self.tradestrategy
    }

    fn state(&self) -> RuleState {
        self.state
    }

    fn trade(&self) -> Option<&Trade> {
        self.trade.as_ref()
    }

    fn on_bar(
        &mut self,
        ctx: &RuleContext,
        series: &CandleSeries,
        is_new_bar: bool,
    ) -> Result<Vec<Action>> {
        if self.state == RuleState::Done || series.instrument_id != self.tradestrategy.instrument_id {
            return Ok(Vec::new());
        }
        let Some(live) = series.last() else {
            return Ok(Vec::new());
        };
        let now = live.start();
        let calendar = &ctx.calendar;
        if calendar.exchange_date(now) != self.tradestrategy.trading_day {
            debug!("[Rule {}] ignoring bar at {}", self.label, now);
            return Ok(Vec::new());
        }

        // Close-position time is checked ahead of the session filter, so a
        // bar at or after the bell still flattens
        let schedule = self.schedule(ctx)?;
        let close = reached(live, schedule.close_position);
        if !close && !calendar.is_market_hours(now) {
            debug!("[Rule {}] ignoring bar at {}", self.label, now);
            return Ok(Vec::new());
        }

        let mut actions = Vec::new();
        if self.tradestrategy.status == TradestrategyStatus::Scheduled {
            self.set_status(TradestrategyStatus::Waiting, &mut actions);
        }

        if close {
            self.end_of_day(now, &mut actions);
            return Ok(actions);
        }

        let primary = series.bar_size_minutes == self.tradestrategy.bar_size_minutes;
        match self.state {
            RuleState::WaitingForSignal if primary => {
                self.await_signal(ctx, series, live, &schedule, &mut actions)?;
            }
            RuleState::OrderSubmitted if primary => {
                self.watch_entry(live, now, &schedule, &mut actions);
            }
            RuleState::PositionOpenUncovered => {
                self.cancel_stale_entry(live, &schedule, &mut actions);
                self.cover(now, &mut actions)?;
            }
            RuleState::PositionCovered => {
                self.cancel_stale_entry(live, &schedule, &mut actions);
                if is_new_bar {
                    self.trail(series, live, now, &schedule, &mut actions)?;
                }
            }
            _ => {}
        }
        Ok(actions)
    }

    fn on_order_event(&mut self, _ctx: &RuleContext, event: &BrokerEvent) -> Result<Vec<Action>> {
        let order_id = event.order_id();
        let Some(order) = self.trade.as_ref().and_then(|t| t.order(order_id)).cloned() else {
            debug!("[Rule {}] ignoring event for unknown order {}", self.label, order_id);
            return Ok(Vec::new());
        };
        let now = event.timestamp();
        let mut actions = Vec::new();

        match event {
            BrokerEvent::Fill {
                quantity, price, ..
            }
            | BrokerEvent::PartialFill {
                quantity, price, ..
            } => {
                if let Some(trade) = self.trade.as_mut() {
                    trade.apply_fill(order_id, *quantity, *price, now)?;
                }
                debug!(
                    "[Rule {}] {} filled {} @ {}",
                    self.label, order_id, quantity, price
                );
                self.on_fill(&order, now, &mut actions)?;
            }
            BrokerEvent::Cancelled { .. } => {
                self.pending_cancels.remove(order_id);
                if order.status.is_terminal() {
                    debug!("[Rule {}] {} already {}", self.label, order_id, order.status);
                    return Ok(actions);
                }
                if let Some(trade) = self.trade.as_mut() {
                    trade.apply_cancel(order_id, now)?;
                }
                self.on_cancelled(&order, now, &mut actions)?;
            }
            BrokerEvent::Rejected { reason, .. } => {
                self.pending_cancels.remove(order_id);
                if order.status.is_terminal() {
                    debug!("[Rule {}] {} already {}", self.label, order_id, order.status);
                    return Ok(actions);
                }
                if let Some(trade) = self.trade.as_mut() {
                    trade.apply_reject(order_id, now)?;
                }
                self.on_rejected(&order, reason, now, &mut actions)?;
            }
        }
        Ok(actions)
    }

    fn request_cancel(&mut self, now: Timestamp) -> Result<Vec<Action>> {
        self.cancel_requested = true;
        let mut actions = Vec::new();
        if self.state == RuleState::Done {
            return Ok(actions);
        }
        let status = match self.state {
            RuleState::WaitingForSignal | RuleState::OrderSubmitted => {
                Some(TradestrategyStatus::Cancelled)
            }
            _ => None,
        };
        info!("[Rule {}] cancel requested in {}", self.label, self.state);
        self.terminate(status, now, &mut actions);
        Ok(actions)
    }
}
