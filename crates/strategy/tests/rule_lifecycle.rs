//! Integration test: BreakoutRule driven against the PaperBroker
//!
//! Each step feeds one bar to the rule's series, dispatches what the rule
//! asked for, lets the paper broker match the bar, and hands every broker
//! event back to the rule, the way a host would.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use meridian_calendar::TradingSessionCalendar;
use meridian_core::{
    CandleItem, CandlePeriod, CandleSeries, EntrylimitTable, InstrumentId, Money, OrderRole,
    OrderType, Price, Timestamp, Tradestrategy, TradestrategyStatus,
};
use meridian_gateway::{BrokerEvent, OrderCommand, PaperBroker, PaperBrokerConfig};
use meridian_strategy::{
    Action, BreakoutRule, RuleContext, RuleState, StrategyConfig, StrategyRule,
};
use rust_decimal_macros::dec;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

const LIMITS: &str = r#"[
    {"start_price": "0.01", "end_price": "10.00", "limit_amount": "0.01",
     "percent_of_price": "0.05", "share_round": "1"},
    {"start_price": "10.01", "end_price": "50.00", "limit_amount": "0.02",
     "percent_of_price": "0.02", "percent_of_margin": "0.25",
     "share_round": "100", "price_round": "0.02"}
]"#;

fn at(h: u32, m: u32) -> Timestamp {
    Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap()
}

struct Session {
    ctx: RuleContext,
    rule: BreakoutRule,
    series: CandleSeries,
    paper: PaperBroker,
    events: UnboundedReceiver<BrokerEvent>,
    statuses: Vec<TradestrategyStatus>,
    commands: Vec<OrderCommand>,
}

impl Session {
    fn new(broker: PaperBrokerConfig) -> Self {
        let _ = env_logger::try_init();
        let ts = Tradestrategy::new(
            "ts1",
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            "orb",
            Money::new(dec!(100)),
            5,
        );
        let (paper, events) = PaperBroker::new(broker);
        Self {
            ctx: RuleContext::new(
                Arc::new(TradingSessionCalendar::us_equities()),
                Arc::new(EntrylimitTable::from_json(LIMITS).unwrap()),
            ),
            rule: BreakoutRule::new(&StrategyConfig::default(), ts),
            series: CandleSeries::new("AAPL", 5),
            paper,
            events,
            statuses: Vec::new(),
            commands: Vec::new(),
        }
    }

    fn dispatch(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Broker(command) => {
                    // Orders already gone through OCA come back as unknown
                    if let Err(e) = command.clone().dispatch(&self.paper) {
                        log::warn!("[Test] {} failed: {}", command.kind(), e);
                    }
                    self.commands.push(command);
                }
                Action::UpdateStatus(status) => self.statuses.push(status),
            }
        }
    }

    fn bar(&mut self, h: u32, m: u32, o: Price, hi: Price, lo: Price, c: Price) {
        let bar = CandleItem::new(
            CandlePeriod::new(at(h, m), Duration::minutes(5)),
            o,
            hi,
            lo,
            c,
            10_000,
            c,
            100,
        );
        let is_new = self.series.push(bar.clone()).unwrap();
        let actions = self.rule.on_bar(&self.ctx, &self.series, is_new).unwrap();
        self.dispatch(actions);

        self.paper.on_bar(&InstrumentId::new("AAPL"), &bar);
        self.drain();
    }

    fn drain(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            let actions = self.rule.on_order_event(&self.ctx, &event).unwrap();
            self.dispatch(actions);
        }
    }

    fn amended(&self) -> Vec<(String, Price)> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                OrderCommand::AmendStopPrice { order_id, price } => Some((order_id.clone(), *price)),
                _ => None,
            })
            .collect()
    }

    /// Signal bar, the bar completing it, then the bar triggering the entry
    fn enter(&mut self) {
        self.bar(14, 30, dec!(21.20), dec!(21.50), dec!(21.15), dec!(21.40));
        self.bar(14, 35, dec!(21.45), dec!(21.48), dec!(21.38), dec!(21.40));
        self.bar(14, 40, dec!(21.49), dec!(21.60), dec!(21.47), dec!(21.58));
    }
}

#[test]
fn test_breakout_trails_and_exits_at_target() {
    let mut s = Session::new(PaperBrokerConfig::default());
    s.enter();

    assert_eq!(s.rule.state(), RuleState::PositionCovered);
    let trade = s.rule.trade().unwrap();
    assert_eq!(trade.open_quantity(), 300);
    assert_eq!(trade.average_entry_price(), Some(dec!(21.51)));
    let stop = s.paper.working_order("ts1-2").unwrap();
    assert_eq!(stop.stop_price, Some(dec!(21.18)));
    assert_eq!(stop.oca_group.as_deref(), Some("ts1-oca"));
    assert_eq!(s.paper.working_order("ts1-3").unwrap().limit_price, Some(dec!(22.18)));

    // Each completed bullish bar lifts the stop to its low
    s.bar(14, 45, dec!(21.58), dec!(21.70), dec!(21.52), dec!(21.68));
    s.bar(14, 50, dec!(21.68), dec!(22.25), dec!(21.66), dec!(22.20));
    assert_eq!(
        s.amended(),
        vec![
            ("ts1-2".to_string(), dec!(21.47)),
            ("ts1-2".to_string(), dec!(21.52)),
        ]
    );

    assert_eq!(
        s.statuses,
        vec![
            TradestrategyStatus::Waiting,
            TradestrategyStatus::EntrySubmitted,
            TradestrategyStatus::Open,
            TradestrategyStatus::Closed,
        ]
    );
    assert!(s.rule.is_done());
    assert_eq!(s.rule.status(), TradestrategyStatus::Closed);
    assert!(s.rule.trade().unwrap().is_closed());
    assert!(s.paper.working_orders().is_empty());
}

#[test]
fn test_breakout_stopped_out() {
    let mut s = Session::new(PaperBrokerConfig::default());
    s.enter();

    // Trail candidate 21.47 sits above the live price and is not sent
    s.bar(14, 45, dec!(21.50), dec!(21.52), dec!(21.10), dec!(21.15));
    assert!(s.amended().is_empty());

    assert_eq!(s.statuses.last(), Some(&TradestrategyStatus::Closed));
    let trade = s.rule.trade().unwrap();
    assert!(trade.is_closed());
    let stop = trade.order("ts1-2").unwrap();
    assert!(stop.is_filled());
    assert!(s.rule.is_done());
    assert!(s.paper.working_orders().is_empty());

    // Later bars change nothing
    let before = s.commands.len();
    s.bar(14, 50, dec!(21.15), dec!(21.30), dec!(21.00), dec!(21.20));
    assert_eq!(s.commands.len(), before);
}

#[test]
fn test_end_of_day_flattens_through_the_broker() {
    let mut s = Session::new(PaperBrokerConfig::default());
    s.enter();
    s.bar(15, 0, dec!(21.58), dec!(21.62), dec!(21.50), dec!(21.55));

    // 15:55 New York
    s.bar(20, 55, dec!(21.60), dec!(21.65), dec!(21.55), dec!(21.60));

    let liquidation = s
        .commands
        .iter()
        .find_map(|c| match c {
            OrderCommand::SubmitOrder(o) => Some(o.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(liquidation.role, OrderRole::Liquidation);
    assert_eq!(liquidation.order_type, OrderType::Market);
    assert_eq!(liquidation.quantity, 300);

    assert!(s.rule.is_done());
    assert_eq!(s.rule.status(), TradestrategyStatus::Closed);
    assert!(s.rule.trade().unwrap().is_closed());
    assert!(s.paper.working_orders().is_empty());
}

#[test]
fn test_partial_entry_fills_stay_covered() {
    let mut s = Session::new(PaperBrokerConfig {
        max_fill_per_bar: Some(100),
        ..Default::default()
    });
    s.enter();
    {
        let trade = s.rule.trade().unwrap();
        assert_eq!(trade.open_quantity(), 100);
        assert_eq!(trade.covered_quantity(), 100);
    }
    assert_eq!(s.statuses.last(), Some(&TradestrategyStatus::Open));

    // The triggered entry keeps filling at its limit
    s.bar(14, 45, dec!(21.55), dec!(21.62), dec!(21.50), dec!(21.60));
    s.bar(14, 50, dec!(21.60), dec!(21.66), dec!(21.52), dec!(21.64));

    let trade = s.rule.trade().unwrap();
    assert_eq!(trade.open_quantity(), 300);
    assert_eq!(trade.covered_quantity(), 300);
    assert_eq!(s.rule.state(), RuleState::PositionCovered);
    let working = s.paper.working_orders();
    assert_eq!(working.len(), 6);
    assert_eq!(
        working.iter().filter(|o| o.role == OrderRole::Stop).map(|o| o.quantity).sum::<u32>(),
        300
    );

    // A flush through every stop closes the trade
    s.bar(14, 55, dec!(21.60), dec!(21.62), dec!(21.00), dec!(21.05));
    assert_eq!(s.rule.status(), TradestrategyStatus::Closed);
    assert!(s.rule.trade().unwrap().is_closed());
    assert!(s.paper.working_orders().is_empty());
}
