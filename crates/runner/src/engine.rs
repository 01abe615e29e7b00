//! Strategy engine
//!
//! Owns the rule instances of a set of instruments and is the only place
//! their actions leave the rules:
//! - bars are routed by instrument, broker events by order id
//! - broker actions go to the [`BrokerGateway`], status actions to the store
//! - a failing step is logged, reported as a [`RuleFault`] and recorded as
//!   `Error`; it never takes the engine down
//!
//! The engine is not shared: a host drives one engine from one task, in
//! arrival order. [`EngineHandle`](crate::EngineHandle) runs one engine per
//! instrument.

use chrono::Utc;
use dashmap::DashMap;
use log::{debug, error, info, warn};
use meridian_core::{
    CandleSeries, ConfigurationError, InstrumentId, OrderId, Timestamp, Trade, Tradestrategy,
    TradestrategyStatus,
};
use meridian_gateway::{BrokerEvent, BrokerGateway};
use meridian_ports::TradestrategyStore;
use meridian_strategy::{Action, RuleContext, RuleError, RuleState, StrategyConfig, StrategyRule, build_rule};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::error::{Result, RunnerError};
use crate::fault::RuleFault;

/// Order id to owning tradestrategy id, shared by every engine of a host
pub type OrderRoutes = Arc<DashMap<OrderId, String>>;

pub type Strategies = Arc<HashMap<String, StrategyConfig>>;

/// A rule and the context it was built under
struct Slot {
    rule: Box<dyn StrategyRule>,
    ctx: RuleContext,
}

/// Where the engine's output goes
#[derive(Clone)]
struct Outlets {
    gateway: Arc<dyn BrokerGateway>,
    store: Arc<dyn TradestrategyStore>,
    routes: OrderRoutes,
    faults: mpsc::UnboundedSender<RuleFault>,
}

impl Outlets {
    async fn dispatch(&self, tradestrategy_id: &str, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Broker(command) => {
                    // Route first: a broker may answer before dispatch returns
                    for order_id in command.placed_ids() {
                        self.routes
                            .insert(order_id.to_string(), tradestrategy_id.to_string());
                    }
                    let kind = command.kind();
                    if let Err(e) = command.dispatch(self.gateway.as_ref()) {
                        warn!("[Engine] {} {} failed: {}", tradestrategy_id, kind, e);
                    }
                }
                Action::UpdateStatus(status) => self.record(tradestrategy_id, status).await,
            }
        }
    }

    async fn record(&self, tradestrategy_id: &str, status: TradestrategyStatus) {
        if let Err(e) = self.store.record_status(tradestrategy_id, status).await {
            warn!("[Engine] {} status {} not recorded: {}", tradestrategy_id, status, e);
        }
    }

    async fn save(&self, trade: &Trade) {
        if let Err(e) = self.store.save_trade(trade).await {
            warn!("[Engine] trade of {} not saved: {}", trade.tradestrategy_id, e);
        }
    }

    async fn fault(&self, fault: RuleFault) {
        error!(
            "[Engine] {} fault {}.{}: {}",
            fault.rule, fault.code, fault.sub_code, fault.message
        );
        let id = fault.tradestrategy_id.clone();
        if self.faults.send(fault).is_err() {
            debug!("[Engine] no fault listener");
        }
        self.record(&id, TradestrategyStatus::Error).await;
    }
}

pub struct StrategyEngine {
    ctx: RuleContext,
    strategies: Strategies,
    slots: HashMap<String, Slot>,
    by_instrument: HashMap<InstrumentId, Vec<String>>,
    outlets: Outlets,
}

impl StrategyEngine {
    /// A new engine and the receiving end of its fault channel
    pub fn new(
        ctx: RuleContext,
        strategies: Strategies,
        gateway: Arc<dyn BrokerGateway>,
        store: Arc<dyn TradestrategyStore>,
    ) -> (Self, mpsc::UnboundedReceiver<RuleFault>) {
        let (faults, rx) = mpsc::unbounded_channel();
        let engine = Self::with_outlets(
            ctx,
            strategies,
            gateway,
            store,
            faults,
            Arc::new(DashMap::new()),
        );
        (engine, rx)
    }

    pub(crate) fn with_outlets(
        ctx: RuleContext,
        strategies: Strategies,
        gateway: Arc<dyn BrokerGateway>,
        store: Arc<dyn TradestrategyStore>,
        faults: mpsc::UnboundedSender<RuleFault>,
        routes: OrderRoutes,
    ) -> Self {
        Self {
            ctx,
            strategies,
            slots: HashMap::new(),
            by_instrument: HashMap::new(),
            outlets: Outlets {
                gateway,
                store,
                routes,
                faults,
            },
        }
    }

    /// Validate `config` and schedule every tradestrategy it lists
    pub async fn from_config(
        config: &EngineConfig,
        gateway: Arc<dyn BrokerGateway>,
        store: Arc<dyn TradestrategyStore>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<RuleFault>)> {
        config.validate()?;
        let (mut engine, faults) =
            Self::new(config.rule_context()?, config.strategy_map(), gateway, store);
        for ts in &config.tradestrategies {
            engine.add_tradestrategy(ts.clone()).await?;
        }
        Ok((engine, faults))
    }

    /// Build the configured rule for `tradestrategy` and schedule it
    pub async fn add_tradestrategy(&mut self, tradestrategy: Tradestrategy) -> Result<()> {
        let Some(config) = self.strategies.get(&tradestrategy.strategy) else {
            return Err(RunnerError::UnknownStrategy {
                tradestrategy_id: tradestrategy.id,
                strategy: tradestrategy.strategy,
            });
        };
        if !self.ctx.calendar.is_trading_day(tradestrategy.trading_day) {
            return Err(ConfigurationError::InvalidTradestrategy(format!(
                "{}: {} is not a trading day",
                tradestrategy.id, tradestrategy.trading_day
            ))
            .into());
        }
        if self.slots.contains_key(&tradestrategy.id) {
            return Err(RunnerError::DuplicateTradestrategy(tradestrategy.id));
        }
        config.validate_session(self.ctx.calendar.market_open(), self.ctx.calendar.market_close())?;
        let rule = build_rule(config, tradestrategy)?;
        self.add_rule(rule).await
    }

    /// Schedule an already built rule
    pub async fn add_rule(&mut self, rule: Box<dyn StrategyRule>) -> Result<()> {
        let id = rule.tradestrategy().id.clone();
        if self.slots.contains_key(&id) {
            return Err(RunnerError::DuplicateTradestrategy(id));
        }
        let instrument = rule.tradestrategy().instrument_id.clone();
        let status = rule.status();
        info!("[Engine] {} scheduled on {}", rule.name(), instrument);

        self.outlets.store.record_status(&id, status).await?;
        self.slots.insert(
            id.clone(),
            Slot {
                rule,
                ctx: self.ctx.clone(),
            },
        );
        self.by_instrument.entry(instrument).or_default().push(id);
        Ok(())
    }

    /// Deliver a bar update to every running rule of the series' instrument
    pub async fn on_bar(&mut self, series: &CandleSeries, is_new_bar: bool) {
        let Some(ids) = self.by_instrument.get(&series.instrument_id).cloned() else {
            return;
        };
        let now = series.last().map(|b| b.start()).unwrap_or_else(Utc::now);
        for id in ids {
            let step = match self.slots.get_mut(&id) {
                Some(slot) if !slot.rule.is_done() => {
                    slot.rule.on_bar(&slot.ctx, series, is_new_bar)
                }
                _ => continue,
            };
            self.settle(&id, step, now).await;
        }
    }

    /// Deliver a broker notification to the rule that placed the order
    pub async fn on_order_event(&mut self, event: &BrokerEvent) {
        let Some(id) = self.route(event.order_id()) else {
            debug!("[Engine] no rule owns order {}", event.order_id());
            return;
        };
        let step = match self.slots.get_mut(&id) {
            Some(slot) => slot.rule.on_order_event(&slot.ctx, event),
            None => return,
        };
        self.settle(&id, step, event.timestamp()).await;
    }

    /// Ask one rule to stop trading
    pub async fn cancel(&mut self, tradestrategy_id: &str, now: Timestamp) -> Result<()> {
        let step = match self.slots.get_mut(tradestrategy_id) {
            Some(slot) => slot.rule.request_cancel(now),
            None => {
                return Err(RunnerError::UnknownTradestrategy(
                    tradestrategy_id.to_string(),
                ));
            }
        };
        self.settle(tradestrategy_id, step, now).await;
        Ok(())
    }

    pub async fn cancel_all(&mut self, now: Timestamp) {
        let ids: Vec<String> = self
            .slots
            .iter()
            .filter(|(_, s)| !s.rule.is_done())
            .map(|(id, _)| id.clone())
            .collect();
        for id in ids {
            if let Err(e) = self.cancel(&id, now).await {
                warn!("[Engine] cancel of {} failed: {}", id, e);
            }
        }
    }

    /// Swap calendar, entry limits and strategies for rules added from now on;
    /// running rules keep what they were built with
    pub fn reload(&mut self, ctx: RuleContext, strategies: Strategies) {
        info!(
            "[Engine] configuration reloaded ({} strategies)",
            strategies.len()
        );
        self.ctx = ctx;
        self.strategies = strategies;
    }

    fn route(&self, order_id: &str) -> Option<String> {
        let routed = self.outlets.routes.get(order_id).map(|r| r.value().clone());
        if let Some(id) = routed
            && self.slots.contains_key(&id)
        {
            return Some(id);
        }
        self.slots
            .iter()
            .find(|(_, s)| s.rule.owns_order(order_id))
            .map(|(id, _)| id.clone())
    }

    async fn settle(
        &mut self,
        tradestrategy_id: &str,
        step: std::result::Result<Vec<Action>, RuleError>,
        now: Timestamp,
    ) {
        match step {
            Ok(actions) => self.outlets.dispatch(tradestrategy_id, actions).await,
            Err(e) => {
                let name = self
                    .slots
                    .get(tradestrategy_id)
                    .map(|s| s.rule.name().to_string())
                    .unwrap_or_else(|| tradestrategy_id.to_string());
                let fault = RuleFault::new(tradestrategy_id, &name, &e, now);
                self.outlets.fault(fault).await;
            }
        }

        let trade = self
            .slots
            .get(tradestrategy_id)
            .and_then(|s| s.rule.trade().cloned());
        if let Some(trade) = trade {
            self.outlets.save(&trade).await;
        }
    }

    // ── Inspection ───────────────────────────────────────────────────

    pub fn context(&self) -> &RuleContext {
        &self.ctx
    }

    pub fn routes(&self) -> OrderRoutes {
        self.outlets.routes.clone()
    }

    pub fn status(&self, tradestrategy_id: &str) -> Option<TradestrategyStatus> {
        self.slots.get(tradestrategy_id).map(|s| s.rule.status())
    }

    pub fn state(&self, tradestrategy_id: &str) -> Option<RuleState> {
        self.slots.get(tradestrategy_id).map(|s| s.rule.state())
    }

    pub fn trade(&self, tradestrategy_id: &str) -> Option<&Trade> {
        self.slots.get(tradestrategy_id).and_then(|s| s.rule.trade())
    }

    pub fn tradestrategy_ids(&self) -> Vec<String> {
        self.slots.keys().cloned().collect()
    }

    /// Rules not yet done
    pub fn active_count(&self) -> usize {
        self.slots.values().filter(|s| !s.rule.is_done()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use chrono::{Duration, NaiveDate, TimeZone};
    use meridian_calendar::TradingSessionCalendar;
    use meridian_core::{CandleItem, CandlePeriod, EntrylimitTable, Money, Price};
    use meridian_gateway::{PaperBroker, PaperBrokerConfig};
    use meridian_strategy::{StrategyRuleError, codes};
    use rust_decimal_macros::dec;

    fn ctx() -> RuleContext {
        RuleContext::new(
            Arc::new(TradingSessionCalendar::us_equities()),
            Arc::new(
                EntrylimitTable::from_json(
                    r#"[{"start_price": "10.01", "end_price": "50.00", "limit_amount": "0.02",
                         "percent_of_price": "0.02", "share_round": "100", "price_round": "0.02"}]"#,
                )
                .unwrap(),
            ),
        )
    }

    fn strategies() -> Strategies {
        Arc::new(HashMap::from([(
            "orb".to_string(),
            StrategyConfig::default(),
        )]))
    }

    fn tradestrategy(id: &str, instrument: &str) -> Tradestrategy {
        Tradestrategy::new(
            id,
            instrument,
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            "orb",
            Money::new(dec!(100)),
            5,
        )
    }

    fn bar(h: u32, m: u32, o: Price, hi: Price, lo: Price, c: Price) -> CandleItem {
        CandleItem::new(
            CandlePeriod::new(
                Utc.with_ymd_and_hms(2024, 3, 4, h, m, 0).unwrap(),
                Duration::minutes(5),
            ),
            o,
            hi,
            lo,
            c,
            10_000,
            c,
            100,
        )
    }

    fn engine() -> (
        StrategyEngine,
        mpsc::UnboundedReceiver<RuleFault>,
        Arc<PaperBroker>,
        Arc<InMemoryStore>,
    ) {
        let _ = env_logger::try_init();
        let (paper, _events) = PaperBroker::new(PaperBrokerConfig::default());
        let paper = Arc::new(paper);
        let store = Arc::new(InMemoryStore::new());
        let (engine, faults) = StrategyEngine::new(ctx(), strategies(), paper.clone(), store.clone());
        (engine, faults, paper, store)
    }

    /// Fails every bar
    struct FaultyRule {
        ts: Tradestrategy,
    }

    impl StrategyRule for FaultyRule {
        fn name(&self) -> &str {
            "FAULTY"
        }

        fn tradestrategy(&self) -> &Tradestrategy {
            &self.ts
        }

        fn state(&self) -> RuleState {
            RuleState::WaitingForSignal
        }

        fn trade(&self) -> Option<&Trade> {
            None
        }

        fn on_bar(
            &mut self,
            _ctx: &RuleContext,
            _series: &CandleSeries,
            _is_new_bar: bool,
        ) -> meridian_strategy::Result<Vec<Action>> {
            Err(StrategyRuleError::new(codes::SIZING, 2, "quantity overflow").into())
        }

        fn on_order_event(
            &mut self,
            _ctx: &RuleContext,
            _event: &BrokerEvent,
        ) -> meridian_strategy::Result<Vec<Action>> {
            Ok(Vec::new())
        }

        fn request_cancel(&mut self, _now: Timestamp) -> meridian_strategy::Result<Vec<Action>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_add_tradestrategy() {
        let (mut engine, _faults, _paper, store) = engine();
        engine.add_tradestrategy(tradestrategy("ts1", "AAPL")).await.unwrap();

        assert_eq!(engine.status("ts1"), Some(TradestrategyStatus::Scheduled));
        assert_eq!(engine.state("ts1"), Some(RuleState::WaitingForSignal));
        assert_eq!(engine.active_count(), 1);
        assert_eq!(
            store.status("ts1").await.unwrap(),
            Some(TradestrategyStatus::Scheduled)
        );

        assert!(matches!(
            engine.add_tradestrategy(tradestrategy("ts1", "AAPL")).await,
            Err(RunnerError::DuplicateTradestrategy(_))
        ));

        let mut unknown = tradestrategy("ts2", "MSFT");
        unknown.strategy = "martingale".to_string();
        assert!(matches!(
            engine.add_tradestrategy(unknown).await,
            Err(RunnerError::UnknownStrategy { .. })
        ));

        let mut coarse = tradestrategy("ts4", "MSFT");
        coarse.bar_size_minutes = 15;
        assert!(matches!(
            engine.add_tradestrategy(coarse).await,
            Err(RunnerError::Configuration(_))
        ));

        let mut weekend = tradestrategy("ts3", "MSFT");
        weekend.trading_day = NaiveDate::from_ymd_opt(2024, 3, 3).unwrap();
        assert!(matches!(
            engine.add_tradestrategy(weekend).await,
            Err(RunnerError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_bars_reach_only_their_instrument() {
        let (mut engine, _faults, paper, store) = engine();
        engine.add_tradestrategy(tradestrategy("ts1", "AAPL")).await.unwrap();
        engine.add_tradestrategy(tradestrategy("ts2", "MSFT")).await.unwrap();

        let mut series = CandleSeries::new("AAPL", 5);
        for b in [
            bar(14, 30, dec!(21.20), dec!(21.50), dec!(21.15), dec!(21.40)),
            bar(14, 35, dec!(21.45), dec!(21.48), dec!(21.38), dec!(21.40)),
        ] {
            let is_new = series.push(b).unwrap();
            engine.on_bar(&series, is_new).await;
        }

        assert_eq!(engine.status("ts1"), Some(TradestrategyStatus::EntrySubmitted));
        assert_eq!(engine.status("ts2"), Some(TradestrategyStatus::Scheduled));
        assert_eq!(
            store.history("ts1"),
            vec![
                TradestrategyStatus::Scheduled,
                TradestrategyStatus::Waiting,
                TradestrategyStatus::EntrySubmitted
            ]
        );

        // Entry placed at the broker and routed back to ts1
        assert!(paper.working_order("ts1-1").is_some());
        assert_eq!(engine.routes().get("ts1-1").unwrap().value(), "ts1");
        assert!(store.load_trade("ts1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_fault_is_reported_and_recorded() {
        let (mut engine, mut faults, _paper, store) = engine();
        engine
            .add_rule(Box::new(FaultyRule {
                ts: tradestrategy("ts9", "AAPL"),
            }))
            .await
            .unwrap();

        let mut series = CandleSeries::new("AAPL", 5);
        series
            .push(bar(14, 30, dec!(21.20), dec!(21.50), dec!(21.15), dec!(21.40)))
            .unwrap();
        engine.on_bar(&series, true).await;

        let fault = faults.try_recv().unwrap();
        assert_eq!(fault.tradestrategy_id, "ts9");
        assert_eq!(fault.rule, "FAULTY");
        assert_eq!((fault.code, fault.sub_code), (codes::SIZING, 2));
        assert_eq!(
            store.status("ts9").await.unwrap(),
            Some(TradestrategyStatus::Error)
        );

        // The engine keeps going
        engine.on_bar(&series, false).await;
        assert!(faults.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_cancel() {
        let (mut engine, _faults, _paper, store) = engine();
        engine.add_tradestrategy(tradestrategy("ts1", "AAPL")).await.unwrap();

        let now = Utc.with_ymd_and_hms(2024, 3, 4, 14, 32, 0).unwrap();
        engine.cancel("ts1", now).await.unwrap();
        assert_eq!(engine.state("ts1"), Some(RuleState::Done));
        assert_eq!(engine.active_count(), 0);
        assert_eq!(
            store.status("ts1").await.unwrap(),
            Some(TradestrategyStatus::Cancelled)
        );

        assert!(matches!(
            engine.cancel("nope", now).await,
            Err(RunnerError::UnknownTradestrategy(_))
        ));
    }

    #[tokio::test]
    async fn test_reload_applies_to_new_rules_only() {
        let (mut engine, _faults, _paper, _store) = engine();
        engine.add_tradestrategy(tradestrategy("ts1", "AAPL")).await.unwrap();

        let mut ha = StrategyConfig {
            name: "ha".to_string(),
            ..Default::default()
        };
        ha.kind = meridian_strategy::RuleKind::HeikinAshiTrail;
        engine.reload(ctx(), Arc::new(HashMap::from([("ha".to_string(), ha)])));

        // "orb" is gone for new rules
        assert!(engine.add_tradestrategy(tradestrategy("ts2", "MSFT")).await.is_err());
        let mut ts3 = tradestrategy("ts3", "MSFT");
        ts3.strategy = "ha".to_string();
        engine.add_tradestrategy(ts3).await.unwrap();

        let mut ids = engine.tradestrategy_ids();
        ids.sort();
        assert_eq!(ids, vec!["ts1", "ts3"]);
    }
}
