//! Engine configuration: calendar, entry limits, strategies and the day's
//! tradestrategies in one JSON document

use meridian_calendar::{CalendarConfig, TradingSessionCalendar};
use meridian_core::{ConfigurationError, EntrylimitTable, Tradestrategy};
use meridian_strategy::{RuleContext, StrategyConfig, validate_tradestrategy};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

/// ```json
/// {
///   "calendar": { "timezone": "America/New_York" },
///   "entry_limits": [ { "start_price": "10.01", "end_price": "50.00", ... } ],
///   "strategies": [ { "name": "orb" } ],
///   "tradestrategies": [ { "id": "ts1", "instrument_id": "AAPL", ... } ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub calendar: CalendarConfig,
    pub entry_limits: EntrylimitTable,
    pub strategies: Vec<StrategyConfig>,
    pub tradestrategies: Vec<Tradestrategy>,
    /// Capacity of each instrument worker's inbox
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            calendar: CalendarConfig::default(),
            entry_limits: EntrylimitTable::default(),
            strategies: vec![StrategyConfig::default()],
            tradestrategies: Vec::new(),
            channel_capacity: 1024,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigurationError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        serde_json::from_str(json).map_err(|e| ConfigurationError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let calendar = TradingSessionCalendar::new(&self.calendar)?;

        if self.channel_capacity == 0 {
            return Err(ConfigurationError::InvalidStrategy(
                "channel_capacity must be positive".to_string(),
            ));
        }

        let mut names = HashMap::new();
        for strategy in &self.strategies {
            strategy.validate()?;
            strategy.validate_session(calendar.market_open(), calendar.market_close())?;
            if names.insert(strategy.name.as_str(), strategy).is_some() {
                return Err(ConfigurationError::InvalidStrategy(format!(
                    "duplicate strategy name '{}'",
                    strategy.name
                )));
            }
        }

        let mut ids = HashSet::new();
        for ts in &self.tradestrategies {
            validate_tradestrategy(ts)?;
            let invalid = |msg: String| {
                Err(ConfigurationError::InvalidTradestrategy(format!(
                    "{}: {msg}",
                    ts.id
                )))
            };
            if !ids.insert(ts.id.as_str()) {
                return invalid("duplicate id".to_string());
            }
            let Some(strategy) = names.get(ts.strategy.as_str()) else {
                return invalid(format!("unknown strategy '{}'", ts.strategy));
            };
            strategy.validate_bar_size(ts)?;
            if !calendar.is_trading_day(ts.trading_day) {
                return invalid(format!("{} is not a trading day", ts.trading_day));
            }
        }
        Ok(())
    }

    /// Shared read-only context for the rules built from this configuration
    pub fn rule_context(&self) -> Result<RuleContext, ConfigurationError> {
        Ok(RuleContext::new(
            Arc::new(TradingSessionCalendar::new(&self.calendar)?),
            Arc::new(self.entry_limits.clone()),
        ))
    }

    /// Strategies keyed by name
    pub fn strategy_map(&self) -> Arc<HashMap<String, StrategyConfig>> {
        Arc::new(
            self.strategies
                .iter()
                .map(|s| (s.name.clone(), s.clone()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "calendar": {
            "timezone": "America/New_York",
            "holidays": { "2024": [1, 15] }
        },
        "entry_limits": [
            {"start_price": "10.01", "end_price": "50.00", "limit_amount": "0.02",
             "percent_of_price": "0.02", "share_round": "100", "price_round": "0.02"}
        ],
        "strategies": [
            { "name": "orb" },
            { "name": "ha", "kind": "HeikinAshiTrail", "break_even_time": "11:00:00" }
        ],
        "tradestrategies": [
            { "id": "ts1", "instrument_id": "AAPL", "trading_day": "2024-03-04",
              "strategy": "orb", "risk_amount": "100", "bar_size_minutes": 5 },
            { "id": "ts2", "instrument_id": "MSFT", "trading_day": "2024-03-04",
              "strategy": "ha", "direction": "Long", "risk_amount": "250.00",
              "bar_size_minutes": 5 }
        ]
    }"#;

    #[test]
    fn test_parse_and_validate() {
        let config = EngineConfig::from_json(CONFIG).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.tradestrategies.len(), 2);
        assert_eq!(config.channel_capacity, 1024);
        assert_eq!(config.entry_limits.rows().len(), 1);

        let strategies = config.strategy_map();
        assert_eq!(strategies.len(), 2);
        assert!(strategies.contains_key("ha"));

        let ctx = config.rule_context().unwrap();
        assert!(ctx.entry_limits.for_price(rust_decimal_macros::dec!(21.40)).is_some());
    }

    #[test]
    fn test_rejects_unknown_strategy() {
        let mut config = EngineConfig::from_json(CONFIG).unwrap();
        config.tradestrategies[1].strategy = "martingale".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidTradestrategy(msg)) if msg.contains("martingale")
        ));
    }

    #[test]
    fn test_rejects_duplicates_and_closed_days() {
        let mut config = EngineConfig::from_json(CONFIG).unwrap();
        config.tradestrategies[1].id = "ts1".to_string();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::from_json(CONFIG).unwrap();
        config.strategies.push(StrategyConfig::default());
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidStrategy(_))
        ));

        // Saturday
        let mut config = EngineConfig::from_json(CONFIG).unwrap();
        config.tradestrategies[0].trading_day = chrono::NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_times_the_session_never_reaches() {
        let mut config = EngineConfig::from_json(CONFIG).unwrap();
        config.strategies[0].close_position_time = chrono::NaiveTime::from_hms_opt(16, 0, 0).unwrap();
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidStrategy(msg)) if msg.contains("close-position")
        ));

        // An earlier close moves the bell in front of the strategy's cutoff
        let mut config = EngineConfig::from_json(CONFIG).unwrap();
        config.calendar.market_close = chrono::NaiveTime::from_hms_opt(13, 0, 0).unwrap();
        assert!(config.validate().is_err());

        let mut config = EngineConfig::from_json(CONFIG).unwrap();
        config.strategies[1].break_even_time = chrono::NaiveTime::from_hms_opt(9, 0, 0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bar_size_the_signal_cannot_use() {
        let mut config = EngineConfig::from_json(CONFIG).unwrap();
        config.tradestrategies[0].bar_size_minutes = 10;
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidTradestrategy(msg)) if msg.contains("ts1")
        ));

        config.strategies[0].signal.trigger_offset_minutes = 10;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_bad_input() {
        assert!(matches!(
            EngineConfig::from_json("{ not json"),
            Err(ConfigurationError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_file("/nonexistent/engine.json"),
            Err(ConfigurationError::Io { .. })
        ));
    }
}
