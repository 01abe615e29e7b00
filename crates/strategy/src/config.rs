//! Strategy configuration and rule construction

use chrono::{Duration, NaiveTime};
use meridian_core::{ConfigurationError, Tradestrategy};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::breakout::BreakoutRule;
use crate::policy::{BracketPolicy, EntrySignalPolicy, TrailMode, TrailingPolicy};
use crate::rule::StrategyRule;

/// Rule family selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RuleKind {
    /// Five-minute breakout with a structural bar trail
    #[default]
    OpeningRangeBreakout,
    /// Breakout trailed on Heikin-Ashi bars
    HeikinAshiTrail,
    /// Breakout trailed on the one-minute VWAP
    MinuteVwapTrail,
}

impl RuleKind {
    pub fn trail_mode(&self) -> TrailMode {
        match self {
            RuleKind::OpeningRangeBreakout => TrailMode::Structural,
            RuleKind::HeikinAshiTrail => TrailMode::HeikinAshi,
            RuleKind::MinuteVwapTrail => TrailMode::MinuteVwap,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::OpeningRangeBreakout => "ORB",
            RuleKind::HeikinAshiTrail => "HA",
            RuleKind::MinuteVwapTrail => "VWAP",
        }
    }
}

fn time(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default()
}

/// One named strategy: which rule, and the policies it composes
///
/// Clock times are exchange-local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub name: String,
    pub kind: RuleKind,
    pub signal: EntrySignalPolicy,
    pub bracket: BracketPolicy,
    /// Stop promoted to break-even on the first bar at or after this time
    pub break_even_time: Option<NaiveTime>,
    /// An entry still unfilled at this time is cancelled
    pub entry_cutoff_time: NaiveTime,
    /// Any position left is liquidated at this time
    pub close_position_time: NaiveTime,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            name: "orb".to_string(),
            kind: RuleKind::OpeningRangeBreakout,
            signal: EntrySignalPolicy::default(),
            bracket: BracketPolicy::default(),
            break_even_time: None,
            entry_cutoff_time: time(10, 30),
            close_position_time: time(15, 55),
        }
    }
}

impl StrategyConfig {
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

    pub fn trailing(&self) -> TrailingPolicy {
        TrailingPolicy::new(self.kind.trail_mode(), self.break_even_time)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |msg: String| {
            Err(ConfigurationError::InvalidStrategy(format!(
                "{}: {msg}",
                self.name
            )))
        };

        if self.name.trim().is_empty() {
            return Err(ConfigurationError::InvalidStrategy(
                "strategy name is empty".to_string(),
            ));
        }
        if self.signal.trigger_offset_minutes == 0 {
            return invalid("trigger_offset_minutes must be positive".to_string());
        }
        let ratio = self.signal.min_body_ratio.value()?;
        if ratio < Decimal::ZERO || ratio > Decimal::ONE {
            return invalid(format!("min_body_ratio {ratio} outside 0..=1"));
        }
        if self.signal.tick <= Decimal::ZERO {
            return invalid(format!("tick {} must be positive", self.signal.tick));
        }
        self.bracket.validate()?;
        if self.entry_cutoff_time >= self.close_position_time {
            return invalid(format!(
                "entry cutoff {} not before close-position time {}",
                self.entry_cutoff_time, self.close_position_time
            ));
        }
        if let Some(be) = self.break_even_time
            && be >= self.close_position_time
        {
            return invalid(format!(
                "break-even time {be} not before close-position time {}",
                self.close_position_time
            ));
        }
        Ok(())
    }

    /// Check the clock times fall inside the exchange session
    ///
    /// The signal bar must end before the entry cutoff, and every cutoff
    /// must lie strictly between the session open and close, so that some
    /// session bar reaches it.
    pub fn validate_session(
        &self,
        market_open: NaiveTime,
        market_close: NaiveTime,
    ) -> Result<(), ConfigurationError> {
        let invalid = |msg: String| {
            Err(ConfigurationError::InvalidStrategy(format!(
                "{}: {msg}",
                self.name
            )))
        };

        let offset = Duration::minutes(i64::from(self.signal.trigger_offset_minutes));
        let (signal_end, wrapped) = market_open.overflowing_add_signed(offset);
        if wrapped != 0 || signal_end >= self.entry_cutoff_time {
            return invalid(format!(
                "signal bar ends after the entry cutoff {}",
                self.entry_cutoff_time
            ));
        }
        let inside = |t: NaiveTime| t > market_open && t < market_close;
        if !inside(self.close_position_time) {
            return invalid(format!(
                "close-position time {} outside session {market_open}-{market_close}",
                self.close_position_time
            ));
        }
        if let Some(be) = self.break_even_time
            && !inside(be)
        {
            return invalid(format!(
                "break-even time {be} outside session {market_open}-{market_close}"
            ));
        }
        Ok(())
    }

    /// Check the signal bar can be a bar of `tradestrategy`'s bar size
    pub fn validate_bar_size(&self, tradestrategy: &Tradestrategy) -> Result<(), ConfigurationError> {
        let offset = self.signal.trigger_offset_minutes;
        let size = tradestrategy.bar_size_minutes;
        if size == 0 || offset % size != 0 {
            return Err(ConfigurationError::InvalidTradestrategy(format!(
                "{}: trigger offset of {} ({offset} min) is not a multiple of the {size} min bar",
                tradestrategy.id, self.name
            )));
        }
        Ok(())
    }
}

/// Check a tradestrategy can be run at all
pub fn validate_tradestrategy(ts: &Tradestrategy) -> Result<(), ConfigurationError> {
    let invalid = |msg: String| {
        Err(ConfigurationError::InvalidTradestrategy(format!(
            "{}: {msg}",
            ts.id
        )))
    };

    if ts.id.is_empty() || ts.instrument_id.as_str().is_empty() {
        return invalid("id and instrument are required".to_string());
    }
    match ts.risk_amount.value() {
        Ok(risk) if risk > Decimal::ZERO => {}
        Ok(risk) => return invalid(format!("risk amount {risk} must be positive")),
        Err(e) => return invalid(format!("risk amount: {e}")),
    }
    if ts.bar_size_minutes == 0 {
        return invalid("bar size must be positive".to_string());
    }
    if let Some(bp) = &ts.buying_power
        && bp.is_invalid()
    {
        return invalid(format!("buying power: '{bp}'"));
    }
    Ok(())
}

/// Build the rule instance for one tradestrategy
pub fn build_rule(
    config: &StrategyConfig,
    tradestrategy: Tradestrategy,
) -> Result<Box<dyn StrategyRule>, ConfigurationError> {
    config.validate()?;
    validate_tradestrategy(&tradestrategy)?;
    config.validate_bar_size(&tradestrategy)?;
    Ok(Box::new(BreakoutRule::new(config, tradestrategy)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use meridian_core::Money;
    use rust_decimal_macros::dec;

    fn tradestrategy() -> Tradestrategy {
        Tradestrategy::new(
            "ts1",
            "AAPL",
            NaiveDate::from_ymd_opt(2024, 3, 4).unwrap(),
            "orb",
            Money::new(dec!(100)),
            5,
        )
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = StrategyConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.trailing().mode, TrailMode::Structural);
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "name": "ha-trail",
            "kind": "HeikinAshiTrail",
            "signal": { "min_body_ratio": "0.6", "stop_anchor": "Extreme" },
            "bracket": { "targets": [{ "multiple": "1", "weight": 1 }, { "multiple": "3", "weight": 1 }] },
            "break_even_time": "11:00:00",
            "close_position_time": "15:50:00"
        }"#;
        let config = StrategyConfig::from_json(json).unwrap();
        assert_eq!(config.kind, RuleKind::HeikinAshiTrail);
        assert_eq!(config.signal.trigger_offset_minutes, 5);
        assert_eq!(config.bracket.targets.len(), 2);
        assert_eq!(config.trailing().break_even_time, Some(time(11, 0)));
        assert_eq!(config.entry_cutoff_time, time(10, 30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_config() {
        let mut config = StrategyConfig {
            entry_cutoff_time: time(16, 0),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidStrategy(_))
        ));

        config = StrategyConfig::default();
        config.signal.trigger_offset_minutes = 0;
        assert!(config.validate().is_err());

        config = StrategyConfig::default();
        config.bracket.targets.clear();
        assert!(config.validate().is_err());

        assert!(matches!(
            StrategyConfig::from_json(r#"{ "kind": "Martingale" }"#),
            Err(ConfigurationError::Parse(_))
        ));
    }

    #[test]
    fn test_build_rule_checks_tradestrategy() {
        let config = StrategyConfig::default();
        let rule = build_rule(&config, tradestrategy()).unwrap();
        assert_eq!(rule.name(), "ORB:ts1");

        let mut broke = tradestrategy();
        broke.risk_amount = Money::zero();
        assert!(matches!(
            build_rule(&config, broke),
            Err(ConfigurationError::InvalidTradestrategy(_))
        ));

        let mut no_bars = tradestrategy();
        no_bars.bar_size_minutes = 0;
        assert!(build_rule(&config, no_bars).is_err());
    }

    #[test]
    fn test_signal_bar_must_fit_the_bar_size() {
        let mut config = StrategyConfig::default();
        config.signal.trigger_offset_minutes = 10;

        let mut ten = tradestrategy();
        ten.bar_size_minutes = 10;
        assert!(config.validate_bar_size(&ten).is_ok());
        assert!(build_rule(&config, ten).is_ok());

        let mut fifteen = tradestrategy();
        fifteen.bar_size_minutes = 15;
        assert!(matches!(
            build_rule(&config, fifteen),
            Err(ConfigurationError::InvalidTradestrategy(msg)) if msg.contains("not a multiple")
        ));
    }

    #[test]
    fn test_clock_times_inside_the_session() {
        let (open, close) = (time(9, 30), time(16, 0));
        assert!(StrategyConfig::default().validate_session(open, close).is_ok());

        // Liquidating at the bell leaves no session bar to do it on
        let at_close = StrategyConfig {
            close_position_time: time(16, 0),
            ..Default::default()
        };
        assert!(at_close.validate().is_ok());
        assert!(matches!(
            at_close.validate_session(open, close),
            Err(ConfigurationError::InvalidStrategy(_))
        ));

        let pre_open = StrategyConfig {
            break_even_time: Some(time(9, 0)),
            ..Default::default()
        };
        assert!(pre_open.validate_session(open, close).is_err());

        let mut late_signal = StrategyConfig::default();
        late_signal.signal.trigger_offset_minutes = 60;
        assert!(late_signal.validate_session(open, close).is_err());
    }
}
