//! Calendar configuration loaded from JSON

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use meridian_core::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// Default number of calendar days searched for a trading day
pub const DEFAULT_MAX_SCAN_DAYS: u32 = 366;

/// Exchange session and holiday configuration
///
/// ```json
/// {
///   "timezone": "America/New_York",
///   "market_open": "09:30:00",
///   "market_close": "16:00:00",
///   "non_trading_weekdays": ["Sat", "Sun"],
///   "holidays": { "2024": [1, 15, 50] }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// IANA timezone name of the exchange
    pub timezone: String,
    pub market_open: NaiveTime,
    pub market_close: NaiveTime,
    /// Weekday names (`Mon`, `Saturday`, ...)
    pub non_trading_weekdays: Vec<String>,
    /// Holiday day-of-year ordinals (1..=366) keyed by year
    pub holidays: BTreeMap<i32, BTreeSet<u32>>,
    /// Search bound for trading-day lookups
    pub max_scan_days: u32,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            timezone: "America/New_York".to_string(),
            market_open: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            market_close: NaiveTime::from_hms_opt(16, 0, 0).unwrap_or_default(),
            non_trading_weekdays: vec!["Sat".to_string(), "Sun".to_string()],
            holidays: BTreeMap::new(),
            max_scan_days: DEFAULT_MAX_SCAN_DAYS,
        }
    }
}

impl CalendarConfig {
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

    pub fn parse_timezone(&self) -> Result<Tz, ConfigurationError> {
        self.timezone.parse::<Tz>().map_err(|_| {
            ConfigurationError::InvalidCalendar(format!("unknown timezone '{}'", self.timezone))
        })
    }

    pub fn parse_weekdays(&self) -> Result<HashSet<Weekday>, ConfigurationError> {
        self.non_trading_weekdays
            .iter()
            .map(|name| {
                name.parse::<Weekday>().map_err(|_| {
                    ConfigurationError::InvalidCalendar(format!("unknown weekday '{name}'"))
                })
            })
            .collect()
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.parse_timezone()?;

        if self.market_open >= self.market_close {
            return Err(ConfigurationError::InvalidCalendar(format!(
                "market open {} not before close {}",
                self.market_open, self.market_close
            )));
        }

        if self.parse_weekdays()?.len() >= 7 {
            return Err(ConfigurationError::InvalidCalendar(
                "every weekday marked non-trading".to_string(),
            ));
        }

        for (year, days) in &self.holidays {
            if let Some(bad) = days.iter().find(|d| !(1..=366).contains(*d)) {
                return Err(ConfigurationError::InvalidCalendar(format!(
                    "holiday day-of-year {bad} out of range for {year}"
                )));
            }
        }

        if self.max_scan_days == 0 {
            return Err(ConfigurationError::InvalidCalendar(
                "max_scan_days must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = CalendarConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_scan_days, DEFAULT_MAX_SCAN_DAYS);
    }

    #[test]
    fn test_parse_json() {
        let json = r#"{
            "timezone": "America/Chicago",
            "market_open": "08:30:00",
            "market_close": "15:00:00",
            "holidays": { "2024": [1, 359] }
        }"#;
        let config = CalendarConfig::from_json(json).unwrap();
        assert_eq!(config.parse_timezone().unwrap(), chrono_tz::America::Chicago);
        assert_eq!(config.holidays[&2024].len(), 2);
        // Defaults fill the rest
        assert_eq!(config.non_trading_weekdays.len(), 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_values() {
        let mut config = CalendarConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.timezone = "America/New_York".to_string();
        config.market_close = config.market_open;
        assert!(config.validate().is_err());

        config = CalendarConfig::default();
        config.holidays.insert(2024, [0].into_iter().collect());
        assert!(config.validate().is_err());

        config = CalendarConfig::default();
        config.non_trading_weekdays.push("Funday".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_all_weekdays_closed() {
        let config = CalendarConfig {
            non_trading_weekdays: ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigurationError::InvalidCalendar(_))
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            CalendarConfig::from_json("{ not json"),
            Err(ConfigurationError::Parse(_))
        ));
    }
}
