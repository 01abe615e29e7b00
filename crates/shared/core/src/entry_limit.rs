//! Entry-limit policy table
//!
//! Rows keyed by a closed price range `[start_price, end_price]` supply the
//! rounding and percentage thresholds used when pricing and sizing orders.
//! The table is read-only once built; reloading means building a new one.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::Path;

use crate::error::{ConfigurationError, NumericResult};
use crate::values::{Money, Percent, Price, Quantity};

/// One price bracket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entrylimit {
    pub start_price: Money,
    pub end_price: Money,
    /// Offset between a stop-limit entry's stop and limit prices
    pub limit_amount: Money,
    /// Maximum signal-bar range as a fraction of price
    pub percent_of_price: Percent,
    /// Maximum position value as a fraction of buying power
    #[serde(default)]
    pub percent_of_margin: Percent,
    /// Share increment quantities are rounded down to
    pub share_round: Quantity,
    /// Distance within which prices snap to a whole/half dollar
    #[serde(default)]
    pub price_round: Money,
    /// Loaded for reporting; pivot-based stop moves are not implemented
    #[serde(default)]
    pub pivot_range: Money,
}

impl Entrylimit {
    /// Whether `price` falls inside this row's closed range
    pub fn contains(&self, price: Price) -> NumericResult<bool> {
        Ok(price >= self.start_price.value()? && price <= self.end_price.value()?)
    }
}

/// Price-bracket lookup table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "Vec<Entrylimit>", into = "Vec<Entrylimit>")]
pub struct EntrylimitTable {
    rows: Vec<Entrylimit>,
}

impl EntrylimitTable {
    /// Build a table; rows are sorted by start price and must not overlap
    pub fn new(mut rows: Vec<Entrylimit>) -> Result<Self, ConfigurationError> {
        for row in &rows {
            let start = row.start_price.value().map_err(invalid_row)?;
            let end = row.end_price.value().map_err(invalid_row)?;
            if start > end {
                return Err(ConfigurationError::InvalidEntryLimit(format!(
                    "start price {start} above end price {end}"
                )));
            }
        }

        rows.sort_by(|a, b| {
            a.start_price
                .compare(&b.start_price)
                .unwrap_or(Ordering::Equal)
        });

        for pair in rows.windows(2) {
            let prev_end = pair[0].end_price.value().map_err(invalid_row)?;
            let next_start = pair[1].start_price.value().map_err(invalid_row)?;
            if next_start <= prev_end {
                return Err(ConfigurationError::InvalidEntryLimit(format!(
                    "range starting {next_start} overlaps range ending {prev_end}"
                )));
            }
        }

        Ok(Self { rows })
    }

    /// Parse a JSON array of rows
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let rows: Vec<Entrylimit> =
            serde_json::from_str(json).map_err(|e| ConfigurationError::Parse(e.to_string()))?;
        Self::new(rows)
    }

    /// Load a JSON array of rows from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigurationError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    /// The row whose range contains `price`
    pub fn for_price(&self, price: Price) -> Option<&Entrylimit> {
        self.rows
            .iter()
            .find(|row| row.contains(price).unwrap_or(false))
    }

    pub fn rows(&self) -> &[Entrylimit] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl TryFrom<Vec<Entrylimit>> for EntrylimitTable {
    type Error = ConfigurationError;

    fn try_from(rows: Vec<Entrylimit>) -> Result<Self, Self::Error> {
        Self::new(rows)
    }
}

impl From<EntrylimitTable> for Vec<Entrylimit> {
    fn from(table: EntrylimitTable) -> Self {
        table.rows
    }
}

fn invalid_row(e: crate::error::NumericError) -> ConfigurationError {
    ConfigurationError::InvalidEntryLimit(e.to_string())
}
