mod numeric;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

pub use numeric::{
    DecimalKind, DecimalValue, Money, MoneyKind, Numeric, NumericKind, Percent, PercentKind,
    Quantity, QuantityKind,
};

/// Order and bar prices; engine-internal arithmetic stays in raw `Decimal`
pub type Price = Decimal;

/// Share count on orders and fills
pub type Shares = u32;

/// Timestamp in UTC
pub type Timestamp = DateTime<Utc>;

/// Symbol identifier for a tradeable instrument
pub type Symbol = String;
