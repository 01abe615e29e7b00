//! Meridian Core Domain
//!
//! Pure domain types for the Meridian strategy engine.
//! This crate contains no async and no I/O beyond loading configuration
//! files, and is fully unit testable.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                     meridian-core                      │
//! │                                                        │
//! │  values        Money / Percent / Quantity / Decimal    │
//! │                (tri-state: defined, invalid, empty)    │
//! │                                                        │
//! │  entities      TradeOrder ─┐                           │
//! │                Trade ──────┴─ Tradestrategy            │
//! │                                                        │
//! │  market        CandleItem → CandleSeries → Heikin-Ashi │
//! │                                                        │
//! │  entry_limit   price bracket → rounding / thresholds   │
//! └────────────────────────────────────────────────────────┘
//! ```

pub mod entities;
pub mod entry_limit;
pub mod error;
pub mod market;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    Direction, InstrumentId, OrderId, OrderRole, OrderStatus, OrderType, RejectReason, Side,
    TimeInForce, Trade, TradeId, TradeOrder, Tradestrategy, TradestrategyStatus,
};
pub use entry_limit::{Entrylimit, EntrylimitTable};
pub use error::{ConfigurationError, MarketDataError, NumericError, OrderStateError};
pub use market::{CandleItem, CandlePeriod, CandleSeries};
pub use values::{
    DecimalValue, Money, Numeric, NumericKind, Percent, Price, Quantity, Shares, Symbol, Timestamp,
};
