mod instrument;
mod order;
mod order_status;
mod order_type;
mod side;
mod trade;
mod tradestrategy;

pub use instrument::InstrumentId;
pub use order::{OrderId, TradeOrder};
pub use order_status::OrderStatus;
pub use order_type::{OrderRole, OrderType, TimeInForce};
pub use side::{Direction, Side};
pub use trade::{Trade, TradeId};
pub use tradestrategy::{RejectReason, Tradestrategy, TradestrategyStatus};
