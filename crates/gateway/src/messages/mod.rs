//! Messages crossing the broker boundary
//!
//! Outbound: [`OrderCommand`], one per broker call the engine makes.
//! Inbound: [`BrokerEvent`], the asynchronous notifications the engine
//! reconciles against its trade state.

pub mod command;
pub mod event;

pub use command::OrderCommand;
pub use event::BrokerEvent;
