//! Broker gateway implementations
//!
//! - `channel`: forwards commands on a tokio channel to whatever drives the broker
//! - `paper`: in-process simulator matching working orders against bars

pub mod channel;
pub mod paper;

pub use channel::ChannelBrokerGateway;
pub use paper::{PaperBroker, PaperBrokerConfig};
