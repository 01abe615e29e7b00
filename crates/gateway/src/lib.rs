//! Meridian Gateway
//!
//! Broker boundary of the Meridian engine. Provides:
//! - the `BrokerGateway` port (sync, fire-and-forget)
//! - message types: outbound `OrderCommand`, inbound `BrokerEvent`
//! - adapters: a tokio channel shim and an in-process paper broker
//!
//! ## Architecture
//!
//! ```text
//!   Rule actions
//!        │
//!   ┌────▼──────────┐   OrderCommand    ┌──────────────┐
//!   │ BrokerGateway ├──────────────────►│ live broker  │
//!   │ (channel or   │                   │ or paper     │
//!   │  paper)       │◄──────────────────┤ broker       │
//!   └───────────────┘   BrokerEvent     └──────────────┘
//!        │
//!   Rule on_order_event
//! ```

pub mod adapters;
pub mod broker;
pub mod error;
pub mod messages;

pub use adapters::{ChannelBrokerGateway, PaperBroker, PaperBrokerConfig};
pub use broker::BrokerGateway;
pub use error::{GatewayError, GatewayResult};
pub use messages::{BrokerEvent, OrderCommand};
