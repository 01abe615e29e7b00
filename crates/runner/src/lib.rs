//! Meridian Runner - Strategy Engine Host
//!
//! Hosts rule instances for a trading day:
//!
//! - **Config**: calendar, entry limits, strategies and tradestrategies from JSON
//! - **Engine**: routes bars and broker events, dispatches rule actions
//! - **Handle**: one worker task per instrument
//! - **Store**: in-memory status and trade persistence
//!
//! ## Architecture
//!
//! ```text
//!        bar feed                               broker
//!           │                               ▲          │
//!           │ CandleItem         OrderCommand│          │ BrokerEvent
//!           ▼                               │          ▼
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          EngineHandle                            │
//! │                                                                  │
//! │  ┌─────────────────────┐              ┌─────────────────────┐    │
//! │  │  worker AAPL        │              │  worker MSFT        │    │
//! │  │  StrategyEngine     │              │  StrategyEngine     │    │
//! │  │   └ BreakoutRule    │              │   └ BreakoutRule    │    │
//! │  └─────────┬───────────┘              └──────────┬──────────┘    │
//! │            │ statuses, trades, faults            │               │
//! └────────────┼─────────────────────────────────────┼───────────────┘
//!              ▼                                     ▼
//!      TradestrategyStore                     RuleFault channel
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod fault;
pub mod handle;
pub mod logging;
pub mod store;

pub use config::EngineConfig;
pub use engine::{OrderRoutes, Strategies, StrategyEngine};
pub use error::{Result, RunnerError};
pub use fault::RuleFault;
pub use handle::EngineHandle;
pub use store::InMemoryStore;
