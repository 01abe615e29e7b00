//! Meridian Strategy Rules
//!
//! One rule instance per tradestrategy turns bar updates and broker
//! notifications into order commands:
//! - Entry signal qualification, pricing and risk sizing
//! - Risk-multiple brackets split across weighted target legs
//! - Structural, Heikin-Ashi, break-even and one-minute VWAP stop trailing
//! - Invalidation, entry cutoff and end-of-day liquidation
//!
//! ## Architecture
//!
//! ```text
//!   CandleSeries ──on_bar──┐                 ┌── Action::Broker ──► BrokerGateway
//!                          ▼                 │
//!                   ┌─────────────┐          │
//!                   │ StrategyRule│──────────┤
//!                   └─────────────┘          │
//!                          ▲                 └── Action::UpdateStatus ──► store
//!   BrokerEvent ─on_order_event┘
//!
//!   RuleContext (Arc<TradingSessionCalendar>, Arc<EntrylimitTable>) is shared
//!   read-only by every rule.
//! ```
//!
//! Rules never block and never call out: every step returns the actions the
//! host should dispatch, in order.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_strategy::{build_rule, RuleContext, StrategyConfig};
//!
//! let config = StrategyConfig::from_file("strategies/orb.json")?;
//! let mut rule = build_rule(&config, tradestrategy)?;
//! for action in rule.on_bar(&ctx, &series, is_new_bar)? {
//!     // dispatch
//! }
//! ```

pub mod action;
pub mod breakout;
pub mod config;
pub mod context;
pub mod error;
pub mod policy;
pub mod rule;
pub mod state;

pub use action::Action;
pub use breakout::BreakoutRule;
pub use config::{RuleKind, StrategyConfig, build_rule, validate_tradestrategy};
pub use context::RuleContext;
pub use error::{Result, RuleError, StrategyRuleError, codes};
pub use policy::{
    BracketError, BracketLeg, BracketPolicy, EntrySignal, EntrySignalPolicy, SignalDecision,
    StopAnchor, TargetLeg, TrailMode, TrailingPolicy,
};
pub use rule::StrategyRule;
pub use state::RuleState;
