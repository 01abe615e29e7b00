//! Policies composed into a rule
//!
//! Each policy is a plain value with pure functions: the signal policy
//! qualifies and prices the entry, the bracket policy sizes the exit legs,
//! the trailing policy proposes tighter stops.

pub mod bracket;
pub mod rounding;
pub mod signal;
pub mod trailing;

pub use bracket::{BracketError, BracketLeg, BracketPolicy, TargetLeg};
pub use signal::{EntrySignal, EntrySignalPolicy, SignalDecision, StopAnchor};
pub use trailing::{TrailMode, TrailingPolicy};
