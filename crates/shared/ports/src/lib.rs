//! Meridian Ports
//!
//! Port definitions (traits) for the Meridian strategy engine.
//! These define the boundary between the engine and persistence; the
//! broker boundary lives in `meridian-gateway`.

mod error;
mod store;

pub use error::{StoreError, StoreResult};
pub use store::TradestrategyStore;
