use async_trait::async_trait;
use meridian_core::{Trade, TradestrategyStatus};

use crate::error::StoreResult;

/// Port for persisting tradestrategy status and trade state
///
/// The engine writes through this port after every rule step; the
/// reporting layer reads from it. Implementations must refuse to move a
/// tradestrategy out of a terminal status.
#[async_trait]
pub trait TradestrategyStore: Send + Sync {
    /// Record a status transition
    async fn record_status(
        &self,
        tradestrategy_id: &str,
        status: TradestrategyStatus,
    ) -> StoreResult<()>;

    /// Latest recorded status, if any
    async fn status(&self, tradestrategy_id: &str) -> StoreResult<Option<TradestrategyStatus>>;

    /// Insert or replace the trade of a tradestrategy
    async fn save_trade(&self, trade: &Trade) -> StoreResult<()>;

    /// The trade of a tradestrategy, if one was opened
    async fn load_trade(&self, tradestrategy_id: &str) -> StoreResult<Option<Trade>>;
}
