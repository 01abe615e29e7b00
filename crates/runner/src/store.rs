//! In-memory persistence
//!
//! Stands in for the reporting database: keeps the latest status, the full
//! status history and the latest trade snapshot of every tradestrategy.

use async_trait::async_trait;
use dashmap::DashMap;
use meridian_core::{Trade, TradestrategyStatus};
use meridian_ports::{StoreError, StoreResult, TradestrategyStore};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    statuses: DashMap<String, Vec<TradestrategyStatus>>,
    trades: DashMap<String, Trade>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every status recorded for `tradestrategy_id`, oldest first
    pub fn history(&self, tradestrategy_id: &str) -> Vec<TradestrategyStatus> {
        self.statuses
            .get(tradestrategy_id)
            .map(|h| h.clone())
            .unwrap_or_default()
    }

    pub fn trade_count(&self) -> usize {
        self.trades.len()
    }
}

#[async_trait]
impl TradestrategyStore for InMemoryStore {
    async fn record_status(
        &self,
        tradestrategy_id: &str,
        status: TradestrategyStatus,
    ) -> StoreResult<()> {
        let mut history = self.statuses.entry(tradestrategy_id.to_string()).or_default();
        if let Some(current) = history.last().copied() {
            if current == status {
                return Ok(());
            }
            if current.is_terminal() {
                return Err(StoreError::TerminalStatus {
                    id: tradestrategy_id.to_string(),
                    from: current.to_string(),
                    to: status.to_string(),
                });
            }
        }
        log::debug!("[Store] {} -> {}", tradestrategy_id, status);
        history.push(status);
        Ok(())
    }

    async fn status(&self, tradestrategy_id: &str) -> StoreResult<Option<TradestrategyStatus>> {
        Ok(self
            .statuses
            .get(tradestrategy_id)
            .and_then(|h| h.last().copied()))
    }

    async fn save_trade(&self, trade: &Trade) -> StoreResult<()> {
        self.trades
            .insert(trade.tradestrategy_id.clone(), trade.clone());
        Ok(())
    }

    async fn load_trade(&self, tradestrategy_id: &str) -> StoreResult<Option<Trade>> {
        Ok(self.trades.get(tradestrategy_id).map(|t| t.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_core::RejectReason;

    #[tokio::test]
    async fn test_status_history() {
        let store = InMemoryStore::new();
        assert_eq!(store.status("ts1").await.unwrap(), None);

        store.record_status("ts1", TradestrategyStatus::Scheduled).await.unwrap();
        store.record_status("ts1", TradestrategyStatus::Waiting).await.unwrap();
        store.record_status("ts1", TradestrategyStatus::Waiting).await.unwrap();
        store.record_status("ts1", TradestrategyStatus::EntrySubmitted).await.unwrap();

        assert_eq!(
            store.status("ts1").await.unwrap(),
            Some(TradestrategyStatus::EntrySubmitted)
        );
        assert_eq!(store.history("ts1").len(), 3);
    }

    #[tokio::test]
    async fn test_terminal_status_is_final() {
        let store = InMemoryStore::new();
        let rejected = TradestrategyStatus::Rejected(RejectReason::BodyRatio);
        store.record_status("ts1", rejected).await.unwrap();

        // Re-recording the same status is a no-op
        assert!(store.record_status("ts1", rejected).await.is_ok());
        let err = store
            .record_status("ts1", TradestrategyStatus::Open)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TerminalStatus { .. }));
        assert_eq!(store.status("ts1").await.unwrap(), Some(rejected));
    }

    #[tokio::test]
    async fn test_error_can_still_close() {
        let store = InMemoryStore::new();
        store.record_status("ts1", TradestrategyStatus::Open).await.unwrap();
        store.record_status("ts1", TradestrategyStatus::Error).await.unwrap();
        store.record_status("ts1", TradestrategyStatus::Closed).await.unwrap();
        assert_eq!(
            store.history("ts1"),
            vec![
                TradestrategyStatus::Open,
                TradestrategyStatus::Error,
                TradestrategyStatus::Closed
            ]
        );
    }

    #[tokio::test]
    async fn test_trade_snapshot() {
        let store = InMemoryStore::new();
        let trade = Trade::new("ts1", "AAPL", meridian_core::Direction::Long);
        store.save_trade(&trade).await.unwrap();

        let loaded = store.load_trade("ts1").await.unwrap().unwrap();
        assert_eq!(loaded.id, trade.id);
        assert!(store.load_trade("ts2").await.unwrap().is_none());
        assert_eq!(store.trade_count(), 1);
    }
}
