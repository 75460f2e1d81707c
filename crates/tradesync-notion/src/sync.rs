//! Batch trade sync

use crate::client::NotionClient;
use crate::error::{Error, Result};
use crate::properties::trade_properties;
use tracing::info;
use tradesync_core::{write_batch_with_retry, TradeRecord, WriteBatchResult};

impl NotionClient {
    /// Write `trades` into `database_id`, one page each
    ///
    /// Trades carrying a `notion_page_id` update that page; the rest create
    /// new pages. Batches larger than the configured ceiling are refused
    /// before anything is sent.
    pub async fn sync_trades(
        &self,
        token: &str,
        database_id: &str,
        trades: &[TradeRecord],
    ) -> Result<WriteBatchResult> {
        let max = self.config().max_batch_size;
        if trades.len() > max {
            return Err(Error::BatchTooLarge {
                size: trades.len(),
                max,
            });
        }

        let result = write_batch_with_retry(
            trades,
            |trade| {
                let properties = trade_properties(trade);
                async move {
                    match trade.notion_page_id.as_deref() {
                        Some(page_id) => self.update_page(token, page_id, &properties).await,
                        None => self.create_page(token, database_id, &properties).await,
                    }
                }
            },
            self.config().pacing,
            &self.config().retry,
        )
        .await;

        info!(
            total = trades.len(),
            succeeded = result.succeeded.len(),
            failed = result.failed.len(),
            "Notion batch sync finished"
        );
        Ok(result)
    }
}
