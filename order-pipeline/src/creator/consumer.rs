//! CreationQueue poll loop
//!
//! Receives batches, hands them to the [`OrderCreator`] and acknowledges only
//! the records that succeeded. Failed records become visible again after the
//! queue's visibility timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::{BatchReport, CreationRecord, OrderCreator};
use crate::queue::{QueueError, ReceivedMessage, TaskQueue};

pub struct CreationConsumer {
    queue: Arc<dyn TaskQueue>,
    creator: OrderCreator,
    batch_size: i32,
    receive_wait: Duration,
    error_backoff: Duration,
}

impl CreationConsumer {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        creator: OrderCreator,
        batch_size: i32,
        receive_wait: Duration,
        error_backoff: Duration,
    ) -> Self {
        Self {
            queue,
            creator,
            batch_size,
            receive_wait,
            error_backoff,
        }
    }

    /// Receive one batch, process it and ack the successes
    pub async fn poll_once(&self) -> Result<BatchReport, QueueError> {
        let messages = self.queue.receive(self.batch_size, self.receive_wait).await?;
        Ok(self.handle_batch(messages).await)
    }

    async fn handle_batch(&self, messages: Vec<ReceivedMessage>) -> BatchReport {
        if messages.is_empty() {
            return BatchReport::default();
        }
        tracing::info!(count = messages.len(), "Processing creation batch");

        let receipts: HashMap<String, String> = messages
            .iter()
            .map(|m| (m.message_id.clone(), m.receipt_handle.clone()))
            .collect();
        let records: Vec<CreationRecord> = messages
            .into_iter()
            .map(|m| CreationRecord {
                message_id: m.message_id,
                body: m.body,
            })
            .collect();

        let report = self.creator.process_batch(&records).await;

        for result in report.results.iter().filter(|r| r.outcome.is_ok()) {
            let Some(receipt) = receipts.get(&result.message_id) else {
                continue;
            };
            // An ack failure only means the order may be created twice
            if let Err(e) = self.queue.ack(receipt).await {
                tracing::warn!(message_id = %result.message_id, error = %e, "Failed to ack creation message");
            }
        }
        report
    }

    /// Poll until cancelled. A batch already received is always finished.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(batch_size = self.batch_size, "Order creator started");

        loop {
            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.queue.receive(self.batch_size, self.receive_wait) => received,
            };

            match received {
                Ok(messages) => {
                    self.handle_batch(messages).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Creation queue poll failed");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.error_backoff) => {}
                    }
                }
            }
        }

        tracing::info!("Order creator stopped");
    }
}
