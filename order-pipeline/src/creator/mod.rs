//! Order creation
//!
//! Materializes one order per CreationMessage and routes it: either to the
//! FulfillmentQueue (`queued_for_processing`) or straight to `completed`.
//! Records in a batch are isolated; a failure is reported for that record
//! only and the queue redelivers it.

mod consumer;
pub mod policy;

pub use consumer::CreationConsumer;
pub use policy::{AlwaysFulfill, AmountThreshold, NeverFulfill, RoutingPolicy};

use std::sync::Arc;

use shared::error::AppError;
use shared::order::{CreationMessage, MessageError, Order, OrderStatus, StatusUpdate};
use thiserror::Error;
use tracing::{error, info};

use crate::queue::{OutgoingMessage, QueueError, TaskQueue};
use crate::store::{OrderStore, StoreError};

pub const QUEUED_MESSAGE: &str = "Queued for packaging and shipping";
pub const DIGITAL_COMPLETED_MESSAGE: &str = "Order completed - digital product";

#[derive(Debug, Error)]
pub enum CreatorError {
    #[error(transparent)]
    Malformed(#[from] MessageError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Publish(#[from] QueueError),
}

impl From<CreatorError> for AppError {
    fn from(err: CreatorError) -> Self {
        match err {
            CreatorError::Malformed(e) => e.into(),
            CreatorError::Store(e) => e.into(),
            CreatorError::Publish(e) => e.into(),
        }
    }
}

/// One CreationQueue record
#[derive(Debug, Clone)]
pub struct CreationRecord {
    pub message_id: String,
    pub body: String,
}

/// Where a created order went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Routed {
    Queued { order_id: String },
    Completed { order_id: String },
}

impl Routed {
    pub fn order_id(&self) -> &str {
        match self {
            Routed::Queued { order_id } | Routed::Completed { order_id } => order_id,
        }
    }
}

#[derive(Debug)]
pub struct RecordResult {
    pub message_id: String,
    pub outcome: Result<Routed, CreatorError>,
}

/// Per-record results of one batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub results: Vec<RecordResult>,
}

impl BatchReport {
    /// Records the queue must redeliver
    pub fn failed_message_ids(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|r| r.outcome.is_err())
            .map(|r| r.message_id.as_str())
            .collect()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

pub struct OrderCreator {
    store: Arc<dyn OrderStore>,
    fulfillment_queue: Arc<dyn TaskQueue>,
    policy: Arc<dyn RoutingPolicy>,
}

impl OrderCreator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        fulfillment_queue: Arc<dyn TaskQueue>,
        policy: Arc<dyn RoutingPolicy>,
    ) -> Self {
        Self {
            store,
            fulfillment_queue,
            policy,
        }
    }

    /// Process every record; one failure never stops the rest
    pub async fn process_batch(&self, records: &[CreationRecord]) -> BatchReport {
        let mut report = BatchReport::default();
        for record in records {
            let outcome = self.process_record(&record.body).await;
            if let Err(e) = &outcome {
                error!(message_id = %record.message_id, error = %e, "Error processing record");
            }
            report.results.push(RecordResult {
                message_id: record.message_id.clone(),
                outcome,
            });
        }
        info!(
            total = report.results.len(),
            succeeded = report.succeeded(),
            failed = report.failed(),
            "Batch processing complete"
        );
        report
    }

    pub async fn process_record(&self, body: &str) -> Result<Routed, CreatorError> {
        let message = CreationMessage::parse(body)?;
        let order = Order::from_creation(shared::util::order_id(), &message, shared::util::now());
        let order_id = order.order_id.clone();
        info!(
            order_id = %order_id,
            session_id = %message.session_id,
            amount = %shared::util::format_amount(message.amount_total, &message.currency),
            "Creating order"
        );

        self.store.put(&order).await?;

        if self.policy.needs_long_processing(&order) {
            let task = order.fulfillment_task();
            let outgoing = OutgoingMessage::json(&task, task.attributes())?;
            let message_id = self.fulfillment_queue.send(outgoing).await?;
            info!(order_id = %order_id, message_id = %message_id, "Sent to fulfillment queue");

            let update = StatusUpdate::new(OrderStatus::QueuedForProcessing, QUEUED_MESSAGE)
                .expecting(OrderStatus::Pending);
            match self.store.update_status(&order_id, &update).await {
                Ok(()) => {}
                // The worker moved it out of pending first
                Err(StoreError::Conflict { .. }) => {
                    info!(order_id = %order_id, "Order already picked up by fulfillment");
                }
                Err(e) => return Err(e.into()),
            }
            Ok(Routed::Queued { order_id })
        } else {
            let update = StatusUpdate::new(OrderStatus::Completed, DIGITAL_COMPLETED_MESSAGE)
                .expecting(OrderStatus::Pending);
            self.store.update_status(&order_id, &update).await?;
            info!(order_id = %order_id, policy = self.policy.name(), "Order completed immediately");
            Ok(Routed::Completed { order_id })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryQueue;
    use crate::store::MemoryOrderStore;
    use serde_json::json;
    use shared::order::{FulfillmentTask, LogStatus};
    use std::time::Duration;

    struct Harness {
        store: Arc<MemoryOrderStore>,
        queue: Arc<MemoryQueue>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                store: Arc::new(MemoryOrderStore::new()),
                queue: Arc::new(MemoryQueue::new("fulfillment", Duration::from_secs(900))),
            }
        }

        fn creator(&self, policy: Arc<dyn RoutingPolicy>) -> OrderCreator {
            OrderCreator::new(self.store.clone(), self.queue.clone(), policy)
        }
    }

    fn record(id: &str, amount: i64) -> CreationRecord {
        CreationRecord {
            message_id: id.to_string(),
            body: json!({
                "eventId": format!("evt_{id}"),
                "eventType": "order.created",
                "sessionId": format!("cs_{id}"),
                "customerId": "cus_1",
                "customerEmail": "jane@example.com",
                "customerName": "Jane",
                "amountTotal": amount,
                "currency": "eur",
                "paymentStatus": "paid",
                "timestamp": "2026-01-05T10:00:00Z",
                "metadata": {}
            })
            .to_string(),
        }
    }

    #[tokio::test]
    async fn test_routed_order_is_queued() {
        let h = Harness::new();
        let routed = h
            .creator(Arc::new(AlwaysFulfill))
            .process_record(&record("m1", 1999).body)
            .await
            .unwrap();

        let order = h.store.get(routed.order_id()).await.unwrap().unwrap();
        assert!(order.order_id.starts_with("ord_"));
        assert_eq!(order.order_status, OrderStatus::QueuedForProcessing);
        assert_eq!(
            order.log_statuses(),
            vec![LogStatus::Received, LogStatus::QueuedForProcessing]
        );
        assert_eq!(order.logs[1].message, QUEUED_MESSAGE);
        assert!(order.logs_are_chronological());

        let delivered = h.queue.receive(1, Duration::ZERO).await.unwrap();
        assert_eq!(delivered[0].attribute("orderId"), Some(order.order_id.as_str()));
        assert_eq!(delivered[0].attribute("taskType"), Some("packaging_and_shipping"));
        let task = FulfillmentTask::parse(&delivered[0].body).unwrap();
        assert_eq!(task, order.fulfillment_task());
    }

    #[tokio::test]
    async fn test_unrouted_order_completes_directly() {
        let h = Harness::new();
        let routed = h
            .creator(Arc::new(NeverFulfill))
            .process_record(&record("m1", 1999).body)
            .await
            .unwrap();
        assert!(matches!(routed, Routed::Completed { .. }));

        let order = h.store.get(routed.order_id()).await.unwrap().unwrap();
        assert_eq!(order.order_status, OrderStatus::Completed);
        assert_eq!(
            order.log_statuses(),
            vec![LogStatus::Received, LogStatus::Completed]
        );
        assert_eq!(order.logs[1].message, DIGITAL_COMPLETED_MESSAGE);
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_record_does_not_stop_batch() {
        let h = Harness::new();
        let records = vec![
            record("m1", 1999),
            CreationRecord {
                message_id: "bad".into(),
                body: "{\"eventType\":\"order.created\"}".into(),
            },
            record("m3", 500),
        ];
        let report = h.creator(Arc::new(AlwaysFulfill)).process_batch(&records).await;

        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed_message_ids(), vec!["bad"]);
        assert!(matches!(
            report.results[1].outcome,
            Err(CreatorError::Malformed(_))
        ));
        assert_eq!(h.store.len(), 2);
        assert_eq!(h.queue.len(), 2);
        // Nothing is left pending
        assert!(
            h.store
                .orders()
                .iter()
                .all(|o| o.order_status == OrderStatus::QueuedForProcessing)
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_per_record() {
        let h = Harness::new();
        h.store.set_unavailable(true);
        let report = h
            .creator(Arc::new(AlwaysFulfill))
            .process_batch(&[record("m1", 1)])
            .await;
        assert!(matches!(report.results[0].outcome, Err(CreatorError::Store(_))));
        assert!(h.queue.is_empty());
    }

    #[tokio::test]
    async fn test_publish_failure_is_per_record() {
        let h = Harness::new();
        h.queue.set_fail_sends(true);
        let report = h
            .creator(Arc::new(AlwaysFulfill))
            .process_batch(&[record("m1", 1)])
            .await;
        assert_eq!(report.failed_message_ids(), vec!["m1"]);
        assert!(matches!(report.results[0].outcome, Err(CreatorError::Publish(_))));
    }

    /// Lets a competing writer queue the order right before the creator does
    struct WorkerFirst(Arc<MemoryOrderStore>);

    #[async_trait::async_trait]
    impl OrderStore for WorkerFirst {
        async fn get(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
            self.0.get(order_id).await
        }

        async fn put(&self, order: &Order) -> Result<(), StoreError> {
            self.0.put(order).await
        }

        async fn update_status(
            &self,
            order_id: &str,
            update: &StatusUpdate,
        ) -> Result<(), StoreError> {
            if update.status == OrderStatus::QueuedForProcessing {
                let first = StatusUpdate::new(OrderStatus::QueuedForProcessing, QUEUED_MESSAGE)
                    .expecting(OrderStatus::Pending);
                self.0.update_status(order_id, &first).await?;
            }
            self.0.update_status(order_id, update).await
        }
    }

    #[tokio::test]
    async fn test_queued_update_conflict_counts_as_success() {
        let h = Harness::new();
        let creator = OrderCreator::new(
            Arc::new(WorkerFirst(h.store.clone())),
            h.queue.clone(),
            Arc::new(AlwaysFulfill),
        );

        let routed = creator.process_record(&record("m1", 1999).body).await.unwrap();
        assert!(matches!(routed, Routed::Queued { .. }));

        let order = h.store.get(routed.order_id()).await.unwrap().unwrap();
        assert_eq!(order.order_status, OrderStatus::QueuedForProcessing);
        assert_eq!(
            order.log_statuses(),
            vec![LogStatus::Received, LogStatus::QueuedForProcessing]
        );
        assert_eq!(h.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_threshold_policy_routes_per_order() {
        let h = Harness::new();
        let report = h
            .creator(Arc::new(AmountThreshold::new(1000)))
            .process_batch(&[record("small", 500), record("large", 5000)])
            .await;
        let routed: Vec<_> = report
            .results
            .iter()
            .map(|r| matches!(r.outcome, Ok(Routed::Queued { .. })))
            .collect();
        assert_eq!(routed, vec![false, true]);
        assert_eq!(h.queue.len(), 1);
    }
}
