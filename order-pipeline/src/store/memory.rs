//! In-memory order store with fault injection

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use parking_lot::Mutex;
use shared::order::{Order, OrderStatus, StatusUpdate};

use super::{OrderStore, StoreError};

/// Process-local store for tests and local runs
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: DashMap<String, Order>,
    faults: Mutex<Faults>,
}

#[derive(Default)]
struct Faults {
    unavailable: bool,
    /// Remaining failures per target status
    updates: HashMap<OrderStatus, usize>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every operation until switched back
    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.lock().unavailable = unavailable;
    }

    /// Fail the next `times` updates that move an order to `status`
    pub fn fail_updates_to(&self, status: OrderStatus, times: usize) {
        self.faults.lock().updates.insert(status, times);
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// All orders, unordered
    pub fn orders(&self) -> Vec<Order> {
        self.orders.iter().map(|e| e.value().clone()).collect()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.faults.lock().unavailable {
            return Err(StoreError::Unavailable("injected outage".into()));
        }
        Ok(())
    }

    fn check_update_fault(&self, status: OrderStatus) -> Result<(), StoreError> {
        let mut faults = self.faults.lock();
        if let Some(remaining) = faults.updates.get_mut(&status)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(StoreError::Unavailable(format!(
                "injected outage updating to {status}"
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn get(&self, order_id: &str) -> Result<Option<Order>, StoreError> {
        self.check_available()?;
        Ok(self.orders.get(order_id).map(|o| o.value().clone()))
    }

    async fn put(&self, order: &Order) -> Result<(), StoreError> {
        self.check_available()?;
        match self.orders.entry(order.order_id.clone()) {
            Entry::Occupied(_) => Err(StoreError::AlreadyExists(order.order_id.clone())),
            Entry::Vacant(slot) => {
                slot.insert(order.clone());
                Ok(())
            }
        }
    }

    async fn update_status(
        &self,
        order_id: &str,
        update: &StatusUpdate,
    ) -> Result<(), StoreError> {
        self.check_available()?;
        self.check_update_fault(update.status)?;

        let mut order = self
            .orders
            .get_mut(order_id)
            .ok_or_else(|| StoreError::NotFound(order_id.to_string()))?;
        order
            .apply(update)
            .map_err(|e| StoreError::from_transition(order_id, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{CreationMessage, LogStatus};

    fn order(id: &str) -> Order {
        let message = CreationMessage {
            event_id: "evt_1".into(),
            event_type: "order.created".into(),
            session_id: "cs_1".into(),
            customer_id: None,
            customer_email: Some("a@example.com".into()),
            customer_name: None,
            amount_total: 500,
            currency: "usd".into(),
            payment_status: "paid".into(),
            timestamp: shared::util::now(),
            metadata: HashMap::from([("sku".to_string(), "book".to_string())]),
        };
        Order::from_creation(id.into(), &message, shared::util::now())
    }

    #[tokio::test]
    async fn test_round_trip_preserves_fields() {
        let store = MemoryOrderStore::new();
        let order = order("ord_1");
        store.put(&order).await.unwrap();
        assert_eq!(store.get("ord_1").await.unwrap(), Some(order));
        assert_eq!(store.get("ord_missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_if_absent() {
        let store = MemoryOrderStore::new();
        store.put(&order("ord_1")).await.unwrap();
        assert!(matches!(
            store.put(&order("ord_1")).await,
            Err(StoreError::AlreadyExists(id)) if id == "ord_1"
        ));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_update_appends_one_entry() {
        let store = MemoryOrderStore::new();
        store.put(&order("ord_1")).await.unwrap();
        let update = StatusUpdate::new(OrderStatus::QueuedForProcessing, "Queued")
            .expecting(OrderStatus::Pending);
        store.update_status("ord_1", &update).await.unwrap();

        let stored = store.get("ord_1").await.unwrap().unwrap();
        assert_eq!(stored.order_status, OrderStatus::QueuedForProcessing);
        assert_eq!(
            stored.log_statuses(),
            vec![LogStatus::Received, LogStatus::QueuedForProcessing]
        );
        assert_eq!(stored.updated_at, stored.logs[1].timestamp);
    }

    #[tokio::test]
    async fn test_conditional_update_conflict() {
        let store = MemoryOrderStore::new();
        store.put(&order("ord_1")).await.unwrap();
        let update =
            StatusUpdate::new(OrderStatus::Packaging, "Packaging").expecting(OrderStatus::Processing);
        assert!(matches!(
            store.update_status("ord_1", &update).await,
            Err(StoreError::Conflict { expected: OrderStatus::Processing, .. })
        ));
        assert_eq!(store.get("ord_1").await.unwrap().unwrap().logs.len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_order() {
        let store = MemoryOrderStore::new();
        let update = StatusUpdate::new(OrderStatus::Processing, "x");
        assert!(matches!(
            store.update_status("ord_none", &update).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_injected_update_failure_is_consumed() {
        let store = MemoryOrderStore::new();
        store.put(&order("ord_1")).await.unwrap();
        store.fail_updates_to(OrderStatus::QueuedForProcessing, 1);

        let update = StatusUpdate::new(OrderStatus::QueuedForProcessing, "Queued")
            .expecting(OrderStatus::Pending);
        assert!(matches!(
            store.update_status("ord_1", &update).await,
            Err(StoreError::Unavailable(_))
        ));
        store.update_status("ord_1", &update).await.unwrap();
    }

    #[tokio::test]
    async fn test_outage_fails_everything() {
        let store = MemoryOrderStore::new();
        store.set_unavailable(true);
        assert!(store.put(&order("ord_1")).await.is_err());
        assert!(store.get("ord_1").await.is_err());
        store.set_unavailable(false);
        store.put(&order("ord_1")).await.unwrap();
    }
}
